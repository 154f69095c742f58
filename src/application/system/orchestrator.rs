use crate::application::market_data::CandleAggregator;
use crate::application::risk_management::{PositionManager, RiskManager, TrailingStopManager};
use crate::application::strategies::{MultiStrategyManager, StrategyFactory};
use crate::application::system::summary::RunSummary;
use crate::application::system::time_controller::{TimeController, TimeEvent};
use crate::application::system::warmup::WarmupManager;
use crate::application::trading::OrderManager;
use crate::config::Config;
use crate::domain::errors::{ConfigError, DataError};
use crate::domain::market::{Candle, Tick};
use crate::domain::ports::{Broker, DataAdapter, DataManager};
use crate::domain::trading::{OrderSide, Position, Signal, SignalIntent, SignalOrigin};
use crate::infrastructure::simulation::{MarketSimulator, SimulatorParams};
use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Wires every component and drives warmup → live loop → shutdown.
///
/// The per-tick pipeline is strictly ordered and synchronous: aggregator,
/// time events, candle-close dispatch, tick dispatch, position marks,
/// trailing-stop evaluation, then a single drain of all emitted signals
/// through risk → orders → positions. Fills mutate state before the next
/// tick, which makes replays with one seed bit-identical.
pub struct TradingSystem {
    config: Config,
    adapter: Arc<dyn DataAdapter>,
    broker: Arc<dyn Broker>,
    data_manager: Arc<dyn DataManager>,
    aggregator: CandleAggregator,
    strategies: MultiStrategyManager,
    risk: RiskManager,
    orders: OrderManager,
    positions: PositionManager,
    trailing: TrailingStopManager,
    time: TimeController,
    summary: RunSummary,
    stop_flag: Arc<AtomicBool>,
}

impl TradingSystem {
    pub fn new(
        config: Config,
        adapter: Arc<dyn DataAdapter>,
        broker: Arc<dyn Broker>,
        data_manager: Arc<dyn DataManager>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut strategies = MultiStrategyManager::new();
        for strategy_config in config.strategies.iter().filter(|s| s.enabled) {
            strategies.register(StrategyFactory::create(strategy_config)?);
        }

        let aggregator = CandleAggregator::new(strategies.required_timeframes());
        let risk = RiskManager::new(config.risk.clone())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let orders = OrderManager::new(broker.clone());
        let time = TimeController::new(config.time);

        Ok(Self {
            config,
            adapter,
            broker,
            data_manager,
            aggregator,
            strategies,
            risk,
            orders,
            positions: PositionManager::new(),
            trailing: TrailingStopManager::new(),
            time,
            summary: RunSummary::default(),
            stop_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Cooperative cancellation: the holder can request a stop; the system
    /// finishes the in-flight tick, squares off, flushes and returns.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    pub async fn run(&mut self) -> Result<RunSummary> {
        let date = self.config.simulation.date;
        self.summary.date = Some(date);

        self.strategies
            .initialize_all()
            .context("strategy initialization failed")?;
        self.broker.connect().await.context("broker connect failed")?;

        let symbols = self.config.simulation.symbols.clone();
        WarmupManager::new(self.config.warmup)
            .run(
                &self.adapter,
                date,
                &symbols,
                &mut self.aggregator,
                &mut self.strategies,
                &mut self.trailing,
            )
            .await
            .context("warmup failed")?;

        let mut day_candles: HashMap<String, Vec<Candle>> = HashMap::new();
        for symbol in &symbols {
            let candles = self
                .adapter
                .load_day(date, symbol)
                .await
                .with_context(|| format!("loading {symbol} for {date}"))?;
            if candles.is_empty() {
                warn!("TradingSystem: no candles for {symbol} on {date}");
            } else {
                day_candles.insert(symbol.clone(), candles);
            }
        }
        if day_candles.is_empty() {
            let symbol = symbols.first().cloned().unwrap_or_default();
            return Err(DataError::NoData { symbol, date }.into());
        }

        let mut simulator = MarketSimulator::new(
            SimulatorParams {
                seed: self.config.simulation.seed,
                ticks_per_candle: self.config.simulation.ticks_per_candle,
                spread: self.config.simulation.spread,
                speed: self.config.simulation.speed,
            },
            day_candles,
        );

        info!(
            "TradingSystem: starting live loop ({} ticks, {} strategies)",
            simulator.len(),
            self.strategies.len()
        );

        let mut last_timestamp: Option<i64> = None;
        while let Some(tick) = simulator.next_tick() {
            if let Some(prev) = last_timestamp
                && let Some(delay) = simulator.inter_tick_delay(tick.timestamp - prev)
            {
                tokio::time::sleep(delay).await;
            }
            last_timestamp = Some(tick.timestamp);

            self.process_tick(&tick).await?;

            if self.stop_flag.load(Ordering::SeqCst) {
                info!("TradingSystem: stop requested, squaring off and draining");
                let queue = self.collect_square_off_signals(tick.timestamp);
                self.risk.set_trading_blocked(true);
                self.drain_signals(queue).await?;
                break;
            }
        }

        if let Some(timestamp) = last_timestamp {
            self.flush_aggregator(timestamp).await?;
        }

        self.summary.realized_pnl = self.risk.state().daily_realized_pnl;
        self.summary.final_capital = self.risk.state().capital;
        self.summary.open_positions_at_end = self.positions.open_count();
        self.summary.faulted_strategies = self.strategies.faulted_ids();

        info!("TradingSystem: run complete\n{}", self.summary);
        Ok(self.summary.clone())
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn positions(&self) -> &PositionManager {
        &self.positions
    }

    async fn process_tick(&mut self, tick: &Tick) -> Result<()> {
        self.summary.ticks_processed += 1;

        // 1. Aggregator updates forming candles, possibly closing some.
        let closed = self.aggregator.process_tick(tick);
        self.summary.candles_closed += closed.len() as u64;

        let mut queue: Vec<Signal> = Vec::new();

        // 2. Simulated clock: the block applies before anything else this
        // tick; the square-off sweep itself waits until strategies and
        // positions have seen this tick's price.
        let mut square_off_now = false;
        for event in self.time.advance(tick.timestamp) {
            match event {
                TimeEvent::Warning => self.risk.set_trading_blocked(true),
                TimeEvent::SquareOff => {
                    self.risk.set_trading_blocked(true);
                    square_off_now = true;
                }
            }
        }

        // 3. Closed candles reach every subscriber before the tick itself.
        for candle in &closed {
            self.data_manager.log_candle(candle).await;
            self.trailing.on_candle_closed(candle);
            queue.extend(self.strategies.dispatch_candle_closed(candle));
        }

        // 4. Tick dispatch in registration order.
        queue.extend(self.strategies.dispatch_tick(tick));

        // 5. Mark open positions to the tick.
        self.positions.update_tick(tick);
        let marked: Vec<Position> = self
            .positions
            .open_positions()
            .filter(|p| p.symbol == tick.symbol)
            .cloned()
            .collect();
        for position in &marked {
            self.data_manager.log_position_update(position).await;
        }

        // 6. Square-off exits price at this tick.
        if square_off_now {
            queue.extend(self.collect_square_off_signals(tick.timestamp));
        }

        // 7. Trailing stops ratchet and possibly breach.
        for breach in self.trailing.on_tick(tick) {
            // The position may have been closed by an earlier signal this
            // tick; a breach without a position is simply dropped.
            let Some(position) = self.positions.by_trade_id(&breach.trade_id) else {
                continue;
            };
            let side = if position.is_long() { OrderSide::Sell } else { OrderSide::Buy };
            queue.push(
                Signal::exit(
                    breach.strategy_id.clone(),
                    breach.symbol.clone(),
                    side,
                    breach.price,
                    position.abs_quantity(),
                    breach.timestamp,
                    "trailing_sl",
                )
                .with_origin(SignalOrigin::TrailingSl),
            );
        }

        // 8. Drain everything emitted this tick, in emission order.
        self.drain_signals(queue).await
    }

    /// Exit signals for every open position at square-off: strategies emit
    /// their own; positions left behind by faulted strategies are swept
    /// directly.
    fn collect_square_off_signals(&mut self, timestamp: i64) -> Vec<Signal> {
        let mut queue = self.strategies.square_off_all(timestamp);
        let covered: HashSet<(String, String)> = queue
            .iter()
            .map(|s| (s.strategy_id.clone(), s.symbol.clone()))
            .collect();

        for position in self.positions.open_positions() {
            let key = (position.strategy_id.clone(), position.symbol.clone());
            if covered.contains(&key) {
                continue;
            }
            let side = if position.is_long() { OrderSide::Sell } else { OrderSide::Buy };
            queue.push(
                Signal::exit(
                    position.strategy_id.clone(),
                    position.symbol.clone(),
                    side,
                    position.current_price,
                    position.abs_quantity(),
                    timestamp,
                    "square_off",
                )
                .with_origin(SignalOrigin::TimeController),
            );
        }
        queue
    }

    async fn drain_signals(&mut self, queue: Vec<Signal>) -> Result<()> {
        for signal in queue {
            self.summary.signals_emitted += 1;

            let has_open = self.positions.has_open(&signal.strategy_id, &signal.symbol);
            let verdict = self.risk.evaluate(&signal, has_open);
            self.data_manager
                .log_signal(&signal, verdict.approved, &verdict.reason)
                .await;

            if !verdict.approved {
                self.summary.signals_rejected += 1;
                continue;
            }
            self.summary.signals_approved += 1;

            match signal.intent {
                SignalIntent::Entry => self.execute_entry(signal).await?,
                SignalIntent::Exit => self.execute_exit(signal).await?,
            }
        }
        Ok(())
    }

    async fn execute_entry(&mut self, signal: Signal) -> Result<()> {
        let trade_id =
            self.orders
                .new_trade_id(&signal.strategy_id, &signal.symbol, signal.timestamp);
        let outcome = self.orders.execute(&signal, &trade_id).await?;
        let Some(fill) = outcome.fill else {
            return Ok(());
        };

        let entry_notional = fill.filled_price * fill.quantity;
        self.positions.open(&fill, Some(signal));
        self.risk.on_position_opened(&fill.strategy_id, entry_notional);

        if let Some(spec) = self.strategies.trailing_spec(&fill.strategy_id, &fill.symbol) {
            self.trailing.on_position_opened(
                &trade_id,
                &fill.strategy_id,
                &fill.symbol,
                fill.side == OrderSide::Buy,
                fill.filled_price,
                fill.timestamp,
                spec,
            );
            if let Some(state) = self.trailing.state(&trade_id) {
                self.data_manager.update_trailing_sl(&trade_id, state.stop).await;
            }
        }

        self.strategies.notify_position_opened(&fill);
        self.summary.trades_opened += 1;
        self.data_manager.log_trade_open(&fill).await;
        Ok(())
    }

    async fn execute_exit(&mut self, signal: Signal) -> Result<()> {
        let Some(position) = self.positions.get(&signal.strategy_id, &signal.symbol) else {
            return Ok(());
        };
        let trade_id = position.trade_id.clone();

        let outcome = self.orders.execute(&signal, &trade_id).await?;
        let Some(fill) = outcome.fill else {
            return Ok(());
        };
        let Some(exit) = self.positions.apply_exit(&fill) else {
            return Ok(());
        };

        self.risk
            .on_position_reduced(exit.released_notional, exit.realized_pnl);

        if exit.fully_closed {
            self.risk.on_position_closed(&fill.strategy_id);
            self.trailing.on_position_closed(&trade_id);
            self.strategies
                .notify_position_closed(&fill, exit.trade_realized_pnl);
            self.summary.trades_closed += 1;
            self.data_manager
                .log_trade_close(&fill, exit.trade_realized_pnl)
                .await;
        } else {
            self.strategies.notify_position_reduced(&fill, exit.remaining);
            self.data_manager.log_trade_close(&fill, exit.realized_pnl).await;
        }
        Ok(())
    }

    /// End of simulation: finalize forming candles and route them through
    /// the normal candle-closed path so indicators and logs end consistent.
    async fn flush_aggregator(&mut self, _timestamp: i64) -> Result<()> {
        let flushed = self.aggregator.flush();
        if flushed.is_empty() {
            return Ok(());
        }
        self.summary.candles_closed += flushed.len() as u64;

        let mut queue = Vec::new();
        for candle in &flushed {
            self.data_manager.log_candle(candle).await;
            self.trailing.on_candle_closed(candle);
            queue.extend(self.strategies.dispatch_candle_closed(candle));
        }
        self.drain_signals(queue).await
    }
}
