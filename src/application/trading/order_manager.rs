use crate::domain::ports::Broker;
use crate::domain::trading::{
    Fill, Order, OrderRequest, OrderStatus, OrderType, Signal,
};
use anyhow::Result;
use chrono::DateTime;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of routing one approved signal to the broker.
#[derive(Debug, Clone)]
pub struct OrderOutcome {
    pub order: Order,
    /// Present iff the broker filled the order.
    pub fill: Option<Fill>,
}

/// Turns approved signals into broker orders and fills. Generates the
/// per-trade ids (strategy_id + symbol + compact timestamp, de-duplicated
/// within the run) and keeps the full order audit trail.
pub struct OrderManager {
    broker: Arc<dyn Broker>,
    orders: Vec<Order>,
    used_trade_ids: HashSet<String>,
}

impl OrderManager {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            broker,
            orders: Vec::new(),
            used_trade_ids: HashSet::new(),
        }
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn filled_count(&self) -> usize {
        self.orders.iter().filter(|o| o.status == OrderStatus::Filled).count()
    }

    pub fn rejected_count(&self) -> usize {
        self.orders.iter().filter(|o| o.status == OrderStatus::Rejected).count()
    }

    /// Fresh trade id for an entry: `<strategy>_<symbol>_<HHMMSSmmm>`, with a
    /// numeric suffix if the same millisecond produced one already.
    pub fn new_trade_id(&mut self, strategy_id: &str, symbol: &str, timestamp: i64) -> String {
        let compact = DateTime::from_timestamp_millis(timestamp)
            .map(|dt| dt.format("%H%M%S%3f").to_string())
            .unwrap_or_else(|| timestamp.to_string());
        let symbol_part: String = symbol.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        let base = format!("{strategy_id}_{symbol_part}_{compact}");

        let mut candidate = base.clone();
        let mut suffix = 1;
        while !self.used_trade_ids.insert(candidate.clone()) {
            suffix += 1;
            candidate = format!("{base}_{suffix}");
        }
        candidate
    }

    /// Submits one approved signal as a market order. `trade_id` is freshly
    /// generated for entries and carried over from the position for exits.
    pub async fn execute(&mut self, signal: &Signal, trade_id: &str) -> Result<OrderOutcome> {
        let request = OrderRequest {
            symbol: signal.symbol.clone(),
            side: signal.side,
            quantity: signal.quantity,
            order_type: OrderType::Market,
            limit_price: None,
            reference_price: signal.price,
            timestamp: signal.timestamp,
        };

        let result = self.broker.submit(request).await?;

        let mut order = Order {
            order_id: result.order_id.clone(),
            strategy_id: signal.strategy_id.clone(),
            symbol: signal.symbol.clone(),
            side: signal.side,
            requested_price: signal.price,
            filled_price: result.filled_price,
            quantity: signal.quantity,
            status: result.status,
            submitted_at: signal.timestamp,
            filled_at: None,
            slippage: rust_decimal::Decimal::ZERO,
        };

        let fill = match result.status {
            OrderStatus::Filled => {
                let filled_price = result.filled_price.unwrap_or(signal.price);
                order.filled_at = Some(signal.timestamp);
                order.slippage = filled_price - signal.price;
                info!(
                    "OrderManager: {} {} {} x{} filled at {} (requested {})",
                    trade_id, signal.side, signal.symbol, signal.quantity, filled_price, signal.price
                );
                Some(Fill {
                    trade_id: trade_id.to_string(),
                    strategy_id: signal.strategy_id.clone(),
                    symbol: signal.symbol.clone(),
                    side: signal.side,
                    intent: signal.intent,
                    requested_price: signal.price,
                    filled_price,
                    quantity: signal.quantity,
                    timestamp: signal.timestamp,
                })
            }
            OrderStatus::Rejected => {
                warn!(
                    "OrderManager: {} {} {} rejected by broker: {}",
                    trade_id,
                    signal.side,
                    signal.symbol,
                    result.reason.as_deref().unwrap_or("unspecified")
                );
                None
            }
            OrderStatus::Pending => {
                // The broker contract guarantees terminal results; treat a
                // stray pending as rejected rather than waiting forever.
                warn!(
                    "OrderManager: broker returned non-terminal status for {}, dropping",
                    trade_id
                );
                order.status = OrderStatus::Rejected;
                None
            }
        };

        self.orders.push(order.clone());
        Ok(OrderOutcome { order, fill })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::AccountInfo;
    use crate::domain::trading::{OrderResult, OrderSide};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedBroker {
        reject: bool,
        submissions: AtomicUsize,
    }

    #[async_trait]
    impl Broker for ScriptedBroker {
        async fn connect(&self) -> Result<()> {
            Ok(())
        }

        async fn submit(&self, request: OrderRequest) -> Result<OrderResult> {
            let n = self.submissions.fetch_add(1, Ordering::SeqCst);
            if self.reject {
                Ok(OrderResult {
                    order_id: format!("o{n}"),
                    status: OrderStatus::Rejected,
                    filled_price: None,
                    reason: Some("insufficient_buying_power".to_string()),
                })
            } else {
                Ok(OrderResult {
                    order_id: format!("o{n}"),
                    status: OrderStatus::Filled,
                    filled_price: Some(request.reference_price + dec!(0.05)),
                    reason: None,
                })
            }
        }

        async fn account(&self) -> Result<AccountInfo> {
            Ok(AccountInfo { capital: dec!(100000), buying_power: dec!(100000) })
        }
    }

    fn signal() -> Signal {
        Signal::entry("s1", "TCS", OrderSide::Buy, dec!(100), dec!(5), 34_200_000, "test")
    }

    #[test]
    fn test_trade_ids_unique_within_same_millisecond() {
        let broker = Arc::new(ScriptedBroker { reject: false, submissions: AtomicUsize::new(0) });
        let mut manager = OrderManager::new(broker);

        let a = manager.new_trade_id("s1", "TCS", 34_200_000);
        let b = manager.new_trade_id("s1", "TCS", 34_200_000);
        assert_ne!(a, b);
        assert!(a.starts_with("s1_TCS_"));
        assert!(b.ends_with("_2"));
    }

    #[tokio::test]
    async fn test_fill_carries_slippage() {
        let broker = Arc::new(ScriptedBroker { reject: false, submissions: AtomicUsize::new(0) });
        let mut manager = OrderManager::new(broker);

        let outcome = manager.execute(&signal(), "t1").await.unwrap();
        let fill = outcome.fill.unwrap();
        assert_eq!(fill.filled_price, dec!(100.05));
        assert_eq!(outcome.order.slippage, dec!(0.05));
        assert_eq!(outcome.order.status, OrderStatus::Filled);
        assert_eq!(manager.filled_count(), 1);
    }

    #[tokio::test]
    async fn test_rejection_yields_no_fill() {
        let broker = Arc::new(ScriptedBroker { reject: true, submissions: AtomicUsize::new(0) });
        let mut manager = OrderManager::new(broker);

        let outcome = manager.execute(&signal(), "t1").await.unwrap();
        assert!(outcome.fill.is_none());
        assert_eq!(outcome.order.status, OrderStatus::Rejected);
        assert_eq!(manager.rejected_count(), 1);
        assert_eq!(outcome.order.filled_price, None);
    }
}
