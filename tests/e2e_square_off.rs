//! End-of-day rules: the 15:00 warning blocks new entries, and the 15:15
//! square-off force-closes every open position through the normal
//! risk/order path.

mod common;

use common::*;
use intrasim::domain::market::{Candle, Timeframe};
use intrasim::domain::trading::{OrderSide, SignalIntent, SignalOrigin};
use intrasim::infrastructure::data::InMemoryDataAdapter;
use std::sync::Arc;

const STRATEGIES: &str = r#"
    [[strategies]]
    id = "r1"
    class_name = "rsi_momentum"
    [strategies.params]
    ma_period = 5

    [[strategies]]
    id = "r2"
    class_name = "rsi_momentum"
    [strategies.params]
    ma_period = 5
    target_pct = 0.05
"#;

/// Entry in the morning, then a dead-flat drift into the close so no exit
/// condition fires before the square-off.
fn entry_then_flat(symbol: &str) -> Vec<Candle> {
    let start = at(9, 15);
    let mut candles = vec![one_min_candle(symbol, 93.2, 94.6, 93.1, 94.5, start)];
    let mut ts = start + 60_000;
    while ts <= at(15, 20) {
        candles.push(flat_candle(symbol, 94.5, ts));
        ts += 60_000;
    }
    candles
}

/// Declines all day, then pops just after the warning: a valid entry setup
/// that must be rejected as blocked.
fn late_pop(symbol: &str) -> Vec<Candle> {
    let start = at(9, 15);
    let mut candles = Vec::new();
    let mut ts = start;
    let mut price = 300.0;
    while ts < at(15, 5) {
        candles.push(flat_candle(symbol, price, ts));
        price -= 0.5;
        ts += 60_000;
    }
    // The bounce candle closes above the short SMA while RSI is pinned low.
    candles.push(one_min_candle(symbol, price - 0.2, price + 1.7, price - 0.3, price + 1.5, ts));
    ts += 60_000;
    while ts <= at(15, 20) {
        candles.push(flat_candle(symbol, price + 1.5, ts));
        ts += 60_000;
    }
    candles
}

#[tokio::test]
async fn warning_blocks_entries_and_square_off_closes_everything() {
    let mut adapter = InMemoryDataAdapter::new();
    for symbol in ["A", "B"] {
        adapter = adapter
            .with_history(symbol, Timeframe::OneMin, declining_history(symbol, 108.0, at(8, 30)))
            .with_day(sim_date(), symbol, entry_then_flat(symbol));
    }
    adapter = adapter.with_day(sim_date(), "C", late_pop("C"));

    let recorder = RecordingDataManager::new();
    let mut system = build_system(
        base_config(&["A", "B", "C"], STRATEGIES),
        Arc::new(adapter),
        recorder.clone(),
    );
    let summary = system.run().await.unwrap();

    // Both strategies entered both morning symbols.
    assert_eq!(summary.trades_opened, 4);

    // The late pop on C was a valid setup for both strategies, rejected
    // purely because trading was already blocked.
    assert!(
        recorder.rejected_with("trading_blocked") >= 2,
        "expected blocked entries, got {:?}",
        recorder
            .signals()
            .iter()
            .filter(|r| !r.approved)
            .map(|r| r.reason.clone())
            .collect::<Vec<_>>()
    );

    // Square-off closed every open position through the normal path.
    assert_eq!(summary.trades_closed, 4);
    assert_eq!(summary.open_positions_at_end, 0);

    let signals = recorder.signals();
    let square_offs: Vec<_> = signals
        .iter()
        .filter(|r| r.signal.origin == SignalOrigin::TimeController)
        .collect();
    assert_eq!(square_offs.len(), 4);
    assert!(square_offs.iter().all(|r| {
        r.approved && r.signal.side == OrderSide::Sell && r.signal.reason == "square_off"
    }));
    assert!(square_offs.iter().all(|r| r.signal.timestamp >= at(15, 15)));

    // No entry was approved after the warning boundary.
    assert!(signals.iter().all(|r| {
        !(r.approved && r.signal.intent == SignalIntent::Entry && r.signal.timestamp >= at(15, 0))
    }));
}
