use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured end-of-run report, printed to the console and serializable for
/// external observers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub date: Option<NaiveDate>,
    pub ticks_processed: u64,
    pub candles_closed: u64,
    pub signals_emitted: u64,
    pub signals_approved: u64,
    pub signals_rejected: u64,
    pub trades_opened: u64,
    pub trades_closed: u64,
    pub realized_pnl: Decimal,
    pub final_capital: Decimal,
    pub open_positions_at_end: usize,
    pub faulted_strategies: Vec<String>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "── simulation summary ──")?;
        if let Some(date) = self.date {
            writeln!(f, "date:               {date}")?;
        }
        writeln!(f, "ticks processed:    {}", self.ticks_processed)?;
        writeln!(f, "candles closed:     {}", self.candles_closed)?;
        writeln!(
            f,
            "signals:            {} emitted / {} approved / {} rejected",
            self.signals_emitted, self.signals_approved, self.signals_rejected
        )?;
        writeln!(
            f,
            "trades:             {} opened / {} closed",
            self.trades_opened, self.trades_closed
        )?;
        writeln!(f, "realized P&L:       {}", self.realized_pnl)?;
        writeln!(f, "final capital:      {}", self.final_capital)?;
        writeln!(f, "open at end:        {}", self.open_positions_at_end)?;
        if self.faulted_strategies.is_empty() {
            write!(f, "faulted strategies: none")
        } else {
            write!(f, "faulted strategies: {}", self.faulted_strategies.join(", "))
        }
    }
}
