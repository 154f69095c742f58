pub mod position_manager;
pub mod risk_manager;
pub mod trailing_stops;
pub mod validators;

pub use position_manager::{ClosedTrade, ExitOutcome, PositionManager};
pub use risk_manager::{RiskManager, RiskVerdict};
pub use trailing_stops::{TrailingBreach, TrailingPolicy, TrailingSpec, TrailingStopManager};
