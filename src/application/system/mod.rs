pub mod orchestrator;
pub mod summary;
pub mod time_controller;
pub mod warmup;

pub use orchestrator::TradingSystem;
pub use summary::RunSummary;
pub use time_controller::{TimeController, TimeEvent};
pub use warmup::{WarmupManager, WarmupReport};
