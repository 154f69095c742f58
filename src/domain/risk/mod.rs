pub mod risk_config;
pub mod state;

pub use risk_config::{RiskConfig, RiskConfigError};
pub use state::RiskState;
