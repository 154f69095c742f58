pub mod manager;
pub mod rsi_momentum;
pub mod scalping_mtf_atr;
pub mod strategy_factory;
pub mod supertrend;
pub mod traits;

pub use manager::MultiStrategyManager;
pub use rsi_momentum::{RsiMomentumParams, RsiMomentumStrategy};
pub use scalping_mtf_atr::{ScalpingMtfAtrParams, ScalpingMtfAtrStrategy};
pub use strategy_factory::StrategyFactory;
pub use supertrend::{SupertrendParams, SupertrendStrategy};
pub use traits::Strategy;
