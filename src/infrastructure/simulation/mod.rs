pub mod market_simulator;
pub mod slippage_model;

pub use market_simulator::{MarketSimulator, SimulatorParams};
pub use slippage_model::{SlippageModel, UniformSlippage, ZeroSlippage};
