pub mod candle;
pub mod tick;
pub mod timeframe;

pub use candle::{Candle, CandleState};
pub use tick::Tick;
pub use timeframe::Timeframe;
