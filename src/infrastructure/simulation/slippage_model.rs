use crate::domain::trading::OrderSide;
use rand::Rng;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::sync::Mutex;

/// How simulated fills deviate from the requested price. Always against the
/// trader: buys fill higher, sells lower.
pub trait SlippageModel: Send + Sync {
    fn execution_price(&self, price: Decimal, quantity: Decimal, side: OrderSide) -> Decimal;
}

/// Uniform slippage in [min_rate, max_rate], drawn from a seeded generator so
/// replays are reproducible. `fixed(rate)` collapses the range for exact
/// expectations in tests.
pub struct UniformSlippage {
    min_rate: f64,
    max_rate: f64,
    rng: Mutex<StdRng>,
}

impl UniformSlippage {
    pub fn new(min_rate: f64, max_rate: f64, seed: u64) -> Self {
        Self {
            min_rate,
            max_rate: max_rate.max(min_rate),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn fixed(rate: f64) -> Self {
        Self::new(rate, rate, 0)
    }
}

impl SlippageModel for UniformSlippage {
    fn execution_price(&self, price: Decimal, _quantity: Decimal, side: OrderSide) -> Decimal {
        let rate = if self.max_rate > self.min_rate {
            match self.rng.lock() {
                Ok(mut rng) => rng.random_range(self.min_rate..=self.max_rate),
                Err(_) => self.min_rate,
            }
        } else {
            self.min_rate
        };

        let factor = match side {
            OrderSide::Buy => 1.0 + rate,
            OrderSide::Sell => 1.0 - rate,
        };
        let filled = price.to_f64().unwrap_or_default() * factor;
        Decimal::from_f64(filled).unwrap_or(price).round_dp(6)
    }
}

/// Perfect execution, for isolating strategy behavior in tests.
pub struct ZeroSlippage;

impl SlippageModel for ZeroSlippage {
    fn execution_price(&self, price: Decimal, _quantity: Decimal, _side: OrderSide) -> Decimal {
        price
    }
}
