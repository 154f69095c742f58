use crate::domain::ports::{AccountInfo, Broker};
use crate::domain::trading::{OrderRequest, OrderResult, OrderSide, OrderStatus, OrderType};
use crate::infrastructure::simulation::SlippageModel;
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info};

/// In-process broker with instantaneous terminal fills.
///
/// Market orders fill at the reference price moved against the trader by the
/// slippage model. Limit orders that would not cross are rejected with
/// "limit_not_marketable". Orders the account cannot afford are rejected
/// without touching state.
pub struct SimulatedBroker {
    capital: Decimal,
    buying_power: Mutex<Decimal>,
    slippage: Box<dyn SlippageModel>,
    connected: AtomicBool,
    order_sequence: AtomicU64,
}

impl SimulatedBroker {
    pub fn new(capital: Decimal, slippage: Box<dyn SlippageModel>) -> Self {
        Self {
            capital,
            buying_power: Mutex::new(capital),
            slippage,
            connected: AtomicBool::new(false),
            order_sequence: AtomicU64::new(0),
        }
    }

    fn next_order_id(&self) -> String {
        let n = self.order_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        format!("sim-{n:06}")
    }

    fn reject(&self, reason: &str) -> OrderResult {
        OrderResult {
            order_id: self.next_order_id(),
            status: OrderStatus::Rejected,
            filled_price: None,
            reason: Some(reason.to_string()),
        }
    }
}

#[async_trait]
impl Broker for SimulatedBroker {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        info!("SimulatedBroker: connected (capital {})", self.capital);
        Ok(())
    }

    async fn submit(&self, request: OrderRequest) -> Result<OrderResult> {
        if !self.connected.load(Ordering::SeqCst) {
            return Ok(self.reject("not_connected"));
        }
        if request.quantity <= Decimal::ZERO {
            return Ok(self.reject("zero_quantity"));
        }

        // A limit that would not cross at the reference price rejects
        // instead of resting; the simulator has no book to park it in.
        if request.order_type == OrderType::Limit {
            let marketable = match (request.side, request.limit_price) {
                (OrderSide::Buy, Some(limit)) => limit >= request.reference_price,
                (OrderSide::Sell, Some(limit)) => limit <= request.reference_price,
                (_, None) => false,
            };
            if !marketable {
                debug!(
                    "SimulatedBroker: limit {} {:?} not marketable at {}",
                    request.symbol, request.limit_price, request.reference_price
                );
                return Ok(self.reject("limit_not_marketable"));
            }
        }

        let filled_price =
            self.slippage
                .execution_price(request.reference_price, request.quantity, request.side);
        let notional = filled_price * request.quantity;

        let mut buying_power = self
            .buying_power
            .lock()
            .map_err(|_| anyhow::anyhow!("broker account lock poisoned"))?;
        match request.side {
            OrderSide::Buy => {
                if notional > *buying_power {
                    return Ok(self.reject("insufficient_buying_power"));
                }
                *buying_power -= notional;
            }
            OrderSide::Sell => {
                *buying_power += notional;
            }
        }

        Ok(OrderResult {
            order_id: self.next_order_id(),
            status: OrderStatus::Filled,
            filled_price: Some(filled_price),
            reason: None,
        })
    }

    async fn account(&self) -> Result<AccountInfo> {
        let buying_power = self
            .buying_power
            .lock()
            .map_err(|_| anyhow::anyhow!("broker account lock poisoned"))?;
        Ok(AccountInfo {
            capital: self.capital,
            buying_power: *buying_power,
        })
    }
}
