//! Brokerage client port trait.
//!
//! Implementations validate raw payloads into these typed results before they
//! reach the domain; a non-zero business code surfaces as
//! [`BrokerError::Business`].

use crate::domain::account::Balance;
use crate::domain::error::BrokerError;
use crate::domain::risk::Side;

/// Broker acknowledgement of a submitted order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAck {
    pub status: String,
    pub price: Option<f64>,
    pub filled_qty: Option<i64>,
    /// Response body exactly as received.
    pub raw: String,
}

/// A submission failure with whatever body the broker returned, kept for
/// the audit record.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitFailure {
    pub error: BrokerError,
    pub raw: Option<String>,
}

impl From<BrokerError> for SubmitFailure {
    fn from(error: BrokerError) -> Self {
        Self { error, raw: None }
    }
}

pub trait BrokerPort {
    fn get_balance(&self) -> Result<Balance, BrokerError>;

    fn submit_order(&self, side: Side, code: &str, quantity: i64) -> Result<OrderAck, SubmitFailure>;
}
