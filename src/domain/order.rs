//! Audited order records.

use super::error::TraderError;
use super::risk::Side;
use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Ok,
    Error,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Ok => "OK",
            OrderStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OK" => Ok(OrderStatus::Ok),
            "ERROR" => Ok(OrderStatus::Error),
            other => Err(TraderError::DatabaseQuery {
                reason: format!("unknown order status '{other}'"),
            }),
        }
    }
}

/// One order attempt. Written once, never updated.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub timestamp: NaiveDateTime,
    pub code: String,
    pub side: Side,
    pub quantity: i64,
    pub price: Option<f64>,
    pub amount: Option<f64>,
    pub status: OrderStatus,
    /// Broker response verbatim, or the failure text when there was none.
    pub raw_response: String,
}

impl OrderRecord {
    pub fn is_ok(&self) -> bool {
        self.status == OrderStatus::Ok
    }
}
