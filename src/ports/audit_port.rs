//! Append-only audit store for orders and account snapshots.

use crate::domain::account::AccountSnapshot;
use crate::domain::error::TraderError;
use crate::domain::order::OrderRecord;
use chrono::{NaiveDate, NaiveDateTime};

pub trait AuditPort {
    fn append_order(&self, record: &OrderRecord) -> Result<(), TraderError>;

    fn append_snapshot(&self, snapshot: &AccountSnapshot) -> Result<(), TraderError>;

    /// Sum of OK-status BUY amounts for `code` placed on `day`.
    fn buy_amount_on(&self, code: &str, day: NaiveDate) -> Result<f64, TraderError>;

    /// Newest first, optionally filtered by instrument.
    fn order_history(&self, code: Option<&str>, limit: usize)
    -> Result<Vec<OrderRecord>, TraderError>;

    /// Oldest first, timestamps at or after `cutoff`.
    fn snapshots_since(&self, cutoff: NaiveDateTime) -> Result<Vec<AccountSnapshot>, TraderError>;
}
