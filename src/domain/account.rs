//! Live account state as reported by the brokerage.

use chrono::NaiveDateTime;

/// One instrument line of a balance query.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub code: String,
    pub held_qty: i64,
    pub sellable_qty: i64,
    pub eval_amount: f64,
    /// Current quote; `None` when the broker did not report one.
    pub last_price: Option<f64>,
    pub purchase_amount: f64,
    pub pnl: f64,
}

impl Holding {
    /// Average cost per held share, if any shares are held.
    pub fn average_price(&self) -> Option<f64> {
        (self.held_qty > 0 && self.eval_amount > 0.0)
            .then(|| self.eval_amount / self.held_qty as f64)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Balance {
    pub holdings: Vec<Holding>,
    pub cash: f64,
}

impl Balance {
    pub fn holding(&self, code: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.code == code)
    }

    pub fn total_eval_amount(&self) -> f64 {
        self.holdings.iter().map(|h| h.eval_amount).sum()
    }

    pub fn total_value(&self) -> f64 {
        self.total_eval_amount() + self.cash
    }
}

/// Append-only record of one balance query.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    pub timestamp: NaiveDateTime,
    pub total_value: f64,
    pub cash: f64,
    pub total_buy_amount: f64,
    pub total_eval_amount: f64,
    pub total_pnl: f64,
}

impl AccountSnapshot {
    pub fn from_balance(balance: &Balance, timestamp: NaiveDateTime) -> Self {
        let total_eval_amount = balance.total_eval_amount();
        Self {
            timestamp,
            total_value: total_eval_amount + balance.cash,
            cash: balance.cash,
            total_buy_amount: balance.holdings.iter().map(|h| h.purchase_amount).sum(),
            total_eval_amount,
            total_pnl: balance.holdings.iter().map(|h| h.pnl).sum(),
        }
    }
}
