//! In-memory paper broker for dry runs.
//!
//! Market orders fill immediately at the quote set with [`PaperBroker::set_price`].
//! Buys are refused when cash is short; settlement is instant so bought shares
//! are sellable at once.

use crate::domain::account::{Balance, Holding};
use crate::domain::error::BrokerError;
use crate::domain::risk::Side;
use crate::ports::broker_port::{BrokerPort, OrderAck, SubmitFailure};
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Book {
    cash: f64,
    prices: BTreeMap<String, f64>,
    /// code → (shares, total cost)
    positions: BTreeMap<String, (i64, f64)>,
    next_order_no: u64,
}

pub struct PaperBroker {
    book: Mutex<Book>,
}

impl PaperBroker {
    pub fn new(cash: f64) -> Self {
        Self {
            book: Mutex::new(Book {
                cash,
                next_order_no: 1,
                ..Book::default()
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Book>, BrokerError> {
        self.book.lock().map_err(|_| BrokerError::Transport {
            reason: "paper book poisoned".into(),
        })
    }

    pub fn set_price(&self, code: &str, price: f64) -> Result<(), BrokerError> {
        self.lock()?.prices.insert(code.to_string(), price);
        Ok(())
    }
}

impl BrokerPort for PaperBroker {
    fn get_balance(&self) -> Result<Balance, BrokerError> {
        let book = self.lock()?;
        let holdings = book
            .positions
            .iter()
            .filter(|(_, (qty, _))| *qty > 0)
            .map(|(code, &(qty, cost))| {
                let price = book.prices.get(code).copied();
                let eval_amount = price.map_or(cost, |p| p * qty as f64);
                Holding {
                    code: code.clone(),
                    held_qty: qty,
                    sellable_qty: qty,
                    eval_amount,
                    last_price: price,
                    purchase_amount: cost,
                    pnl: eval_amount - cost,
                }
            })
            .collect();
        Ok(Balance {
            holdings,
            cash: book.cash,
        })
    }

    fn submit_order(&self, side: Side, code: &str, quantity: i64) -> Result<OrderAck, SubmitFailure> {
        let mut book = self.lock()?;
        let reject = |message: String| SubmitFailure {
            error: BrokerError::Business {
                code: "1".into(),
                message: message.clone(),
            },
            raw: Some(serde_json::json!({ "rt_cd": "1", "msg1": message }).to_string()),
        };

        let Some(price) = book.prices.get(code).copied().filter(|p| *p > 0.0) else {
            return Err(reject(format!("no quote for {code}")));
        };
        let value = price * quantity as f64;

        match side {
            Side::Buy => {
                if value > book.cash {
                    return Err(reject(format!(
                        "insufficient cash: need {value:.0}, have {:.0}",
                        book.cash
                    )));
                }
                book.cash -= value;
                let entry = book.positions.entry(code.to_string()).or_insert((0, 0.0));
                entry.0 += quantity;
                entry.1 += value;
            }
            Side::Sell => {
                let held = book.positions.get(code).map_or(0, |p| p.0);
                if quantity > held {
                    return Err(reject(format!("cannot sell {quantity}, holding {held}")));
                }
                book.cash += value;
                if let Some(entry) = book.positions.get_mut(code) {
                    let avg = entry.1 / entry.0 as f64;
                    entry.0 -= quantity;
                    entry.1 -= avg * quantity as f64;
                }
            }
        }

        let order_no = book.next_order_no;
        book.next_order_no += 1;
        let raw = serde_json::json!({
            "rt_cd": "0",
            "msg1": "paper order filled",
            "output": { "ODNO": format!("{order_no:010}") },
        })
        .to_string();

        Ok(OrderAck {
            status: "0".into(),
            price: Some(price),
            filled_qty: Some(quantity),
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_then_sell_moves_cash_and_shares() {
        let broker = PaperBroker::new(1_000_000.0);
        broker.set_price("005930", 70_000.0).unwrap();

        let ack = broker.submit_order(Side::Buy, "005930", 3).unwrap();
        assert_eq!(ack.price, Some(70_000.0));
        let balance = broker.get_balance().unwrap();
        assert_eq!(balance.cash, 790_000.0);
        assert_eq!(balance.holding("005930").unwrap().held_qty, 3);

        broker.set_price("005930", 75_000.0).unwrap();
        broker.submit_order(Side::Sell, "005930", 1).unwrap();
        let balance = broker.get_balance().unwrap();
        assert_eq!(balance.cash, 865_000.0);
        let h = balance.holding("005930").unwrap();
        assert_eq!(h.held_qty, 2);
        assert_eq!(h.purchase_amount, 140_000.0);
        assert_eq!(h.pnl, 10_000.0);
    }

    #[test]
    fn buy_beyond_cash_is_business_error() {
        let broker = PaperBroker::new(100.0);
        broker.set_price("005930", 70_000.0).unwrap();
        let failure = broker.submit_order(Side::Buy, "005930", 1).unwrap_err();
        assert!(matches!(failure.error, BrokerError::Business { .. }));
        assert!(failure.raw.unwrap().contains("\"rt_cd\":\"1\""));
    }

    #[test]
    fn order_without_quote_fails() {
        let broker = PaperBroker::new(1_000.0);
        assert!(broker.submit_order(Side::Buy, "000660", 1).is_err());
    }
}
