#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use rltrader::domain::account::{AccountSnapshot, Balance, Holding};
use rltrader::domain::error::{BrokerError, TraderError};
pub use rltrader::domain::ohlcv::OhlcvBar;
use rltrader::domain::observation::Observation;
use rltrader::domain::order::OrderRecord;
use rltrader::domain::risk::{RiskSetting, RiskSettingUpdate, Side};
use rltrader::ports::audit_port::AuditPort;
use rltrader::ports::broker_port::{BrokerPort, OrderAck, SubmitFailure};
use rltrader::ports::data_port::DataPort;
use rltrader::ports::policy_port::{PolicyPort, PolicyStore};
use rltrader::ports::settings_port::SettingsPort;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(code.to_string(), bars);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, TraderError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(TraderError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(code)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, TraderError> {
        let mut codes: Vec<String> = self.data.keys().cloned().collect();
        codes.sort();
        Ok(codes)
    }

    fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TraderError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(TraderError::Database {
                reason: reason.clone(),
            });
        }
        match self.data.get(code) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.date).min().unwrap();
                let max = bars.iter().map(|b| b.date).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

/// Broker double that fills at a fixed price and records every submission.
pub struct MockBroker {
    pub balance: RefCell<Balance>,
    pub fill_price: Option<f64>,
    pub fail_with: Option<SubmitFailure>,
    pub balance_error: Option<BrokerError>,
    pub submissions: RefCell<Vec<(Side, String, i64)>>,
}

impl MockBroker {
    pub fn new(balance: Balance) -> Self {
        Self {
            balance: RefCell::new(balance),
            fill_price: None,
            fail_with: None,
            balance_error: None,
            submissions: RefCell::new(Vec::new()),
        }
    }

    pub fn filling_at(mut self, price: f64) -> Self {
        self.fill_price = Some(price);
        self
    }

    pub fn failing(mut self, failure: SubmitFailure) -> Self {
        self.fail_with = Some(failure);
        self
    }

    pub fn with_balance_error(mut self, error: BrokerError) -> Self {
        self.balance_error = Some(error);
        self
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.borrow().len()
    }
}

impl BrokerPort for MockBroker {
    fn get_balance(&self) -> Result<Balance, BrokerError> {
        if let Some(e) = &self.balance_error {
            return Err(e.clone());
        }
        Ok(self.balance.borrow().clone())
    }

    fn submit_order(&self, side: Side, code: &str, quantity: i64) -> Result<OrderAck, SubmitFailure> {
        self.submissions
            .borrow_mut()
            .push((side, code.to_string(), quantity));
        if let Some(failure) = &self.fail_with {
            return Err(failure.clone());
        }
        Ok(OrderAck {
            status: "0".into(),
            price: self.fill_price,
            filled_qty: Some(quantity),
            raw: r#"{"rt_cd":"0","msg1":"ok"}"#.into(),
        })
    }
}

/// Audit store in memory. `fail_writes` makes every append error.
pub struct MockAudit {
    pub orders: RefCell<Vec<OrderRecord>>,
    pub snapshots: RefCell<Vec<AccountSnapshot>>,
    pub fail_writes: bool,
}

impl MockAudit {
    pub fn new() -> Self {
        Self {
            orders: RefCell::new(Vec::new()),
            snapshots: RefCell::new(Vec::new()),
            fail_writes: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::new()
        }
    }

    fn write_error() -> TraderError {
        TraderError::Database {
            reason: "disk full".into(),
        }
    }
}

impl AuditPort for MockAudit {
    fn append_order(&self, record: &OrderRecord) -> Result<(), TraderError> {
        if self.fail_writes {
            return Err(Self::write_error());
        }
        self.orders.borrow_mut().push(record.clone());
        Ok(())
    }

    fn append_snapshot(&self, snapshot: &AccountSnapshot) -> Result<(), TraderError> {
        if self.fail_writes {
            return Err(Self::write_error());
        }
        self.snapshots.borrow_mut().push(snapshot.clone());
        Ok(())
    }

    fn buy_amount_on(&self, code: &str, day: NaiveDate) -> Result<f64, TraderError> {
        Ok(self
            .orders
            .borrow()
            .iter()
            .filter(|r| r.is_ok() && r.side == Side::Buy && r.code == code)
            .filter(|r| r.timestamp.date() == day)
            .filter_map(|r| r.amount)
            .sum())
    }

    fn order_history(
        &self,
        code: Option<&str>,
        limit: usize,
    ) -> Result<Vec<OrderRecord>, TraderError> {
        Ok(self
            .orders
            .borrow()
            .iter()
            .rev()
            .filter(|r| code.is_none_or(|c| r.code == c))
            .take(limit)
            .cloned()
            .collect())
    }

    fn snapshots_since(&self, cutoff: NaiveDateTime) -> Result<Vec<AccountSnapshot>, TraderError> {
        Ok(self
            .snapshots
            .borrow()
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .cloned()
            .collect())
    }
}

pub struct MockSettings {
    pub rows: RefCell<Vec<RiskSetting>>,
}

impl MockSettings {
    pub fn new() -> Self {
        Self {
            rows: RefCell::new(Vec::new()),
        }
    }

    pub fn with(self, setting: RiskSetting) -> Self {
        self.rows.borrow_mut().push(setting);
        self
    }
}

impl SettingsPort for MockSettings {
    fn risk_settings_for(&self, code: &str) -> Result<Vec<RiskSetting>, TraderError> {
        Ok(self
            .rows
            .borrow()
            .iter()
            .filter(|s| s.code == code || s.code == "ALL")
            .cloned()
            .collect())
    }

    fn list_risk_settings(&self) -> Result<Vec<RiskSetting>, TraderError> {
        Ok(self.rows.borrow().clone())
    }

    fn upsert_risk_setting(
        &self,
        code: &str,
        update: &RiskSettingUpdate,
    ) -> Result<RiskSetting, TraderError> {
        let mut rows = self.rows.borrow_mut();
        let idx = match rows.iter().position(|s| s.code == code) {
            Some(i) => i,
            None => {
                rows.push(RiskSetting::new(code));
                rows.len() - 1
            }
        };
        rows[idx].merge(update);
        Ok(rows[idx].clone())
    }
}

/// Policy that ignores its input.
pub struct ConstantPolicy(pub f64);

impl PolicyPort for ConstantPolicy {
    fn act(&self, _observation: &Observation) -> Result<f64, TraderError> {
        Ok(self.0)
    }
}

/// Per-code constant actions; a missing code fails to load. Counts loads.
pub struct MockPolicyStore {
    pub actions: HashMap<String, f64>,
    pub loads: Cell<usize>,
}

impl MockPolicyStore {
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
            loads: Cell::new(0),
        }
    }

    pub fn with_action(mut self, code: &str, action: f64) -> Self {
        self.actions.insert(code.to_string(), action);
        self
    }
}

impl PolicyStore for MockPolicyStore {
    fn load(&self, code: &str) -> Result<Box<dyn PolicyPort>, TraderError> {
        self.loads.set(self.loads.get() + 1);
        match self.actions.get(code) {
            Some(&a) => Ok(Box::new(ConstantPolicy(a))),
            None => Err(TraderError::Policy {
                reason: format!("no policy for {code}"),
            }),
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(code: &str, date: &str, close: f64) -> OhlcvBar {
    OhlcvBar {
        code: code.to_string(),
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        open: close - 1.0,
        high: close + 1.0,
        low: close - 2.0,
        close,
        volume: 1000,
    }
}

/// `count` consecutive daily bars oscillating around `start_price`.
pub fn generate_bars(code: &str, start_date: &str, count: usize, start_price: f64) -> Vec<OhlcvBar> {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap();
    (0..count)
        .map(|i| {
            let close = start_price + (i % 7) as f64 - 3.0 + i as f64 * 0.1;
            OhlcvBar {
                code: code.to_string(),
                date: start + chrono::Duration::days(i as i64),
                open: close - 0.5,
                high: close + 1.5,
                low: close - 1.5,
                close,
                volume: 1000 + (i % 5) as i64 * 100,
            }
        })
        .collect()
}

pub fn holding(code: &str, held: i64, price: f64) -> Holding {
    Holding {
        code: code.to_string(),
        held_qty: held,
        sellable_qty: held,
        eval_amount: held as f64 * price,
        last_price: Some(price),
        purchase_amount: held as f64 * price,
        pnl: 0.0,
    }
}

pub fn balance(cash: f64, holdings: Vec<Holding>) -> Balance {
    Balance { holdings, cash }
}
