//! Order execution behind the risk gate, with unconditional auditing.
//!
//! Every submission attempt produces exactly one audit record whatever the
//! broker says. Risk rejections stop before submission and are never audited.
//! A failing audit store is logged and ignored so the caller always learns
//! the broker outcome.

use chrono::{Local, NaiveDateTime};

use super::account::AccountSnapshot;
use super::error::TraderError;
use super::order::{OrderRecord, OrderStatus};
use super::risk::{OrderRequest, RiskLimits, Side, check_risk, resolve_limits};
use crate::ports::audit_port::AuditPort;
use crate::ports::broker_port::BrokerPort;
use crate::ports::data_port::DataPort;
use crate::ports::settings_port::SettingsPort;

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Whole shares affordable for `amount` at `price`, rounded down.
pub fn quantity_for_amount(amount: f64, price: f64) -> i64 {
    if !(amount.is_finite() && price.is_finite()) || amount <= 0.0 || price <= 0.0 {
        return 0;
    }
    (amount / price).floor() as i64
}

/// Collaborators for one order flow. Owned by the caller; nothing here is
/// global.
pub struct OrderExecutor<'a> {
    broker: &'a dyn BrokerPort,
    audit: &'a dyn AuditPort,
    settings: &'a dyn SettingsPort,
    data: &'a dyn DataPort,
    defaults: RiskLimits,
    clock: fn() -> NaiveDateTime,
}

impl<'a> OrderExecutor<'a> {
    pub fn new(
        broker: &'a dyn BrokerPort,
        audit: &'a dyn AuditPort,
        settings: &'a dyn SettingsPort,
        data: &'a dyn DataPort,
        defaults: RiskLimits,
    ) -> Self {
        Self {
            broker,
            audit,
            settings,
            data,
            defaults,
            clock: local_now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Gate, submit and audit one share-denominated order.
    ///
    /// Returns the audit record for an accepted order. A broker failure is
    /// audited as ERROR and then returned as [`TraderError::Broker`].
    pub fn execute_and_audit(
        &self,
        side: Side,
        code: &str,
        quantity: i64,
    ) -> Result<OrderRecord, TraderError> {
        if quantity <= 0 {
            return Err(TraderError::InvalidOrder {
                reason: format!("quantity must be positive, got {quantity}"),
            });
        }

        let balance = self.broker.get_balance()?;
        let reference_price = match self.data.latest_close(code) {
            Ok(price) => price,
            Err(e) => {
                tracing::debug!(code, error = %e, "no reference close available");
                None
            }
        };

        let settings = self.settings.risk_settings_for(code)?;
        let limits = resolve_limits(code, &settings, &self.defaults);

        let now = (self.clock)();
        let spent_today = if side == Side::Buy && limits.max_daily_buy_amount > 0.0 {
            self.audit.buy_amount_on(code, now.date())?
        } else {
            0.0
        };

        let request = OrderRequest {
            side,
            code: code.to_string(),
            quantity,
            reference_price,
        };
        if let Err(rejection) = check_risk(&request, &balance, &limits, spent_today) {
            tracing::warn!(code, %side, quantity, reason = %rejection, "order rejected by risk gate");
            return Err(rejection.into());
        }

        let quote = balance
            .holding(code)
            .and_then(|h| h.last_price)
            .filter(|p| *p > 0.0)
            .or(reference_price);

        let outcome = self.broker.submit_order(side, code, quantity);
        let (record, failure) = match outcome {
            Ok(ack) => {
                let price = ack.price.filter(|p| *p > 0.0).or(quote);
                let record = OrderRecord {
                    timestamp: now,
                    code: code.to_string(),
                    side,
                    quantity,
                    price,
                    amount: price.map(|p| p * quantity as f64),
                    status: OrderStatus::Ok,
                    raw_response: ack.raw,
                };
                (record, None)
            }
            Err(failure) => {
                let record = OrderRecord {
                    timestamp: now,
                    code: code.to_string(),
                    side,
                    quantity,
                    price: quote,
                    amount: quote.map(|p| p * quantity as f64),
                    status: OrderStatus::Error,
                    raw_response: failure
                        .raw
                        .clone()
                        .unwrap_or_else(|| failure.error.to_string()),
                };
                (record, Some(failure.error))
            }
        };

        if let Err(e) = self.audit.append_order(&record) {
            tracing::error!(code, %side, quantity, error = %e, "failed to persist order record");
        }

        match failure {
            Some(error) => {
                tracing::error!(code, %side, quantity, error = %error, "order failed at broker");
                Err(error.into())
            }
            None => {
                tracing::info!(code, %side, quantity, price = ?record.price, "order placed");
                Ok(record)
            }
        }
    }

    /// Converts a currency amount into whole shares at the latest known close
    /// and places that order.
    pub fn place_amount_order(
        &self,
        side: Side,
        code: &str,
        amount: f64,
    ) -> Result<OrderRecord, TraderError> {
        let price = self
            .data
            .latest_close(code)?
            .filter(|p| *p > 0.0)
            .ok_or_else(|| TraderError::NoPrice {
                code: code.to_string(),
            })?;

        let quantity = quantity_for_amount(amount, price);
        if quantity == 0 {
            return Err(TraderError::InvalidOrder {
                reason: format!("amount {amount:.0} buys zero shares of {code} at {price:.2}"),
            });
        }
        self.execute_and_audit(side, code, quantity)
    }

    /// Queries the balance, appends a snapshot to the audit store and returns it.
    pub fn record_balance_snapshot(&self) -> Result<AccountSnapshot, TraderError> {
        let balance = self.broker.get_balance()?;
        let snapshot = AccountSnapshot::from_balance(&balance, (self.clock)());
        if let Err(e) = self.audit.append_snapshot(&snapshot) {
            tracing::error!(error = %e, "failed to persist account snapshot");
        }
        Ok(snapshot)
    }
}
