//! Scheduled trading cycle: one policy decision and at most one order per
//! configured instrument.

use std::fmt;
use std::time::{Duration, Instant};

use super::error::TraderError;
use super::execution::OrderExecutor;
use super::indicator::compute_indicators;
use super::observation::build_latest_observation;
use super::order::OrderRecord;
use super::risk::Side;
use crate::ports::data_port::DataPort;
use crate::ports::policy_port::PolicyStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Buy,
    Sell,
    Hold,
}

impl Decision {
    pub fn side(&self) -> Option<Side> {
        match self {
            Decision::Buy => Some(Side::Buy),
            Decision::Sell => Some(Side::Sell),
            Decision::Hold => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Buy => write!(f, "BUY"),
            Decision::Sell => write!(f, "SELL"),
            Decision::Hold => write!(f, "HOLD"),
        }
    }
}

/// Thresholds are exclusive: an action equal to either one holds.
pub fn decide(action: f64, buy_threshold: f64, sell_threshold: f64) -> Decision {
    if action > buy_threshold {
        Decision::Buy
    } else if action < sell_threshold {
        Decision::Sell
    } else {
        Decision::Hold
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraderConfig {
    pub codes: Vec<String>,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    pub order_quantity: i64,
    pub window_size: usize,
    pub run_timeout: Duration,
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            codes: Vec::new(),
            buy_threshold: 0.3,
            sell_threshold: -0.3,
            order_quantity: 1,
            window_size: 60,
            run_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleStatus {
    Held,
    Ordered(OrderRecord),
    Rejected(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub code: String,
    pub action: Option<f64>,
    pub decision: Option<Decision>,
    pub status: CycleStatus,
}

pub struct TradingContext<'a> {
    pub data: &'a dyn DataPort,
    pub policies: &'a dyn PolicyStore,
    pub executor: &'a OrderExecutor<'a>,
}

/// Runs one decision per instrument in order.
///
/// Failures for one instrument are logged and recorded in its outcome; the
/// cycle moves on. The whole run aborts with [`TraderError::RunTimeout`] once
/// the deadline passes, checked before each instrument.
pub fn run_trading_cycle(
    ctx: &TradingContext<'_>,
    config: &TraderConfig,
) -> Result<Vec<CycleOutcome>, TraderError> {
    let started = Instant::now();
    let mut outcomes = Vec::with_capacity(config.codes.len());

    tracing::info!(instruments = config.codes.len(), "trading cycle started");

    for code in &config.codes {
        let elapsed = started.elapsed();
        if elapsed >= config.run_timeout {
            tracing::error!(elapsed_secs = elapsed.as_secs(), "trading cycle timed out");
            return Err(TraderError::RunTimeout {
                elapsed_secs: elapsed.as_secs(),
            });
        }

        let outcome = trade_one(ctx, config, code);
        match &outcome.status {
            CycleStatus::Failed(reason) => {
                tracing::warn!(code = %code, reason = %reason, "instrument skipped");
            }
            CycleStatus::Rejected(reason) => {
                tracing::info!(code = %code, reason = %reason, "order skipped by risk gate");
            }
            _ => {}
        }
        outcomes.push(outcome);
    }

    tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "trading cycle finished");
    Ok(outcomes)
}

fn trade_one(ctx: &TradingContext<'_>, config: &TraderConfig, code: &str) -> CycleOutcome {
    let mut outcome = CycleOutcome {
        code: code.to_string(),
        action: None,
        decision: None,
        status: CycleStatus::Held,
    };

    let action = match infer_action(ctx, config, code) {
        Ok(action) => action,
        Err(e) => {
            outcome.status = CycleStatus::Failed(e.to_string());
            return outcome;
        }
    };
    let decision = decide(action, config.buy_threshold, config.sell_threshold);
    outcome.action = Some(action);
    outcome.decision = Some(decision);
    tracing::info!(code, action, %decision, "policy decision");

    let Some(side) = decision.side() else {
        return outcome;
    };

    outcome.status = match ctx
        .executor
        .execute_and_audit(side, code, config.order_quantity)
    {
        Ok(record) => CycleStatus::Ordered(record),
        Err(e) if e.is_risk_rejection() => CycleStatus::Rejected(e.to_string()),
        Err(e) => CycleStatus::Failed(e.to_string()),
    };
    outcome
}

fn infer_action(
    ctx: &TradingContext<'_>,
    config: &TraderConfig,
    code: &str,
) -> Result<f64, TraderError> {
    let policy = ctx.policies.load(code)?;
    let bars = ctx.data.fetch_all(code)?;
    let features = compute_indicators(code, &bars)?;
    let observation = build_latest_observation(&features, config.window_size)?;
    let action = policy.act(&observation)?;
    if !action.is_finite() {
        return Err(TraderError::Policy {
            reason: format!("policy for {code} returned {action}"),
        });
    }
    Ok(action)
}
