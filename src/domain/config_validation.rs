//! Configuration validation.
//!
//! Each section is checked and turned into its typed config before use.
//! Absent keys take the built-in defaults; present but invalid values fail.

use std::time::Duration;

use crate::domain::error::TraderError;
use crate::domain::risk::RiskLimits;
use crate::domain::simulation::EnvConfig;
use crate::domain::trading::TraderConfig;
use crate::ports::config_port::ConfigPort;

fn invalid(section: &str, key: &str, reason: &str) -> TraderError {
    TraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

pub fn env_config(config: &dyn ConfigPort) -> Result<EnvConfig, TraderError> {
    let defaults = EnvConfig::default();

    let window_size = config.get_int("env", "window_size", defaults.window_size as i64);
    if window_size < 1 {
        return Err(invalid("env", "window_size", "window_size must be at least 1"));
    }

    let initial_cash = config.get_double("env", "initial_cash", defaults.initial_cash);
    if !(initial_cash.is_finite() && initial_cash > 0.0) {
        return Err(invalid("env", "initial_cash", "initial_cash must be positive"));
    }

    let max_position = config.get_double("env", "max_position", defaults.max_position);
    if !(0.0..=1.0).contains(&max_position) {
        return Err(invalid(
            "env",
            "max_position",
            "max_position must be between 0 and 1",
        ));
    }

    let transaction_cost = config.get_double("env", "transaction_cost", defaults.transaction_cost);
    if !(0.0..1.0).contains(&transaction_cost) {
        return Err(invalid(
            "env",
            "transaction_cost",
            "transaction_cost must be in [0, 1)",
        ));
    }

    let reward_scale = config.get_double("env", "reward_scale", defaults.reward_scale);
    if !(reward_scale.is_finite() && reward_scale > 0.0) {
        return Err(invalid("env", "reward_scale", "reward_scale must be positive"));
    }

    Ok(EnvConfig {
        window_size: window_size as usize,
        initial_cash,
        max_position,
        transaction_cost,
        reward_scale,
    })
}

/// Process-wide fallbacks used when no settings row covers an instrument.
pub fn risk_defaults(config: &dyn ConfigPort) -> Result<RiskLimits, TraderError> {
    let defaults = RiskLimits::default();

    let max_position_shares =
        config.get_int("risk", "max_position_shares", defaults.max_position_shares);
    if max_position_shares < 0 {
        return Err(invalid(
            "risk",
            "max_position_shares",
            "max_position_shares must be non-negative",
        ));
    }

    let max_weight_pct = config.get_double("risk", "max_weight_pct", defaults.max_weight_pct);
    if !(0.0..=1.0).contains(&max_weight_pct) {
        return Err(invalid(
            "risk",
            "max_weight_pct",
            "max_weight_pct must be between 0 and 1",
        ));
    }

    let max_daily_buy_amount =
        config.get_double("risk", "max_daily_buy_amount", defaults.max_daily_buy_amount);
    if !(max_daily_buy_amount.is_finite() && max_daily_buy_amount >= 0.0) {
        return Err(invalid(
            "risk",
            "max_daily_buy_amount",
            "max_daily_buy_amount must be non-negative (0 disables)",
        ));
    }

    Ok(RiskLimits {
        max_position_shares,
        max_weight_pct,
        max_daily_buy_amount,
    })
}

pub fn parse_codes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

pub fn trader_config(config: &dyn ConfigPort) -> Result<TraderConfig, TraderError> {
    let defaults = TraderConfig::default();

    let codes = parse_codes(&config.require_string("trader", "codes")?);
    if codes.is_empty() {
        return Err(TraderError::ConfigMissing {
            section: "trader".to_string(),
            key: "codes".to_string(),
        });
    }

    let buy_threshold = config.get_double("trader", "buy_threshold", defaults.buy_threshold);
    let sell_threshold = config.get_double("trader", "sell_threshold", defaults.sell_threshold);
    if !(-1.0..=1.0).contains(&buy_threshold) {
        return Err(invalid(
            "trader",
            "buy_threshold",
            "buy_threshold must be between -1 and 1",
        ));
    }
    if !(-1.0..=1.0).contains(&sell_threshold) {
        return Err(invalid(
            "trader",
            "sell_threshold",
            "sell_threshold must be between -1 and 1",
        ));
    }
    if sell_threshold > buy_threshold {
        return Err(invalid(
            "trader",
            "sell_threshold",
            "sell_threshold must not exceed buy_threshold",
        ));
    }

    let order_quantity = config.get_int("trader", "order_quantity", defaults.order_quantity);
    if order_quantity < 1 {
        return Err(invalid(
            "trader",
            "order_quantity",
            "order_quantity must be at least 1",
        ));
    }

    let run_timeout_secs = config.get_int(
        "trader",
        "run_timeout_secs",
        defaults.run_timeout.as_secs() as i64,
    );
    if run_timeout_secs < 1 {
        return Err(invalid(
            "trader",
            "run_timeout_secs",
            "run_timeout_secs must be at least 1",
        ));
    }

    let window_size = env_config(config)?.window_size;

    Ok(TraderConfig {
        codes,
        buy_threshold,
        sell_threshold,
        order_quantity,
        window_size,
        run_timeout: Duration::from_secs(run_timeout_secs as u64),
    })
}

/// Lookback for performance queries, in days.
pub fn validate_lookback_days(days: i64) -> Result<i64, TraderError> {
    if !(1..=365).contains(&days) {
        return Err(TraderError::ConfigInvalid {
            section: "performance".to_string(),
            key: "days".to_string(),
            reason: "days must be between 1 and 365".to_string(),
        });
    }
    Ok(days)
}
