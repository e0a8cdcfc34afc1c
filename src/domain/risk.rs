//! Pre-submission risk gate.
//!
//! [`check_risk`] is a pure decision over the order, a live balance snapshot
//! and resolved limits. The caller reads the balance immediately before the
//! check; nothing here makes that read-then-decide sequence atomic.

use super::account::Balance;
use super::error::{RiskRejection, TraderError};
use std::fmt;
use std::str::FromStr;

/// Wildcard settings row applying to every instrument.
pub const ALL_CODES: &str = "ALL";

const DAILY_CAP_TOLERANCE: f64 = 1e-6;
const WEIGHT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(TraderError::InvalidOrder {
                reason: format!("unknown side '{other}'"),
            }),
        }
    }
}

/// A stored settings row, keyed by instrument code or [`ALL_CODES`].
/// `None` fields fall back to the process defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskSetting {
    pub code: String,
    pub max_position_shares: Option<i64>,
    pub max_weight_pct: Option<f64>,
    pub max_daily_buy_amount: Option<f64>,
    pub active: bool,
}

/// Partial update applied by a settings upsert; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskSettingUpdate {
    pub max_position_shares: Option<i64>,
    pub max_weight_pct: Option<f64>,
    pub max_daily_buy_amount: Option<f64>,
    pub active: Option<bool>,
}

impl RiskSetting {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            max_position_shares: None,
            max_weight_pct: None,
            max_daily_buy_amount: None,
            active: true,
        }
    }

    pub fn merge(&mut self, update: &RiskSettingUpdate) {
        if let Some(v) = update.max_position_shares {
            self.max_position_shares = Some(v);
        }
        if let Some(v) = update.max_weight_pct {
            self.max_weight_pct = Some(v);
        }
        if let Some(v) = update.max_daily_buy_amount {
            self.max_daily_buy_amount = Some(v);
        }
        if let Some(v) = update.active {
            self.active = v;
        }
    }
}

/// Fully resolved limits for one instrument. `Default` holds the built-in
/// process defaults; a daily cap of 0 disables that check.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskLimits {
    pub max_position_shares: i64,
    pub max_weight_pct: f64,
    pub max_daily_buy_amount: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_shares: 10,
            max_weight_pct: 0.5,
            max_daily_buy_amount: 0.0,
        }
    }
}

/// Picks the active instrument row, else the active `ALL` row, and fills any
/// unset field from `defaults`.
pub fn resolve_limits(code: &str, settings: &[RiskSetting], defaults: &RiskLimits) -> RiskLimits {
    let row = settings
        .iter()
        .find(|s| s.active && s.code == code)
        .or_else(|| settings.iter().find(|s| s.active && s.code == ALL_CODES));

    let Some(row) = row else {
        return defaults.clone();
    };

    RiskLimits {
        max_position_shares: row
            .max_position_shares
            .unwrap_or(defaults.max_position_shares),
        max_weight_pct: row.max_weight_pct.unwrap_or(defaults.max_weight_pct),
        max_daily_buy_amount: row
            .max_daily_buy_amount
            .unwrap_or(defaults.max_daily_buy_amount),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub side: Side,
    pub code: String,
    pub quantity: i64,
    /// Last known close, used when the balance carries no live quote.
    pub reference_price: Option<f64>,
}

/// Validates one order. BUY checks run daily cap, position cap, then weight
/// cap, and the first failure wins. SELL only checks sellable quantity.
///
/// `spent_today` is the amount of today's OK-status BUY orders already placed
/// for this instrument.
pub fn check_risk(
    request: &OrderRequest,
    balance: &Balance,
    limits: &RiskLimits,
    spent_today: f64,
) -> Result<(), RiskRejection> {
    let holding = balance.holding(&request.code);
    let held = holding.map_or(0, |h| h.held_qty);
    let qty = request.quantity;

    match request.side {
        Side::Sell => {
            let sellable = holding.map_or(0, |h| h.sellable_qty);
            if qty > sellable {
                return Err(RiskRejection::InsufficientSellable {
                    code: request.code.clone(),
                    sellable,
                    requested: qty,
                });
            }
            Ok(())
        }
        Side::Buy => {
            let quote = holding
                .and_then(|h| h.last_price)
                .filter(|p| *p > 0.0)
                .or(request.reference_price.filter(|p| *p > 0.0));

            if limits.max_daily_buy_amount > 0.0 {
                let estimated = quote.map_or(0.0, |p| p * qty as f64);
                if estimated > 0.0
                    && spent_today + estimated > limits.max_daily_buy_amount + DAILY_CAP_TOLERANCE
                {
                    return Err(RiskRejection::DailyBuyCap {
                        code: request.code.clone(),
                        spent: spent_today,
                        estimated,
                        remaining: (limits.max_daily_buy_amount - spent_today).max(0.0),
                        cap: limits.max_daily_buy_amount,
                    });
                }
            }

            if held
                .checked_add(qty)
                .is_none_or(|total| total > limits.max_position_shares)
            {
                return Err(RiskRejection::PositionCap {
                    code: request.code.clone(),
                    max_shares: limits.max_position_shares,
                    held,
                    requested: qty,
                });
            }

            let total_value = balance.total_value();
            if total_value > 0.0 {
                let price = quote.or_else(|| holding.and_then(|h| h.average_price()));
                if let Some(price) = price {
                    let current_eval = holding.map_or(0.0, |h| h.eval_amount);
                    let projected_value = current_eval + price * qty as f64;
                    let projected_total = total_value - current_eval + projected_value;
                    if projected_total > 0.0 {
                        let weight = projected_value / projected_total;
                        if weight > limits.max_weight_pct + WEIGHT_TOLERANCE {
                            return Err(RiskRejection::WeightCap {
                                code: request.code.clone(),
                                projected: weight,
                                max: limits.max_weight_pct,
                            });
                        }
                    }
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::Holding;

    fn holding(code: &str, held: i64, sellable: i64, eval: f64, price: Option<f64>) -> Holding {
        Holding {
            code: code.into(),
            held_qty: held,
            sellable_qty: sellable,
            eval_amount: eval,
            last_price: price,
            purchase_amount: eval,
            pnl: 0.0,
        }
    }

    fn buy(code: &str, qty: i64) -> OrderRequest {
        OrderRequest {
            side: Side::Buy,
            code: code.into(),
            quantity: qty,
            reference_price: None,
        }
    }

    fn sell(code: &str, qty: i64) -> OrderRequest {
        OrderRequest {
            side: Side::Sell,
            ..buy(code, qty)
        }
    }

    fn loose_limits() -> RiskLimits {
        RiskLimits {
            max_position_shares: 1_000,
            max_weight_pct: 1.0,
            max_daily_buy_amount: 0.0,
        }
    }

    #[test]
    fn position_cap_rejects_buy_over_limit() {
        let balance = Balance {
            holdings: vec![holding("005930", 8, 8, 800.0, Some(100.0))],
            cash: 1_000_000.0,
        };
        let limits = RiskLimits {
            max_position_shares: 10,
            ..loose_limits()
        };
        let err = check_risk(&buy("005930", 3), &balance, &limits, 0.0).unwrap_err();
        assert!(matches!(
            err,
            RiskRejection::PositionCap { max_shares: 10, held: 8, requested: 3, .. }
        ));
        assert!(err.to_string().contains("max 10 shares"));
    }

    #[test]
    fn position_cap_rejects_quantity_that_would_overflow() {
        let balance = Balance {
            holdings: vec![holding("005930", 8, 8, 800.0, Some(100.0))],
            cash: 1_000_000.0,
        };
        let limits = RiskLimits {
            max_position_shares: 10,
            max_weight_pct: 1.0,
            ..loose_limits()
        };
        let err = check_risk(&buy("005930", i64::MAX), &balance, &limits, 0.0).unwrap_err();
        assert!(matches!(
            err,
            RiskRejection::PositionCap { held: 8, requested: i64::MAX, .. }
        ));
    }

    #[test]
    fn position_cap_allows_exact_limit() {
        let balance = Balance {
            holdings: vec![holding("005930", 8, 8, 800.0, Some(100.0))],
            cash: 1_000_000.0,
        };
        let limits = RiskLimits {
            max_position_shares: 10,
            ..loose_limits()
        };
        assert!(check_risk(&buy("005930", 2), &balance, &limits, 0.0).is_ok());
    }

    #[test]
    fn daily_cap_counts_prior_spend() {
        let balance = Balance {
            holdings: vec![holding("005930", 0, 0, 0.0, Some(100.0))],
            cash: 1_000_000.0,
        };
        let limits = RiskLimits {
            max_daily_buy_amount: 1_000.0,
            ..loose_limits()
        };
        assert!(check_risk(&buy("005930", 5), &balance, &limits, 500.0).is_ok());
        let err = check_risk(&buy("005930", 6), &balance, &limits, 500.0).unwrap_err();
        match err {
            RiskRejection::DailyBuyCap { remaining, estimated, .. } => {
                assert_eq!(remaining, 500.0);
                assert_eq!(estimated, 600.0);
            }
            other => panic!("unexpected rejection {other:?}"),
        }
    }

    #[test]
    fn daily_cap_checked_before_position_cap() {
        let balance = Balance {
            holdings: vec![holding("005930", 10, 10, 1000.0, Some(100.0))],
            cash: 1_000_000.0,
        };
        let limits = RiskLimits {
            max_position_shares: 10,
            max_weight_pct: 1.0,
            max_daily_buy_amount: 50.0,
        };
        let err = check_risk(&buy("005930", 1), &balance, &limits, 0.0).unwrap_err();
        assert!(matches!(err, RiskRejection::DailyBuyCap { .. }));
    }

    #[test]
    fn daily_cap_skipped_without_price() {
        let balance = Balance {
            holdings: vec![],
            cash: 1_000_000.0,
        };
        let limits = RiskLimits {
            max_daily_buy_amount: 1.0,
            ..loose_limits()
        };
        assert!(check_risk(&buy("005930", 5), &balance, &limits, 10.0).is_ok());
    }

    #[test]
    fn daily_cap_uses_reference_price_fallback() {
        let balance = Balance {
            holdings: vec![],
            cash: 1_000_000.0,
        };
        let limits = RiskLimits {
            max_daily_buy_amount: 100.0,
            ..loose_limits()
        };
        let mut request = buy("005930", 2);
        request.reference_price = Some(60.0);
        assert!(matches!(
            check_risk(&request, &balance, &limits, 0.0),
            Err(RiskRejection::DailyBuyCap { .. })
        ));
    }

    #[test]
    fn weight_cap_rejects_concentration() {
        // 500 held + 5 × 100 new = 1000 of projected total 1500
        let balance = Balance {
            holdings: vec![holding("005930", 5, 5, 500.0, Some(100.0))],
            cash: 500.0,
        };
        let limits = RiskLimits {
            max_weight_pct: 0.5,
            ..loose_limits()
        };
        let err = check_risk(&buy("005930", 5), &balance, &limits, 0.0).unwrap_err();
        match err {
            RiskRejection::WeightCap { projected, .. } => {
                assert!((projected - 1000.0 / 1500.0).abs() < 1e-12);
            }
            other => panic!("unexpected rejection {other:?}"),
        }
    }

    #[test]
    fn weight_cap_falls_back_to_average_price() {
        let balance = Balance {
            holdings: vec![holding("005930", 5, 5, 500.0, None)],
            cash: 500.0,
        };
        let limits = RiskLimits {
            max_weight_pct: 0.5,
            ..loose_limits()
        };
        assert!(matches!(
            check_risk(&buy("005930", 1), &balance, &limits, 0.0),
            Err(RiskRejection::WeightCap { .. })
        ));
    }

    #[test]
    fn weight_cap_skipped_when_no_price_derivable() {
        let balance = Balance {
            holdings: vec![],
            cash: 1_000.0,
        };
        let limits = RiskLimits {
            max_weight_pct: 0.01,
            ..loose_limits()
        };
        assert!(check_risk(&buy("005930", 5), &balance, &limits, 0.0).is_ok());
    }

    #[test]
    fn weight_cap_skipped_for_empty_account() {
        let limits = RiskLimits {
            max_weight_pct: 0.01,
            ..loose_limits()
        };
        let mut request = buy("005930", 1);
        request.reference_price = Some(100.0);
        assert!(check_risk(&request, &Balance::default(), &limits, 0.0).is_ok());
    }

    #[test]
    fn sell_limited_to_sellable_quantity() {
        let balance = Balance {
            holdings: vec![holding("005930", 10, 4, 1000.0, Some(100.0))],
            cash: 0.0,
        };
        let limits = RiskLimits {
            max_daily_buy_amount: 1.0,
            max_weight_pct: 0.0,
            max_position_shares: 0,
        };
        assert!(check_risk(&sell("005930", 4), &balance, &limits, 1e9).is_ok());
        assert!(matches!(
            check_risk(&sell("005930", 5), &balance, &limits, 0.0),
            Err(RiskRejection::InsufficientSellable { sellable: 4, requested: 5, .. })
        ));
    }

    #[test]
    fn sell_without_holding_is_rejected() {
        assert!(check_risk(&sell("005930", 1), &Balance::default(), &loose_limits(), 0.0).is_err());
    }

    #[test]
    fn instrument_row_overrides_wildcard() {
        let mut all = RiskSetting::new(ALL_CODES);
        all.max_position_shares = Some(50);
        all.max_weight_pct = Some(0.3);
        let mut specific = RiskSetting::new("005930");
        specific.max_position_shares = Some(5);

        let settings = vec![all, specific];
        let limits = resolve_limits("005930", &settings, &RiskLimits::default());
        assert_eq!(limits.max_position_shares, 5);
        // unset field on the winning row falls back to the process default
        assert_eq!(limits.max_weight_pct, 0.5);

        let other = resolve_limits("000660", &settings, &RiskLimits::default());
        assert_eq!(other.max_position_shares, 50);
        assert_eq!(other.max_weight_pct, 0.3);
    }

    #[test]
    fn inactive_rows_are_ignored() {
        let mut specific = RiskSetting::new("005930");
        specific.max_position_shares = Some(1);
        specific.active = false;
        let limits = resolve_limits("005930", &[specific], &RiskLimits::default());
        assert_eq!(limits, RiskLimits::default());
    }

    #[test]
    fn merge_keeps_unset_fields() {
        let mut row = RiskSetting::new("005930");
        row.max_position_shares = Some(7);
        row.merge(&RiskSettingUpdate {
            max_weight_pct: Some(0.2),
            ..Default::default()
        });
        assert_eq!(row.max_position_shares, Some(7));
        assert_eq!(row.max_weight_pct, Some(0.2));
        assert!(row.active);
    }

    #[test]
    fn side_parses_case_insensitively() {
        assert_eq!("buy".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!(" SELL ".parse::<Side>().unwrap(), Side::Sell);
        assert!("hold".parse::<Side>().is_err());
    }
}
