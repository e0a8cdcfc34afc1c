//! Domain error types.
//!
//! Risk rejections and broker failures are separate enums so a caller can
//! never treat an expected limit breach like a transport failure.

/// A pre-submission limit breach. Expected and recoverable; never audited.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RiskRejection {
    #[error(
        "daily buy cap exceeded for {code}: spent {spent:.0} today, order ~{estimated:.0}, remaining {remaining:.0} of {cap:.0}"
    )]
    DailyBuyCap {
        code: String,
        spent: f64,
        estimated: f64,
        remaining: f64,
        cap: f64,
    },

    #[error("position cap exceeded for {code}: max {max_shares} shares, holding {held}, requested {requested}")]
    PositionCap {
        code: String,
        max_shares: i64,
        held: i64,
        requested: i64,
    },

    #[error("weight cap exceeded for {code}: projected weight {:.1}% above max {:.0}%", .projected * 100.0, .max * 100.0)]
    WeightCap {
        code: String,
        projected: f64,
        max: f64,
    },

    #[error("cannot sell {requested} shares of {code}: only {sellable} sellable")]
    InsufficientSellable {
        code: String,
        sellable: i64,
        requested: i64,
    },
}

/// Failure talking to the brokerage. Always audited as an ERROR order when it
/// happens during submission.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BrokerError {
    #[error("broker transport error: {reason}")]
    Transport { reason: String },

    #[error("broker request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("broker rejected request (code {code}): {message}")]
    Business { code: String, message: String },

    #[error("invalid broker response: {reason}")]
    InvalidResponse { reason: String },
}

/// Top-level error type for rltrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no data for {code}")]
    NoData { code: String },

    #[error("insufficient data for {code}: have {bars} bars, need {minimum}")]
    InsufficientData {
        code: String,
        bars: usize,
        minimum: usize,
    },

    #[error("dates for {code} are not strictly ascending at bar {index}")]
    NonAscendingDates { code: String, index: usize },

    #[error("invalid bar for {code} at index {index}: {reason}")]
    InvalidBar {
        code: String,
        index: usize,
        reason: String,
    },

    #[error("invalid order: {reason}")]
    InvalidOrder { reason: String },

    #[error("no known price for {code}")]
    NoPrice { code: String },

    #[error("risk limit: {0}")]
    Risk(#[from] RiskRejection),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("simulation error: {reason}")]
    Simulation { reason: String },

    #[error("policy error: {reason}")]
    Policy { reason: String },

    #[error("trading run aborted after {elapsed_secs}s")]
    RunTimeout { elapsed_secs: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    pub fn is_risk_rejection(&self) -> bool {
        matches!(self, TraderError::Risk(_))
    }

    pub fn is_broker_error(&self) -> bool {
        matches!(self, TraderError::Broker(_))
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. } => 2,
            TraderError::Database { .. } | TraderError::DatabaseQuery { .. } => 3,
            TraderError::Risk(_) | TraderError::InvalidOrder { .. } => 4,
            TraderError::NoData { .. }
            | TraderError::InsufficientData { .. }
            | TraderError::NonAscendingDates { .. }
            | TraderError::InvalidBar { .. }
            | TraderError::NoPrice { .. } => 5,
            TraderError::Broker(_) => 6,
            TraderError::Simulation { .. }
            | TraderError::Policy { .. }
            | TraderError::RunTimeout { .. } => 7,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_cap_message_cites_limit() {
        let err = RiskRejection::PositionCap {
            code: "005930".into(),
            max_shares: 10,
            held: 8,
            requested: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("max 10 shares"), "{msg}");
        assert!(msg.contains("holding 8"), "{msg}");
    }

    #[test]
    fn weight_cap_message_in_percent() {
        let err = RiskRejection::WeightCap {
            code: "005930".into(),
            projected: 0.625,
            max: 0.5,
        };
        assert!(err.to_string().contains("62.5%"));
        assert!(err.to_string().contains("50%"));
    }

    #[test]
    fn risk_and_broker_are_distinguishable() {
        let risk: TraderError = RiskRejection::InsufficientSellable {
            code: "A".into(),
            sellable: 0,
            requested: 1,
        }
        .into();
        let broker: TraderError = BrokerError::Transport {
            reason: "connection reset".into(),
        }
        .into();

        assert!(risk.is_risk_rejection());
        assert!(!risk.is_broker_error());
        assert!(broker.is_broker_error());
        assert!(!broker.is_risk_rejection());
    }

    #[test]
    fn broker_business_message() {
        let err = BrokerError::Business {
            code: "1".into(),
            message: "market closed".into(),
        };
        assert_eq!(
            err.to_string(),
            "broker rejected request (code 1): market closed"
        );
    }
}
