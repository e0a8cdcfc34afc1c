//! Daily OHLCV bar representation and series validation.

use crate::domain::error::TraderError;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub code: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl OhlcvBar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Checks that a series is usable by the indicator engine: non-empty, strictly
/// ascending by date, finite non-negative prices and non-negative volume.
pub fn validate_bars(code: &str, bars: &[OhlcvBar]) -> Result<(), TraderError> {
    if bars.is_empty() {
        return Err(TraderError::NoData { code: code.into() });
    }

    for (i, bar) in bars.iter().enumerate() {
        let prices = [
            ("open", bar.open),
            ("high", bar.high),
            ("low", bar.low),
            ("close", bar.close),
        ];
        for (name, value) in prices {
            if !value.is_finite() {
                return Err(TraderError::InvalidBar {
                    code: code.into(),
                    index: i,
                    reason: format!("{name} is not a finite number"),
                });
            }
            if value < 0.0 {
                return Err(TraderError::InvalidBar {
                    code: code.into(),
                    index: i,
                    reason: format!("{name} is negative ({value})"),
                });
            }
        }
        if bar.volume < 0 {
            return Err(TraderError::InvalidBar {
                code: code.into(),
                index: i,
                reason: format!("volume is negative ({})", bar.volume),
            });
        }
        if i > 0 && bar.date <= bars[i - 1].date {
            return Err(TraderError::NonAscendingDates {
                code: code.into(),
                index: i,
            });
        }
    }

    Ok(())
}
