//! RSI (Relative Strength Index).
//!
//! gain/loss are the simple rolling means of the positive and negative parts
//! of the close-to-close change; the first change is taken as 0.
//! RSI = 100 - 100 / (1 + gain/loss). A window with no losses has no defined
//! ratio and yields `None` rather than a forced 100.

use crate::domain::indicator::rolling::rolling_mean;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_rsi(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let mut gains = Vec::with_capacity(bars.len());
    let mut losses = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        let change = if i == 0 {
            0.0
        } else {
            bar.close - bars[i - 1].close
        };
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let avg_gain = rolling_mean(&gains, period);
    let avg_loss = rolling_mean(&losses, period);

    let values = avg_gain
        .into_iter()
        .zip(avg_loss)
        .map(|(gain, loss)| match (gain, loss) {
            (Some(gain), Some(loss)) if loss > 0.0 => Some(100.0 - 100.0 / (1.0 + gain / loss)),
            _ => None,
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bar(date: &str, close: f64) -> OhlcvBar {
        OhlcvBar {
            code: "TEST".into(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000,
        }
    }

    fn series_from(closes: &[f64]) -> Vec<OhlcvBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| make_bar(&format!("2024-01-{:02}", i + 1), c))
            .collect()
    }

    #[test]
    fn rsi_warmup_period() {
        let bars = series_from(&(0..16).map(|i| 100.0 + (i % 3) as f64).collect::<Vec<_>>());
        let series = calculate_rsi(&bars, 14);

        for i in 0..13 {
            assert!(series.values[i].is_none(), "bar {i} should be undefined");
        }
        assert!(series.values[13].is_some());
    }

    #[test]
    fn rsi_all_gains_is_undefined_not_100() {
        let bars = series_from(&(0..15).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
        let series = calculate_rsi(&bars, 14);
        assert!(series.values[14].is_none());
    }

    #[test]
    fn rsi_flat_window_is_undefined() {
        let bars = series_from(&[50.0; 20]);
        let series = calculate_rsi(&bars, 14);
        assert!(series.values.iter().all(|v| v.is_none()));
    }

    #[test]
    fn rsi_all_losses_is_zero() {
        let bars = series_from(&(0..15).map(|i| 100.0 - i as f64).collect::<Vec<_>>());
        let series = calculate_rsi(&bars, 14);
        assert!(series.values[14].unwrap().abs() < 1e-12);
    }

    #[test]
    fn rsi_known_value() {
        // changes: +2, -1, +2 over a 3-bar window (first change is 0)
        let bars = series_from(&[10.0, 12.0, 11.0, 13.0]);
        let series = calculate_rsi(&bars, 3);
        // window at index 3 holds changes +2, -1, +2: gain 4/3, loss 1/3, rs 4
        let rsi = series.values[3].unwrap();
        assert!((rsi - 80.0).abs() < 1e-9);
    }

    #[test]
    fn rsi_in_range() {
        let closes: Vec<f64> = (1..=30)
            .map(|i| 100.0 + (i as f64 % 7.0 - 3.0) * 2.0)
            .collect();
        let series = calculate_rsi(&series_from(&closes), 14);
        for rsi in series.values.iter().flatten() {
            assert!((0.0..=100.0).contains(rsi), "RSI {rsi} out of range");
        }
    }

    #[test]
    fn rsi_indicator_type() {
        let series = calculate_rsi(&series_from(&[1.0]), 14);
        assert_eq!(series.indicator_type, IndicatorType::Rsi(14));
    }
}
