//! Exponential Moving Average.
//!
//! alpha = 2/(span+1), seeded with the first value, then
//! EMA[i] = EMA[i-1] + alpha * (x[i] - EMA[i-1]). No warm-up and no bias
//! correction, so every bar has a value.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn ema_values(values: &[f64], span: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    if span == 0 {
        return out;
    }
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut ema = 0.0;

    for (i, &x) in values.iter().enumerate() {
        ema = if i == 0 { x } else { ema + alpha * (x - ema) };
        out.push(ema);
    }
    out
}

pub fn calculate_ema(bars: &[OhlcvBar], span: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let values = if span == 0 {
        vec![None; bars.len()]
    } else {
        ema_values(&closes, span).into_iter().map(Some).collect()
    };

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(span),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn make_bars(prices: &[f64]) -> Vec<OhlcvBar> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                code: "TEST".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, (i + 1) as u32).unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000,
            })
            .collect()
    }

    #[test]
    fn ema_span_two_known_values() {
        let bars = make_bars(&[100.0, 102.0, 101.0, 105.0]);
        let series = calculate_ema(&bars, 2);

        let expected = [100.0, 101.333_333, 101.111_111, 103.703_704];
        for (point, want) in series.values.iter().zip(expected) {
            assert_relative_eq!(point.unwrap(), want, epsilon = 1e-5);
        }
    }

    #[test]
    fn ema_seed_is_first_close() {
        let bars = make_bars(&[42.0, 50.0]);
        let series = calculate_ema(&bars, 12);
        assert_eq!(series.values[0], Some(42.0));
    }

    #[test]
    fn ema_equal_prices() {
        let bars = make_bars(&[100.0; 5]);
        let series = calculate_ema(&bars, 3);
        for point in &series.values {
            assert_relative_eq!(point.unwrap(), 100.0);
        }
    }

    #[test]
    fn ema_indicator_type() {
        let bars = make_bars(&[10.0, 20.0, 30.0]);
        let series = calculate_ema(&bars, 26);
        assert_eq!(series.indicator_type, IndicatorType::Ema(26));
    }

    #[test]
    fn ema_empty_bars() {
        let series = calculate_ema(&[], 3);
        assert!(series.values.is_empty());
    }

    #[test]
    fn ema_span_zero_is_undefined() {
        let bars = make_bars(&[10.0, 20.0]);
        let series = calculate_ema(&bars, 0);
        assert_eq!(series.values, vec![None, None]);
    }
}
