//! Price change features.
//!
//! Return(n)[i] = C[i] / C[i-n] - 1, undefined for the first n bars or when
//! C[i-n] is not positive. Log return uses ln(C[i] / C[i-1]).

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_return(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let values = (0..bars.len())
        .map(|i| {
            if period == 0 || i < period {
                return None;
            }
            let prev = bars[i - period].close;
            if prev > 0.0 {
                Some(bars[i].close / prev - 1.0)
            } else {
                None
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Return(period),
        values,
    }
}

pub fn calculate_log_return(bars: &[OhlcvBar]) -> IndicatorSeries {
    let values = (0..bars.len())
        .map(|i| {
            if i == 0 {
                return None;
            }
            let prev = bars[i - 1].close;
            let curr = bars[i].close;
            if prev > 0.0 && curr > 0.0 {
                Some((curr / prev).ln())
            } else {
                None
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::LogReturn,
        values,
    }
}

/// (high - low) / close
pub fn calculate_hl_ratio(bars: &[OhlcvBar]) -> IndicatorSeries {
    IndicatorSeries {
        indicator_type: IndicatorType::HighLowRatio,
        values: bars
            .iter()
            .map(|b| (b.close != 0.0).then(|| (b.high - b.low) / b.close))
            .collect(),
    }
}

/// (close - open) / open
pub fn calculate_co_ratio(bars: &[OhlcvBar]) -> IndicatorSeries {
    IndicatorSeries {
        indicator_type: IndicatorType::CloseOpenRatio,
        values: bars
            .iter()
            .map(|b| (b.open != 0.0).then(|| (b.close - b.open) / b.open))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bar(day: u32, open: f64, high: f64, low: f64, close: f64) -> OhlcvBar {
        OhlcvBar {
            code: "TEST".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open,
            high,
            low,
            close,
            volume: 1000,
        }
    }

    fn closes(values: &[f64]) -> Vec<OhlcvBar> {
        values
            .iter()
            .enumerate()
            .map(|(i, &c)| make_bar(i as u32 + 1, c, c, c, c))
            .collect()
    }

    #[test]
    fn one_day_return() {
        let series = calculate_return(&closes(&[100.0, 110.0, 99.0]), 1);
        assert_eq!(series.values[0], None);
        assert!((series.values[1].unwrap() - 0.10).abs() < 1e-12);
        assert!((series.values[2].unwrap() + 0.10).abs() < 1e-12);
    }

    #[test]
    fn multi_day_return_warmup() {
        let series = calculate_return(&closes(&[100.0, 101.0, 102.0, 103.0, 104.0, 120.0]), 5);
        assert!(series.values[4].is_none());
        assert!((series.values[5].unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn return_from_zero_price_is_undefined() {
        let series = calculate_return(&closes(&[0.0, 10.0]), 1);
        assert!(series.values[1].is_none());
    }

    #[test]
    fn log_return_matches_ln() {
        let series = calculate_log_return(&closes(&[100.0, 110.0]));
        assert!((series.values[1].unwrap() - (1.1_f64).ln()).abs() < 1e-12);
    }

    #[test]
    fn hl_and_co_ratios() {
        let bars = vec![make_bar(1, 100.0, 110.0, 90.0, 105.0)];
        let hl = calculate_hl_ratio(&bars);
        let co = calculate_co_ratio(&bars);
        assert!((hl.values[0].unwrap() - 20.0 / 105.0).abs() < 1e-12);
        assert!((co.values[0].unwrap() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn ratios_with_zero_denominator_are_undefined() {
        let bars = vec![make_bar(1, 0.0, 1.0, 0.0, 0.0)];
        assert!(calculate_hl_ratio(&bars).values[0].is_none());
        assert!(calculate_co_ratio(&bars).values[0].is_none());
    }
}
