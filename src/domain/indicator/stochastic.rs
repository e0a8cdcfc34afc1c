//! Stochastic oscillator (slow form).
//!
//! %K_raw = 100 × (C - LL(n)) / (HH(n) - LL(n))
//! %K = SMA(smooth_k) of %K_raw, %D = SMA(smooth_d) of %K.
//! A flat high/low range leaves %K_raw undefined, which carries into any
//! smoothing window that contains it.

use crate::domain::indicator::rolling::{rolling_max, rolling_mean_opt, rolling_min};
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

#[derive(Debug, Clone)]
pub struct StochasticSeries {
    pub k: IndicatorSeries,
    pub d: IndicatorSeries,
}

pub fn calculate_stochastic(
    bars: &[OhlcvBar],
    period: usize,
    smooth_k: usize,
    smooth_d: usize,
) -> StochasticSeries {
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let highest = rolling_max(&highs, period);
    let lowest = rolling_min(&lows, period);

    let raw_k: Vec<Option<f64>> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let (hh, ll) = (highest[i]?, lowest[i]?);
            let range = hh - ll;
            if range > 0.0 {
                Some(100.0 * (bar.close - ll) / range)
            } else {
                None
            }
        })
        .collect();

    let k = rolling_mean_opt(&raw_k, smooth_k);
    let d = rolling_mean_opt(&k, smooth_d);

    let indicator_type = IndicatorType::Stochastic {
        period,
        smooth_k,
        smooth_d,
    };

    StochasticSeries {
        k: IndicatorSeries {
            indicator_type: indicator_type.clone(),
            values: k,
        },
        d: IndicatorSeries {
            indicator_type,
            values: d,
        },
    }
}
