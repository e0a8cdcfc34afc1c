//! Bollinger Bands.
//!
//! - Middle: SMA(n) of close
//! - Upper/Lower: Middle ± mult × sample StdDev(n)
//! - Width: (Upper - Lower) / Middle
//! - %B: (Close - Lower) / (Upper - Lower)
//!
//! %B has no meaning when the bands collapse (zero-variance window) and is
//! `None` there; width is `None` when the middle band is 0.

use crate::domain::indicator::rolling::{rolling_mean, rolling_std};
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

#[derive(Debug, Clone)]
pub struct BollingerSeries {
    pub upper: IndicatorSeries,
    pub middle: IndicatorSeries,
    pub lower: IndicatorSeries,
    pub width: IndicatorSeries,
    pub percent_b: IndicatorSeries,
}

pub fn calculate_bollinger(
    bars: &[OhlcvBar],
    period: usize,
    stddev_mult_x100: u32,
) -> BollingerSeries {
    let mult = stddev_mult_x100 as f64 / 100.0;
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let middles = rolling_mean(&closes, period);
    let stddevs = rolling_std(&closes, period);

    let n = bars.len();
    let mut upper = Vec::with_capacity(n);
    let mut middle = Vec::with_capacity(n);
    let mut lower = Vec::with_capacity(n);
    let mut width = Vec::with_capacity(n);
    let mut percent_b = Vec::with_capacity(n);

    for i in 0..n {
        let (Some(mid), Some(sd)) = (middles[i], stddevs[i]) else {
            upper.push(None);
            middle.push(None);
            lower.push(None);
            width.push(None);
            percent_b.push(None);
            continue;
        };

        let up = mid + mult * sd;
        let lo = mid - mult * sd;
        let band = up - lo;

        upper.push(Some(up));
        middle.push(Some(mid));
        lower.push(Some(lo));
        width.push(if mid != 0.0 { Some(band / mid) } else { None });
        percent_b.push(if band > f64::EPSILON * mid.abs().max(1.0) {
            Some((closes[i] - lo) / band)
        } else {
            None
        });
    }

    let indicator_type = IndicatorType::Bollinger {
        period,
        stddev_mult_x100,
    };
    let wrap = |values| IndicatorSeries {
        indicator_type: indicator_type.clone(),
        values,
    };

    BollingerSeries {
        upper: wrap(upper),
        middle: wrap(middle),
        lower: wrap(lower),
        width: wrap(width),
        percent_b: wrap(percent_b),
    }
}
