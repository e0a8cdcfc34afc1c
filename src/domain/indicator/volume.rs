//! Volume indicators: volume moving averages, volume ratio and OBV.

use crate::domain::indicator::rolling::rolling_mean;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_volume_sma(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();
    IndicatorSeries {
        indicator_type: IndicatorType::VolumeSma(period),
        values: rolling_mean(&volumes, period),
    }
}

/// volume / SMA(period) of volume; undefined while the average is 0.
pub fn calculate_volume_ratio(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let averages = calculate_volume_sma(bars, period).values;
    let values = bars
        .iter()
        .zip(averages)
        .map(|(bar, avg)| match avg {
            Some(avg) if avg > 0.0 => Some(bar.volume as f64 / avg),
            _ => None,
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::VolumeRatio(period),
        values,
    }
}

/// On-Balance Volume.
///
/// OBV[i] = OBV[i-1] + sign(C[i] - C[i-1]) × V[i], with sign(0) = 0.
/// The first bar has no previous close and contributes 0.
pub fn calculate_obv(bars: &[OhlcvBar]) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());
    let mut obv: f64 = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i > 0 {
            let prev_close = bars[i - 1].close;
            if bar.close > prev_close {
                obv += bar.volume as f64;
            } else if bar.close < prev_close {
                obv -= bar.volume as f64;
            }
        }
        values.push(Some(obv));
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Obv,
        values,
    }
}
