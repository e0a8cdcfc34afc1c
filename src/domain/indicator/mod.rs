//! Technical indicator engine.
//!
//! This module provides:
//! - `IndicatorType`: indicator identity + parameters
//! - `IndicatorSeries`: one optional value per input bar
//! - `FeatureVector`: a bar enriched with every derived feature
//! - `compute_indicators`: bars → feature vectors, warm-up rows dropped
//!
//! Every indicator is causal: the value at bar `i` reads only bars `0..=i`.
//! `None` marks a value that is not defined, either because the lookback is
//! not yet filled or because the formula degenerates (zero denominator).

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod returns;
pub mod rolling;
pub mod rsi;
pub mod stochastic;
pub mod volume;

use crate::domain::error::TraderError;
use crate::domain::ohlcv::{OhlcvBar, validate_bars};
use chrono::NaiveDate;
use std::fmt;

pub const MA_PERIODS: [usize; 4] = [5, 10, 20, 60];
pub const EMA_SPANS: [usize; 2] = [12, 26];
pub const RSI_PERIOD: usize = 14;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_MULT_X100: u32 = 200;
pub const STOCH_PERIOD: usize = 14;
pub const STOCH_SMOOTH_K: usize = 3;
pub const STOCH_SMOOTH_D: usize = 3;
pub const ATR_PERIOD: usize = 14;
pub const VOLUME_MA_PERIODS: [usize; 2] = [5, 20];
pub const RETURN_HORIZONS: [usize; 3] = [5, 10, 20];

/// Bars before the longest lookback (MA60) is filled. These rows are dropped.
pub const WARMUP_BARS: usize = 59;

/// Minimum number of bars that yields at least one feature vector.
pub const MIN_BARS: usize = WARMUP_BARS + 1;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Obv,
    VolumeSma(usize),
    VolumeRatio(usize),
    Return(usize),
    LogReturn,
    HighLowRatio,
    CloseOpenRatio,
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Stochastic {
        period: usize,
        smooth_k: usize,
        smooth_d: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<Option<f64>>,
}

impl IndicatorSeries {
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Obv => write!(f, "OBV"),
            IndicatorType::VolumeSma(period) => write!(f, "VOLUME_SMA({})", period),
            IndicatorType::VolumeRatio(period) => write!(f, "VOLUME_RATIO({})", period),
            IndicatorType::Return(period) => write!(f, "RETURN({})", period),
            IndicatorType::LogReturn => write!(f, "LOG_RETURN"),
            IndicatorType::HighLowRatio => write!(f, "HL_RATIO"),
            IndicatorType::CloseOpenRatio => write!(f, "CO_RATIO"),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Stochastic {
                period,
                smooth_k,
                smooth_d,
            } => write!(f, "STOCHASTIC({},{},{})", period, smooth_k, smooth_d),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}

pub fn calculate_sma(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values: rolling::rolling_mean(&closes, period),
    }
}

/// Column names of [`FeatureVector::values`], in order.
pub const FEATURE_NAMES: [&str; 34] = [
    "open",
    "high",
    "low",
    "close",
    "volume",
    "ma_5",
    "ma_10",
    "ma_20",
    "ma_60",
    "ema_12",
    "ema_26",
    "rsi",
    "macd",
    "macd_signal",
    "macd_hist",
    "stoch_k",
    "stoch_d",
    "bb_middle",
    "bb_upper",
    "bb_lower",
    "bb_width",
    "bb_pctb",
    "atr",
    "volume_ma_5",
    "volume_ma_20",
    "volume_ratio",
    "obv",
    "return_1d",
    "log_return",
    "return_5d",
    "return_10d",
    "return_20d",
    "hl_ratio",
    "co_ratio",
];

pub const N_FEATURES: usize = FEATURE_NAMES.len();

/// One bar plus its derived features. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub bar: OhlcvBar,
    pub ma_5: Option<f64>,
    pub ma_10: Option<f64>,
    pub ma_20: Option<f64>,
    pub ma_60: Option<f64>,
    pub ema_12: Option<f64>,
    pub ema_26: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
    pub stoch_k: Option<f64>,
    pub stoch_d: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_width: Option<f64>,
    pub bb_pctb: Option<f64>,
    pub atr: Option<f64>,
    pub volume_ma_5: Option<f64>,
    pub volume_ma_20: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub obv: Option<f64>,
    pub return_1d: Option<f64>,
    pub log_return: Option<f64>,
    pub return_5d: Option<f64>,
    pub return_10d: Option<f64>,
    pub return_20d: Option<f64>,
    pub hl_ratio: Option<f64>,
    pub co_ratio: Option<f64>,
}

impl FeatureVector {
    pub fn date(&self) -> NaiveDate {
        self.bar.date
    }

    pub fn close(&self) -> f64 {
        self.bar.close
    }

    /// All features in [`FEATURE_NAMES`] order, undefined values left as `None`.
    pub fn raw_values(&self) -> [Option<f64>; N_FEATURES] {
        let b = &self.bar;
        [
            Some(b.open),
            Some(b.high),
            Some(b.low),
            Some(b.close),
            Some(b.volume as f64),
            self.ma_5,
            self.ma_10,
            self.ma_20,
            self.ma_60,
            self.ema_12,
            self.ema_26,
            self.rsi,
            self.macd,
            self.macd_signal,
            self.macd_hist,
            self.stoch_k,
            self.stoch_d,
            self.bb_middle,
            self.bb_upper,
            self.bb_lower,
            self.bb_width,
            self.bb_pctb,
            self.atr,
            self.volume_ma_5,
            self.volume_ma_20,
            self.volume_ratio,
            self.obv,
            self.return_1d,
            self.log_return,
            self.return_5d,
            self.return_10d,
            self.return_20d,
            self.hl_ratio,
            self.co_ratio,
        ]
    }

    /// All features as numbers; undefined values become the 0.0 sentinel.
    pub fn values(&self) -> [f64; N_FEATURES] {
        self.raw_values().map(|v| v.unwrap_or(0.0))
    }
}

/// Computes every indicator over a validated bar series and returns one
/// feature vector per bar after the warm-up region.
///
/// Fails fast on an invalid series or when fewer than [`MIN_BARS`] bars are
/// available; never returns partial output.
pub fn compute_indicators(code: &str, bars: &[OhlcvBar]) -> Result<Vec<FeatureVector>, TraderError> {
    validate_bars(code, bars)?;
    if bars.len() < MIN_BARS {
        return Err(TraderError::InsufficientData {
            code: code.into(),
            bars: bars.len(),
            minimum: MIN_BARS,
        });
    }

    let [ma5, ma10, ma20, ma60] = MA_PERIODS.map(|p| calculate_sma(bars, p));
    let [ema12, ema26] = EMA_SPANS.map(|s| ema::calculate_ema(bars, s));
    let rsi = rsi::calculate_rsi(bars, RSI_PERIOD);
    let macd = macd::calculate_macd_default(bars);
    let stoch = stochastic::calculate_stochastic(bars, STOCH_PERIOD, STOCH_SMOOTH_K, STOCH_SMOOTH_D);
    let bb = bollinger::calculate_bollinger(bars, BOLLINGER_PERIOD, BOLLINGER_MULT_X100);
    let atr = atr::calculate_atr(bars, ATR_PERIOD);
    let [vol5, vol20] = VOLUME_MA_PERIODS.map(|p| volume::calculate_volume_sma(bars, p));
    let vol_ratio = volume::calculate_volume_ratio(bars, VOLUME_MA_PERIODS[1]);
    let obv = volume::calculate_obv(bars);
    let ret1 = returns::calculate_return(bars, 1);
    let log_ret = returns::calculate_log_return(bars);
    let [ret5, ret10, ret20] = RETURN_HORIZONS.map(|h| returns::calculate_return(bars, h));
    let hl = returns::calculate_hl_ratio(bars);
    let co = returns::calculate_co_ratio(bars);

    let features = (WARMUP_BARS..bars.len())
        .map(|i| FeatureVector {
            bar: bars[i].clone(),
            ma_5: ma5.get(i),
            ma_10: ma10.get(i),
            ma_20: ma20.get(i),
            ma_60: ma60.get(i),
            ema_12: ema12.get(i),
            ema_26: ema26.get(i),
            rsi: rsi.get(i),
            macd: macd.line.get(i),
            macd_signal: macd.signal.get(i),
            macd_hist: macd.histogram.get(i),
            stoch_k: stoch.k.get(i),
            stoch_d: stoch.d.get(i),
            bb_middle: bb.middle.get(i),
            bb_upper: bb.upper.get(i),
            bb_lower: bb.lower.get(i),
            bb_width: bb.width.get(i),
            bb_pctb: bb.percent_b.get(i),
            atr: atr.get(i),
            volume_ma_5: vol5.get(i),
            volume_ma_20: vol20.get(i),
            volume_ratio: vol_ratio.get(i),
            obv: obv.get(i),
            return_1d: ret1.get(i),
            log_return: log_ret.get(i),
            return_5d: ret5.get(i),
            return_10d: ret10.get(i),
            return_20d: ret20.get(i),
            hl_ratio: hl.get(i),
            co_ratio: co.get(i),
        })
        .collect();

    Ok(features)
}
