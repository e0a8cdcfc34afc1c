//! Fixed-window helpers shared by the indicator implementations.
//!
//! Every helper returns one entry per input value. Entry `i` depends only on
//! inputs `0..=i`, and is `None` until a full window is available.

/// Simple mean over the trailing `period` values.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |window| {
        Some(window.iter().sum::<f64>() / window.len() as f64)
    })
}

/// Mean over the trailing `period` entries; `None` if any entry in the window
/// is undefined.
pub fn rolling_mean_opt(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window = &values[i + 1 - period..=i];
            let mut sum = 0.0;
            for v in window {
                sum += (*v)?;
            }
            Some(sum / period as f64)
        })
        .collect()
}

/// Sample standard deviation (divides by N-1) over the trailing window.
pub fn rolling_std(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |window| {
        if window.len() < 2 {
            return None;
        }
        let n = window.len() as f64;
        let mean = window.iter().sum::<f64>() / n;
        let variance = window
            .iter()
            .map(|v| {
                let diff = v - mean;
                diff * diff
            })
            .sum::<f64>()
            / (n - 1.0);
        Some(variance.sqrt())
    })
}

pub fn rolling_min(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |window| {
        window.iter().copied().reduce(f64::min)
    })
}

pub fn rolling_max(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |window| {
        window.iter().copied().reduce(f64::max)
    })
}

fn rolling<F>(values: &[f64], period: usize, f: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    if period == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                None
            } else {
                f(&values[i + 1 - period..=i])
            }
        })
        .collect()
}
