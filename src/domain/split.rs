//! Chronological train/validation/test split.

use super::error::TraderError;

pub const DEFAULT_TRAIN_RATIO: f64 = 0.70;
pub const DEFAULT_VAL_RATIO: f64 = 0.15;

#[derive(Debug, PartialEq)]
pub struct Split<'a, T> {
    pub train: &'a [T],
    pub validation: &'a [T],
    pub test: &'a [T],
}

/// Splits by position in time order; the input is never shuffled. The test
/// slice takes whatever remains after the train and validation shares.
pub fn split_chronological<T>(
    rows: &[T],
    train_ratio: f64,
    val_ratio: f64,
) -> Result<Split<'_, T>, TraderError> {
    let valid = |r: f64| r.is_finite() && (0.0..=1.0).contains(&r);
    if !valid(train_ratio) || !valid(val_ratio) || train_ratio + val_ratio > 1.0 {
        return Err(TraderError::Simulation {
            reason: format!("invalid split ratios train={train_ratio} val={val_ratio}"),
        });
    }

    let n = rows.len();
    let train_end = (n as f64 * train_ratio) as usize;
    let val_end = (n as f64 * (train_ratio + val_ratio)) as usize;
    let val_end = val_end.clamp(train_end, n);

    Ok(Split {
        train: &rows[..train_end],
        validation: &rows[train_end..val_end],
        test: &rows[val_end..],
    })
}
