//! Observation windows handed to the policy oracle.
//!
//! An observation is a `window_size × (N_FEATURES + 2)` row-major matrix: the
//! most recent feature vectors, each followed by two broadcast columns holding
//! the current position ratio and the cumulative return.

use crate::domain::error::TraderError;
use crate::domain::indicator::{FeatureVector, N_FEATURES};

/// Width of one observation row.
pub const OBSERVATION_WIDTH: usize = N_FEATURES + 2;

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    window_size: usize,
    data: Vec<f64>,
}

impl Observation {
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn width(&self) -> usize {
        OBSERVATION_WIDTH
    }

    /// `None` when `row` or `col` is outside the window.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.window_size || col >= OBSERVATION_WIDTH {
            return None;
        }
        self.data.get(row * OBSERVATION_WIDTH + col).copied()
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        if row >= self.window_size {
            return None;
        }
        let start = row * OBSERVATION_WIDTH;
        self.data.get(start..start + OBSERVATION_WIDTH)
    }

    /// The most recent row. Observations always hold at least one row.
    pub fn last_row(&self) -> &[f64] {
        &self.data[self.data.len() - OBSERVATION_WIDTH..]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

/// Builds an observation from the last `window_size` feature vectors.
///
/// Fails if fewer than `window_size` vectors are available. Undefined feature
/// values are written as 0.0. The inputs are never modified.
pub fn build_observation(
    features: &[FeatureVector],
    position: f64,
    cum_return: f64,
    window_size: usize,
) -> Result<Observation, TraderError> {
    if window_size == 0 {
        return Err(TraderError::Simulation {
            reason: "window_size must be positive".into(),
        });
    }
    if features.len() < window_size {
        let code = features
            .first()
            .map(|f| f.bar.code.clone())
            .unwrap_or_default();
        return Err(TraderError::InsufficientData {
            code,
            bars: features.len(),
            minimum: window_size,
        });
    }

    let window = &features[features.len() - window_size..];
    let mut data = Vec::with_capacity(window_size * OBSERVATION_WIDTH);
    for fv in window {
        data.extend_from_slice(&fv.values());
        data.push(position);
        data.push(cum_return);
    }

    Ok(Observation { window_size, data })
}

/// Inference-mode observation without live account context: position and
/// cumulative return channels are both 0.
pub fn build_latest_observation(
    features: &[FeatureVector],
    window_size: usize,
) -> Result<Observation, TraderError> {
    build_observation(features, 0.0, 0.0, window_size)
}
