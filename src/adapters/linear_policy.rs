//! Exported linear policy: `tanh(w · last_row + b)`.
//!
//! Files are JSON `{ "weights": [...], "bias": 0.0 }` with one weight per
//! observation column, stored as `{policy_dir}/{code}.json`.

use crate::domain::error::TraderError;
use crate::domain::observation::{OBSERVATION_WIDTH, Observation};
use crate::ports::policy_port::{PolicyPort, PolicyStore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPolicy {
    pub weights: Vec<f64>,
    #[serde(default)]
    pub bias: f64,
}

impl LinearPolicy {
    pub fn new(weights: Vec<f64>, bias: f64) -> Result<Self, TraderError> {
        let policy = Self { weights, bias };
        policy.validate()?;
        Ok(policy)
    }

    pub fn from_file(path: &Path) -> Result<Self, TraderError> {
        let content = fs::read_to_string(path).map_err(|e| TraderError::Policy {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        let policy: LinearPolicy =
            serde_json::from_str(&content).map_err(|e| TraderError::Policy {
                reason: format!("cannot parse {}: {e}", path.display()),
            })?;
        policy.validate()?;
        Ok(policy)
    }

    fn validate(&self) -> Result<(), TraderError> {
        if self.weights.len() != OBSERVATION_WIDTH {
            return Err(TraderError::Policy {
                reason: format!(
                    "expected {OBSERVATION_WIDTH} weights, found {}",
                    self.weights.len()
                ),
            });
        }
        if !self.bias.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err(TraderError::Policy {
                reason: "weights must be finite".into(),
            });
        }
        Ok(())
    }
}

impl PolicyPort for LinearPolicy {
    fn act(&self, observation: &Observation) -> Result<f64, TraderError> {
        let row = observation.last_row();
        let z: f64 = self
            .weights
            .iter()
            .zip(row)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;
        if z.is_nan() {
            return Err(TraderError::Policy {
                reason: "policy output is NaN".into(),
            });
        }
        Ok(z.tanh())
    }
}

pub struct LinearPolicyStore {
    dir: PathBuf,
}

impl LinearPolicyStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl PolicyStore for LinearPolicyStore {
    fn load(&self, code: &str) -> Result<Box<dyn PolicyPort>, TraderError> {
        let path = self.dir.join(format!("{code}.json"));
        Ok(Box::new(LinearPolicy::from_file(&path)?))
    }
}
