//! Policy oracle port.

use crate::domain::error::TraderError;
use crate::domain::observation::Observation;

/// Maps an observation window to one continuous action in [-1, 1].
///
/// Implementations are stateless from the caller's point of view; the
/// simulation clips whatever they return to its position limit.
pub trait PolicyPort {
    fn act(&self, observation: &Observation) -> Result<f64, TraderError>;
}

/// Resolves the policy trained for one instrument.
pub trait PolicyStore {
    fn load(&self, code: &str) -> Result<Box<dyn PolicyPort>, TraderError>;
}
