//! Configuration access port trait.

use crate::domain::error::TraderError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Like [`get_string`](Self::get_string) but fails at first use when the
    /// key is absent or blank.
    fn require_string(&self, section: &str, key: &str) -> Result<String, TraderError> {
        match self.get_string(section, key) {
            Some(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(TraderError::ConfigMissing {
                section: section.to_string(),
                key: key.to_string(),
            }),
        }
    }
}
