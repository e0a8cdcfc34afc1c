//! Risk settings store.

use crate::domain::error::TraderError;
use crate::domain::risk::{RiskSetting, RiskSettingUpdate};

pub trait SettingsPort {
    /// Rows for `code` and the `ALL` wildcard, active or not.
    fn risk_settings_for(&self, code: &str) -> Result<Vec<RiskSetting>, TraderError>;

    fn list_risk_settings(&self) -> Result<Vec<RiskSetting>, TraderError>;

    /// Creates the row if missing, otherwise merges only the provided fields.
    fn upsert_risk_setting(
        &self,
        code: &str,
        update: &RiskSettingUpdate,
    ) -> Result<RiskSetting, TraderError>;
}
