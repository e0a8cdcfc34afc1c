//! Price-history port trait.

use crate::domain::error::TraderError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

/// Daily bars per instrument, always returned ascending by date.
pub trait DataPort {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, TraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, TraderError>;

    /// First date, last date and bar count, or `None` when no bars exist.
    fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TraderError>;

    /// Every stored bar for `code`.
    fn fetch_all(&self, code: &str) -> Result<Vec<OhlcvBar>, TraderError> {
        match self.get_data_range(code)? {
            Some((first, last, _)) => self.fetch_ohlcv(code, first, last),
            None => Err(TraderError::NoData {
                code: code.to_string(),
            }),
        }
    }

    /// Close of the most recent stored bar.
    fn latest_close(&self, code: &str) -> Result<Option<f64>, TraderError> {
        let Some((_, last, _)) = self.get_data_range(code)? else {
            return Ok(None);
        };
        let bars = self.fetch_ohlcv(code, last, last)?;
        Ok(bars.last().map(|b| b.close))
    }
}
