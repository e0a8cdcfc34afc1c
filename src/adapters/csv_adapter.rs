//! CSV file data adapter.
//!
//! One file per instrument, `{code}.csv`, with header
//! `date,open,high,low,close,volume`. Rows are returned in file order; the
//! indicator engine rejects files that are not ascending.

use crate::domain::error::TraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{code}.csv"))
    }

    fn read_all(&self, code: &str) -> Result<Vec<OhlcvBar>, TraderError> {
        let path = self.csv_path(code);
        if !path.exists() {
            return Err(TraderError::NoData {
                code: code.to_string(),
            });
        }
        let content = fs::read_to_string(&path)?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (index, result) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = result.map_err(|e| TraderError::InvalidBar {
                code: code.to_string(),
                index,
                reason: e.to_string(),
            })?;
            let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|e| {
                TraderError::InvalidBar {
                    code: code.to_string(),
                    index,
                    reason: format!("invalid date '{}': {e}", row.date),
                }
            })?;
            if row.volume.fract() != 0.0 || !row.volume.is_finite() {
                return Err(TraderError::InvalidBar {
                    code: code.to_string(),
                    index,
                    reason: format!("volume {} is not a whole number", row.volume),
                });
            }

            bars.push(OhlcvBar {
                code: code.to_string(),
                date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume as i64,
            });
        }

        Ok(bars)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, TraderError> {
        Ok(self
            .read_all(code)?
            .into_iter()
            .filter(|b| b.date >= start_date && b.date <= end_date)
            .collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, TraderError> {
        let mut symbols: Vec<String> = fs::read_dir(&self.base_path)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                name.strip_suffix(".csv").map(str::to_string)
            })
            .collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TraderError> {
        let bars = match self.read_all(code) {
            Ok(bars) => bars,
            Err(TraderError::NoData { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let first = bars.iter().map(|b| b.date).min();
        let last = bars.iter().map(|b| b.date).max();
        Ok(first.zip(last).map(|(f, l)| (f, l, bars.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, body: &str) {
        let mut f = fs::File::create(dir.path().join(name)).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    const SAMSUNG: &str = "date,open,high,low,close,volume\n\
        2024-01-02,78200,79800,78200,79600,17142847\n\
        2024-01-03,78500,78800,77000,77000,21753644\n\
        2024-01-04,76100,77300,76100,76600,15324439\n";

    #[test]
    fn fetch_filters_by_date_range() {
        let dir = TempDir::new().unwrap();
        write_csv(&dir, "005930.csv", SAMSUNG);
        let adapter = CsvAdapter::new(dir.path().to_path_buf());

        let bars = adapter
            .fetch_ohlcv(
                "005930",
                NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
            )
            .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 77000.0);
        assert_eq!(bars[1].volume, 15324439);
        assert_eq!(bars[0].code, "005930");
    }

    #[test]
    fn data_range_and_latest_close() {
        let dir = TempDir::new().unwrap();
        write_csv(&dir, "005930.csv", SAMSUNG);
        let adapter = CsvAdapter::new(dir.path().to_path_buf());

        let (first, last, n) = adapter.get_data_range("005930").unwrap().unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
        assert_eq!(n, 3);
        assert_eq!(adapter.latest_close("005930").unwrap(), Some(76600.0));
    }

    #[test]
    fn missing_file_has_no_range() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        assert_eq!(adapter.get_data_range("000660").unwrap(), None);
        assert!(matches!(
            adapter.fetch_all("000660"),
            Err(TraderError::NoData { .. })
        ));
    }

    #[test]
    fn non_numeric_field_is_invalid_bar() {
        let dir = TempDir::new().unwrap();
        write_csv(
            &dir,
            "005930.csv",
            "date,open,high,low,close,volume\n2024-01-02,abc,1,1,1,10\n",
        );
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        assert!(matches!(
            adapter.fetch_all("005930"),
            Err(TraderError::InvalidBar { index: 0, .. })
        ));
    }

    #[test]
    fn lists_codes_from_file_names() {
        let dir = TempDir::new().unwrap();
        write_csv(&dir, "035420.csv", SAMSUNG);
        write_csv(&dir, "005930.csv", SAMSUNG);
        write_csv(&dir, "notes.txt", "");
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        assert_eq!(adapter.list_symbols().unwrap(), vec!["005930", "035420"]);
    }
}
