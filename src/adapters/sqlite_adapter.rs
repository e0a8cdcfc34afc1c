//! SQLite storage adapter: price history, order audit, account snapshots and
//! risk settings.

use crate::domain::account::AccountSnapshot;
use crate::domain::error::TraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::order::{OrderRecord, OrderStatus};
use crate::domain::risk::{ALL_CODES, RiskSetting, RiskSettingUpdate, Side};
use crate::ports::audit_port::AuditPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::settings_port::SettingsPort;
use chrono::{NaiveDate, NaiveDateTime};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};

const DATE_FMT: &str = "%Y-%m-%d";
const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

fn query_err(e: rusqlite::Error) -> TraderError {
    TraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, TraderError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FMT).map_err(|e: chrono::ParseError| {
        TraderError::Database {
            reason: format!("bad timestamp '{s}': {e}"),
        }
    })
}

fn parse_date(s: &str) -> Result<NaiveDate, TraderError> {
    NaiveDate::parse_from_str(s, DATE_FMT).map_err(|e: chrono::ParseError| TraderError::Database {
        reason: format!("bad date '{s}': {e}"),
    })
}

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TraderError> {
        let db_path = config.require_string("sqlite", "path")?;
        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| TraderError::Database {
                reason: e.to_string(),
            })?;

        tracing::debug!(path = %db_path, pool_size, "opened sqlite pool");
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, TraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| TraderError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TraderError> {
        self.pool.get().map_err(|e: r2d2::Error| TraderError::Database {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), TraderError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS ohlcv (
                code TEXT NOT NULL,
                date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume INTEGER NOT NULL,
                PRIMARY KEY (code, date)
            );
            CREATE TABLE IF NOT EXISTS trade_orders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                code TEXT NOT NULL,
                side TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                price REAL,
                amount REAL,
                status TEXT NOT NULL,
                raw_response TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trade_orders_code_time ON trade_orders(code, created_at);
            CREATE TABLE IF NOT EXISTS account_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                total_value REAL NOT NULL,
                cash REAL NOT NULL,
                total_buy_amount REAL NOT NULL,
                total_eval_amount REAL NOT NULL,
                total_pnl REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_account_snapshots_time ON account_snapshots(created_at);
            CREATE TABLE IF NOT EXISTS risk_settings (
                code TEXT PRIMARY KEY,
                max_position_shares INTEGER,
                max_weight_pct REAL,
                max_daily_buy_amount REAL,
                active INTEGER NOT NULL DEFAULT 1
            );",
        )
        .map_err(query_err)?;

        Ok(())
    }

    pub fn insert_bars(&self, bars: &[OhlcvBar]) -> Result<(), TraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO ohlcv (code, date, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    bar.code,
                    bar.date.format(DATE_FMT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(())
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, TraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT date, open, high, low, close, volume
                 FROM ohlcv
                 WHERE code = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(
                params![
                    code,
                    start_date.format(DATE_FMT).to_string(),
                    end_date.format(DATE_FMT).to_string()
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                },
            )
            .map_err(query_err)?;

        let mut bars = Vec::new();
        for row in rows {
            let (date, open, high, low, close, volume) = row.map_err(query_err)?;
            bars.push(OhlcvBar {
                code: code.to_string(),
                date: parse_date(&date)?,
                open,
                high,
                low,
                close,
                volume,
            });
        }
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, TraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT code FROM ohlcv ORDER BY code")
            .map_err(query_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(query_err)
    }

    fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TraderError> {
        let conn = self.conn()?;
        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM ohlcv WHERE code = ?1",
                params![code],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_err)?;

        match result {
            (Some(min), Some(max), count) if count > 0 => {
                Ok(Some((parse_date(&min)?, parse_date(&max)?, count as usize)))
            }
            _ => Ok(None),
        }
    }
}

impl AuditPort for SqliteAdapter {
    fn append_order(&self, record: &OrderRecord) -> Result<(), TraderError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO trade_orders
                (created_at, code, side, quantity, price, amount, status, raw_response)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.timestamp.format(TIMESTAMP_FMT).to_string(),
                record.code,
                record.side.as_str(),
                record.quantity,
                record.price,
                record.amount,
                record.status.as_str(),
                record.raw_response
            ],
        )
        .map_err(query_err)?;
        Ok(())
    }

    fn append_snapshot(&self, snapshot: &AccountSnapshot) -> Result<(), TraderError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO account_snapshots
                (created_at, total_value, cash, total_buy_amount, total_eval_amount, total_pnl)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                snapshot.timestamp.format(TIMESTAMP_FMT).to_string(),
                snapshot.total_value,
                snapshot.cash,
                snapshot.total_buy_amount,
                snapshot.total_eval_amount,
                snapshot.total_pnl
            ],
        )
        .map_err(query_err)?;
        Ok(())
    }

    // `created_at` holds the executor's local wall-clock time, so "today" is
    // the local calendar day of that clock.
    fn buy_amount_on(&self, code: &str, day: NaiveDate) -> Result<f64, TraderError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT COALESCE(SUM(amount), 0.0) FROM trade_orders
             WHERE code = ?1 AND side = 'BUY' AND status = 'OK'
               AND substr(created_at, 1, 10) = ?2",
            params![code, day.format(DATE_FMT).to_string()],
            |row| row.get(0),
        )
        .map_err(query_err)
    }

    fn order_history(
        &self,
        code: Option<&str>,
        limit: usize,
    ) -> Result<Vec<OrderRecord>, TraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT created_at, code, side, quantity, price, amount, status, raw_response
                 FROM trade_orders
                 WHERE ?1 IS NULL OR code = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![code, limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                    row.get::<_, Option<f64>>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })
            .map_err(query_err)?;

        let mut records = Vec::new();
        for row in rows {
            let (created_at, code, side, quantity, price, amount, status, raw) =
                row.map_err(query_err)?;
            records.push(OrderRecord {
                timestamp: parse_timestamp(&created_at)?,
                code,
                side: side.parse::<Side>()?,
                quantity,
                price,
                amount,
                status: status.parse::<OrderStatus>()?,
                raw_response: raw,
            });
        }
        Ok(records)
    }

    fn snapshots_since(&self, cutoff: NaiveDateTime) -> Result<Vec<AccountSnapshot>, TraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT created_at, total_value, cash, total_buy_amount, total_eval_amount, total_pnl
                 FROM account_snapshots
                 WHERE created_at >= ?1
                 ORDER BY created_at ASC, id ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![cutoff.format(TIMESTAMP_FMT).to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, f64>(5)?,
                ))
            })
            .map_err(query_err)?;

        let mut snapshots = Vec::new();
        for row in rows {
            let (created_at, total_value, cash, total_buy_amount, total_eval_amount, total_pnl) =
                row.map_err(query_err)?;
            snapshots.push(AccountSnapshot {
                timestamp: parse_timestamp(&created_at)?,
                total_value,
                cash,
                total_buy_amount,
                total_eval_amount,
                total_pnl,
            });
        }
        Ok(snapshots)
    }
}

fn read_setting(row: &rusqlite::Row<'_>) -> rusqlite::Result<RiskSetting> {
    Ok(RiskSetting {
        code: row.get(0)?,
        max_position_shares: row.get(1)?,
        max_weight_pct: row.get(2)?,
        max_daily_buy_amount: row.get(3)?,
        active: row.get::<_, i64>(4)? != 0,
    })
}

impl SettingsPort for SqliteAdapter {
    fn risk_settings_for(&self, code: &str) -> Result<Vec<RiskSetting>, TraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT code, max_position_shares, max_weight_pct, max_daily_buy_amount, active
                 FROM risk_settings WHERE code IN (?1, ?2)",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![code, ALL_CODES], read_setting)
            .map_err(query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn list_risk_settings(&self) -> Result<Vec<RiskSetting>, TraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT code, max_position_shares, max_weight_pct, max_daily_buy_amount, active
                 FROM risk_settings ORDER BY code",
            )
            .map_err(query_err)?;
        let rows = stmt.query_map([], read_setting).map_err(query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn upsert_risk_setting(
        &self,
        code: &str,
        update: &RiskSettingUpdate,
    ) -> Result<RiskSetting, TraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let existing = tx
            .query_row(
                "SELECT code, max_position_shares, max_weight_pct, max_daily_buy_amount, active
                 FROM risk_settings WHERE code = ?1",
                params![code],
                read_setting,
            )
            .optional()
            .map_err(query_err)?;

        let mut setting = existing.unwrap_or_else(|| RiskSetting::new(code));
        setting.merge(update);

        tx.execute(
            "INSERT OR REPLACE INTO risk_settings
                (code, max_position_shares, max_weight_pct, max_daily_buy_amount, active)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                setting.code,
                setting.max_position_shares,
                setting.max_weight_pct,
                setting.max_daily_buy_amount,
                setting.active as i64
            ],
        )
        .map_err(query_err)?;
        tx.commit().map_err(query_err)?;

        tracing::info!(code, "risk setting saved");
        Ok(setting)
    }
}
