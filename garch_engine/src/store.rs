/// store.rs — Price History Store (SQLite, one table per ticker)
///
/// Table `"prices_<TICKER>"`:
///   date TEXT PRIMARY KEY (YYYY-MM-DD), open, high, low, close, volume REAL
///
/// Table names are built from a validated `Ticker`, so only
/// `[A-Z0-9.-]` ever reaches the SQL text.
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{PriceBar, Ticker};

const TABLE_PREFIX: &str = "prices_";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No price history stored for {0}")]
    NotFound(Ticker),
    #[error("price store error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("price store directory could not be created: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored row has invalid date {0:?}")]
    BadDate(String),
}

/// One open SQLite connection. Acquire per request; dropping it releases
/// the connection.
pub struct PriceStore {
    conn: Connection,
}

impl PriceStore {
    /// Open or create the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    /// Overwrite the ticker's table with `bars` in one transaction.
    /// Rows sharing a date collapse to the last one given.
    pub fn replace(&mut self, ticker: &Ticker, bars: &[PriceBar]) -> Result<usize, StoreError> {
        let table = table_name(ticker);
        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS \"{table}\";
             CREATE TABLE \"{table}\" (
                 date   TEXT PRIMARY KEY,
                 open   REAL NOT NULL,
                 high   REAL NOT NULL,
                 low    REAL NOT NULL,
                 close  REAL NOT NULL,
                 volume REAL NOT NULL
             );"
        ))?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO \"{table}\" (date, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ))?;
            for bar in bars {
                stmt.execute(params![
                    bar.date.format(DATE_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume,
                ])?;
            }
        }
        let stored: i64 = tx.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
            row.get(0)
        })?;
        tx.commit()?;

        info!("Stored {} rows for {}", stored, ticker);
        Ok(stored as usize)
    }

    /// Up to `max_rows` most recent rows (all rows when `None`), ascending
    /// by date.
    pub fn read(&self, ticker: &Ticker, max_rows: Option<usize>) -> Result<Vec<PriceBar>, StoreError> {
        if !self.has_table(ticker)? {
            return Err(StoreError::NotFound(ticker.clone()));
        }
        let table = table_name(ticker);
        // LIMIT -1 is SQLite for "no limit"
        let limit = max_rows.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));

        let mut stmt = self.conn.prepare(&format!(
            "SELECT date, open, high, low, close, volume FROM \"{table}\"
             ORDER BY date DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
            ))
        })?;

        let mut bars = Vec::new();
        for row in rows {
            let (date, open, high, low, close, volume) = row?;
            let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
                .map_err(|_| StoreError::BadDate(date.clone()))?;
            bars.push(PriceBar { date, open, high, low, close, volume });
        }
        bars.reverse();

        debug!("Read {} rows for {} (limit {:?})", bars.len(), ticker, max_rows);
        Ok(bars)
    }

    pub fn has_table(&self, ticker: &Ticker) -> Result<bool, StoreError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table_name(ticker)],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn row_count(&self, ticker: &Ticker) -> Result<usize, StoreError> {
        if !self.has_table(ticker)? {
            return Err(StoreError::NotFound(ticker.clone()));
        }
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM \"{}\"", table_name(ticker)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Tickers that currently have a price table.
    pub fn tickers(&self) -> Result<Vec<Ticker>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(names
            .iter()
            .filter_map(|name| name.strip_prefix(TABLE_PREFIX))
            .filter_map(|symbol| Ticker::parse(symbol).ok())
            .collect())
    }
}

fn table_name(ticker: &Ticker) -> String {
    format!("{TABLE_PREFIX}{ticker}")
}
