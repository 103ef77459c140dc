/// models.rs — Shared domain types and the GARCH estimator submodules
///
/// PriceBar     : one daily OHLCV row for a ticker
/// ReturnSeries : ascending (date, % return) pairs fed to the estimator
/// ForecastPoint: one labelled volatility forecast step
/// Ticker       : validated, upper-cased symbol; safe to embed in table
///                 names and artifact file names
pub mod estimator;
pub mod garch;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Longest symbol accepted by [`Ticker::parse`].
pub const MAX_TICKER_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date:   NaiveDate,
    pub open:   f64,
    pub high:   f64,
    pub low:    f64,
    pub close:  f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnPoint {
    pub date: NaiveDate,
    /// 100 · (close_t / close_{t-1} − 1)
    pub pct_return: f64,
}

/// Percentage returns, strictly ascending by date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnSeries {
    points: Vec<ReturnPoint>,
}

impl ReturnSeries {
    /// Callers guarantee ascending, de-duplicated dates (see `returns::build`).
    pub(crate) fn from_sorted(points: Vec<ReturnPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[ReturnPoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.pct_return).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date:       NaiveDate,
    /// √(forecast variance), in percentage-return units
    pub volatility: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid ticker {raw:?}: {reason}")]
pub struct TickerError {
    pub raw:    String,
    pub reason: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Trim, upper-case and validate a symbol.
    ///
    /// Allowed characters: `A-Z 0-9 . -`. Underscores are rejected because
    /// artifact file names use `_` to separate timestamp and ticker.
    pub fn parse(raw: &str) -> Result<Self, TickerError> {
        let symbol = raw.trim().to_ascii_uppercase();
        let fail = |reason| TickerError { raw: raw.to_owned(), reason };

        if symbol.is_empty() {
            return Err(fail("ticker must not be empty"));
        }
        if symbol.len() > MAX_TICKER_LEN {
            return Err(fail("ticker is longer than 16 characters"));
        }
        if !symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return Err(fail("ticker may only contain letters, digits, '.' and '-'"));
        }
        Ok(Self(symbol))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Ticker {
    type Err = TickerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = TickerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(t: Ticker) -> Self {
        t.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_is_normalised() {
        let t = Ticker::parse("  brk.b ").unwrap();
        assert_eq!(t.as_str(), "BRK.B");
    }

    #[test]
    fn ticker_rejects_sql_and_separators() {
        assert!(Ticker::parse("").is_err());
        assert!(Ticker::parse("AAPL\"; DROP TABLE x").is_err());
        assert!(Ticker::parse("ABC_DEF").is_err());
        assert!(Ticker::parse("ABCDEFGHIJKLMNOPQ").is_err());
    }

    #[test]
    fn ticker_deserialises_through_validation() {
        let ok: Ticker = serde_json::from_str("\"msft\"").unwrap();
        assert_eq!(ok.as_str(), "MSFT");
        assert!(serde_json::from_str::<Ticker>("\"a b\"").is_err());
    }
}
