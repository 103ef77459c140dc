/// fetcher.rs — Market data source (AlphaVantage TIME_SERIES_DAILY)
///
/// RESPONSE SHAPE:
///   {
///     "Meta Data": { ... },
///     "Time Series (Daily)": {
///       "2024-03-08": { "1. open": "..", "2. high": "..", "3. low": "..",
///                       "4. close": "..", "5. volume": ".." },
///       ...
///     }
///   }
///
/// A body without "Time Series (Daily)" is AlphaVantage's way of saying
/// the call failed; it carries one of "Error Message", "Note" or
/// "Information" instead. Rows come back most-recent-first.
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::models::{PriceBar, Ticker};

const SERIES_KEY: &str = "Time Series (Daily)";
const UPSTREAM_MESSAGE_KEYS: [&str; 3] = ["Error Message", "Note", "Information"];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid API call. Please check that symbol {ticker} is correct.{}", upstream_suffix(.upstream))]
    UnknownSymbol { ticker: Ticker, upstream: Option<String> },
    #[error("market data request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("market data request returned HTTP {0}")]
    Status(StatusCode),
    #[error("malformed market data for {ticker}: {reason}")]
    Malformed { ticker: Ticker, reason: String },
}

fn upstream_suffix(upstream: &Option<String>) -> String {
    match upstream {
        Some(text) => format!(" ({text})"),
        None => String::new(),
    }
}

#[async_trait]
pub trait MarketDataFetcher: Send + Sync {
    /// Full daily OHLCV history for `ticker`, in whatever order the source
    /// returns it.
    async fn get_daily(&self, ticker: &Ticker) -> Result<Vec<PriceBar>, FetchError>;
}

// ── AlphaVantage client ───────────────────────────────────────────────────

pub struct AlphaVantageClient {
    client:   Client,
    api_key:  String,
    base_url: String,
}

impl AlphaVantageClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key:  api_key.to_owned(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self, FetchError> {
        Self::new(&cfg.alpha_api_key, &cfg.alpha_base_url, cfg.http_timeout())
    }

    fn daily_url(&self, ticker: &Ticker) -> String {
        format!(
            "{}/query?function=TIME_SERIES_DAILY&symbol={}&outputsize=full&datatype=json&apikey={}",
            self.base_url, ticker, self.api_key
        )
    }
}

#[async_trait]
impl MarketDataFetcher for AlphaVantageClient {
    async fn get_daily(&self, ticker: &Ticker) -> Result<Vec<PriceBar>, FetchError> {
        info!("Fetching daily history for {}", ticker);

        let resp = self.client.get(self.daily_url(ticker)).send().await?;
        let status = resp.status();
        if status != StatusCode::OK {
            warn!("AlphaVantage HTTP {} for {}", status, ticker);
            return Err(FetchError::Status(status));
        }
        let body: Value = resp.json().await?;

        let bars = parse_daily_payload(ticker, &body)?;
        info!("Fetched {} daily bars for {}", bars.len(), ticker);
        Ok(bars)
    }
}

/// Decode a TIME_SERIES_DAILY body into bars (unsorted).
pub fn parse_daily_payload(ticker: &Ticker, body: &Value) -> Result<Vec<PriceBar>, FetchError> {
    let Some(series) = body.get(SERIES_KEY).and_then(Value::as_object) else {
        let upstream = UPSTREAM_MESSAGE_KEYS
            .iter()
            .find_map(|key| body.get(*key).and_then(Value::as_str))
            .map(str::to_owned);
        return Err(FetchError::UnknownSymbol { ticker: ticker.clone(), upstream });
    };

    let malformed = |reason: String| FetchError::Malformed { ticker: ticker.clone(), reason };

    series
        .iter()
        .map(|(date, fields)| {
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|e| malformed(format!("date {date:?}: {e}")))?;
            let field = |key: &str| -> Result<f64, FetchError> {
                let raw = fields
                    .get(key)
                    .ok_or_else(|| malformed(format!("{date}: missing {key:?}")))?;
                let parsed = match raw {
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    Value::Number(n) => n.as_f64(),
                    _ => None,
                };
                parsed.ok_or_else(|| malformed(format!("{date}: {key:?} is not a number")))
            };
            Ok(PriceBar {
                date,
                open:   field("1. open")?,
                high:   field("2. high")?,
                low:    field("3. low")?,
                close:  field("4. close")?,
                volume: field("5. volume")?,
            })
        })
        .collect()
}

// ── Fixed in-memory source ────────────────────────────────────────────────

/// Serves canned bars. Used by tests and for running the pipeline offline.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    bars: HashMap<Ticker, Vec<PriceBar>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(mut self, ticker: Ticker, bars: Vec<PriceBar>) -> Self {
        self.bars.insert(ticker, bars);
        self
    }
}

#[async_trait]
impl MarketDataFetcher for StaticFetcher {
    async fn get_daily(&self, ticker: &Ticker) -> Result<Vec<PriceBar>, FetchError> {
        self.bars
            .get(ticker)
            .cloned()
            .ok_or_else(|| FetchError::UnknownSymbol { ticker: ticker.clone(), upstream: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ibm() -> Ticker {
        Ticker::parse("IBM").unwrap()
    }

    #[test]
    fn parses_daily_series() {
        let body = json!({
            "Meta Data": { "2. Symbol": "IBM" },
            "Time Series (Daily)": {
                "2024-03-08": { "1. open": "195.0900", "2. high": "197.7700",
                                "3. low": "194.3800", "4. close": "195.9500",
                                "5. volume": "3819456" },
                "2024-03-07": { "1. open": "197.0000", "2. high": "198.8000",
                                "3. low": "195.7700", "4. close": "196.5400",
                                "5. volume": "4115233" }
            }
        });
        let mut bars = parse_daily_payload(&ibm(), &body).unwrap();
        bars.sort_by_key(|b| b.date);

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
        assert_eq!(bars[1].close, 195.95);
        assert_eq!(bars[1].volume, 3_819_456.0);
    }

    #[test]
    fn missing_series_is_unknown_symbol_with_upstream_text() {
        let body = json!({ "Error Message": "Invalid API call." });
        let err = parse_daily_payload(&ibm(), &body).unwrap_err();
        match &err {
            FetchError::UnknownSymbol { upstream, .. } => {
                assert_eq!(upstream.as_deref(), Some("Invalid API call."))
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err
            .to_string()
            .starts_with("Invalid API call. Please check that symbol IBM is correct."));
    }

    #[test]
    fn rate_limit_note_is_carried() {
        let body = json!({ "Note": "Thank you for using Alpha Vantage!" });
        let msg = parse_daily_payload(&ibm(), &body).unwrap_err().to_string();
        assert!(msg.contains("Thank you for using Alpha Vantage!"));
    }

    #[test]
    fn non_numeric_field_is_malformed() {
        let body = json!({
            "Time Series (Daily)": {
                "2024-03-08": { "1. open": "x", "2. high": "1", "3. low": "1",
                                "4. close": "1", "5. volume": "1" }
            }
        });
        assert!(matches!(
            parse_daily_payload(&ibm(), &body),
            Err(FetchError::Malformed { .. })
        ));
    }

    #[test]
    fn url_carries_symbol_and_full_output() {
        let client =
            AlphaVantageClient::new("KEY", "https://example.test/", Duration::from_secs(1)).unwrap();
        let url = client.daily_url(&ibm());
        assert!(url.starts_with("https://example.test/query?function=TIME_SERIES_DAILY"));
        assert!(url.contains("symbol=IBM"));
        assert!(url.contains("outputsize=full"));
        assert!(url.ends_with("apikey=KEY"));
    }

    #[tokio::test]
    async fn static_fetcher_serves_known_tickers_only() {
        let bar = PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
        };
        let fetcher = StaticFetcher::new().with_bars(ibm(), vec![bar]);

        assert_eq!(fetcher.get_daily(&ibm()).await.unwrap().len(), 1);
        let other = Ticker::parse("MSFT").unwrap();
        assert!(matches!(
            fetcher.get_daily(&other).await,
            Err(FetchError::UnknownSymbol { .. })
        ));
    }
}
