//! TradingView scanner client
//!
//! One POST per snapshot to `{scanner}/{screener}/scan`, asking for every
//! snapshot field with the interval suffix appended to the column name.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{IndicatorQuery, IndicatorSnapshot, IndicatorSource, Interval, SNAPSHOT_FIELDS};
use crate::config::IndicatorConfig;
use crate::error::{BotError, Result};

pub const SCANNER_URL: &str = "https://scanner.tradingview.com";

#[derive(Debug, Deserialize)]
struct ScanResponse {
    #[serde(default)]
    data: Vec<ScanRow>,
}

#[derive(Debug, Deserialize)]
struct ScanRow {
    #[serde(default)]
    d: Vec<Value>,
}

pub struct TradingViewClient {
    http_client: Client,
    scanner_url: String,
}

impl TradingViewClient {
    pub fn new(config: &IndicatorConfig) -> Result<Self> {
        Self::with_scanner_url(&config.scanner_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn with_scanner_url(scanner_url: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            scanner_url: scanner_url.trim_end_matches('/').to_string(),
        })
    }

    /// Scanner column names for `interval`, e.g. "RSI|240"
    pub fn columns(interval: Interval) -> Vec<String> {
        let suffix = interval.scanner_suffix();
        SNAPSHOT_FIELDS
            .iter()
            .map(|field| format!("{}{}", field, suffix))
            .collect()
    }

    pub fn scan_body(query: &IndicatorQuery) -> Value {
        json!({
            "symbols": {
                "tickers": [query.ticker()],
                "query": { "types": [] }
            },
            "columns": Self::columns(query.interval),
        })
    }

    /// Fetch one snapshot, skipping columns the scanner reports as null
    pub async fn fetch(&self, query: &IndicatorQuery) -> Result<IndicatorSnapshot> {
        let url = format!(
            "{}/{}/scan",
            self.scanner_url,
            query.screener.to_lowercase()
        );
        debug!("Scanning {} on {} ({})", query.ticker(), url, query.interval);

        let response = self
            .http_client
            .post(&url)
            .json(&Self::scan_body(query))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(BotError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ScanResponse = serde_json::from_str(&text)?;
        let row = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| BotError::IndicatorUnavailable(query.ticker()))?;

        let mut snapshot = IndicatorSnapshot::new();
        for (field, value) in SNAPSHOT_FIELDS.iter().zip(row.d.iter()) {
            if let Some(v) = value.as_f64() {
                snapshot.insert(*field, v);
            }
        }
        Ok(snapshot)
    }
}

#[async_trait]
impl IndicatorSource for TradingViewClient {
    async fn snapshot(&self, query: &IndicatorQuery) -> Result<IndicatorSnapshot> {
        self.fetch(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::{CLOSE, PIVOT_MIDDLE, RSI, VOLUME};
    use mockito::Matcher;

    fn query() -> IndicatorQuery {
        IndicatorQuery::new("BTCUSDT", "Crypto", "Binance", Interval::FourHours)
    }

    #[test]
    fn test_columns_carry_suffix() {
        let columns = TradingViewClient::columns(Interval::FourHours);
        assert_eq!(columns.len(), SNAPSHOT_FIELDS.len());
        assert_eq!(columns[0], "RSI|240");
        assert!(columns.contains(&"Pivot.M.Fibonacci.Middle|240".to_string()));

        let daily = TradingViewClient::columns(Interval::OneDay);
        assert_eq!(daily[0], "RSI");
    }

    #[test]
    fn test_scan_body_shape() {
        let body = TradingViewClient::scan_body(&query());
        assert_eq!(body["symbols"]["tickers"][0], "BINANCE:BTCUSDT");
        assert!(body["symbols"]["query"]["types"].as_array().unwrap().is_empty());
        assert_eq!(body["columns"][1], "EMA10|240");
    }

    #[tokio::test]
    async fn test_fetch_snapshot() {
        let mut server = mockito::Server::new_async().await;

        let mut values: Vec<Value> = (0..SNAPSHOT_FIELDS.len()).map(|i| json!(i as f64)).collect();
        values[0] = json!(28.5);
        values[SNAPSHOT_FIELDS.len() - 1] = Value::Null;

        let mock = server
            .mock("POST", "/crypto/scan")
            .match_body(Matcher::PartialJson(json!({
                "symbols": {"tickers": ["BINANCE:BTCUSDT"]}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"totalCount": 1, "data": [{"s": "BINANCE:BTCUSDT", "d": values}]}).to_string())
            .create_async()
            .await;

        let client = TradingViewClient::with_scanner_url(&server.url(), Duration::from_secs(5)).unwrap();
        let snapshot = client.snapshot(&query()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(snapshot.get(RSI), Some(28.5));
        assert_eq!(snapshot.get(PIVOT_MIDDLE), Some(13.0));
        assert_eq!(snapshot.get(CLOSE), Some(20.0));
        assert_eq!(snapshot.get(VOLUME), None);
        assert_eq!(snapshot.len(), SNAPSHOT_FIELDS.len() - 1);
    }

    #[tokio::test]
    async fn test_empty_result_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/crypto/scan")
            .with_status(200)
            .with_body(r#"{"totalCount":0,"data":[]}"#)
            .create_async()
            .await;

        let client = TradingViewClient::with_scanner_url(&server.url(), Duration::from_secs(5)).unwrap();
        let err = client.snapshot(&query()).await.unwrap_err();
        assert!(matches!(err, BotError::IndicatorUnavailable(t) if t == "BINANCE:BTCUSDT"));
    }
}
