//! Daily market snapshots and week-over-week price change

use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::coindcx::Ticker;
use crate::error::Result;

/// Quote currencies left out of snapshots
pub const REMOVED_CURRENCIES: [&str; 10] = [
    "INR", "BNB", "ETH", "USDC", "BUSD", "TUSD", "TRX", "DAI", "XRP", "INR_insta",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRow {
    pub market: String,
    pub last_price: f64,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub volume: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub timestamp: String,
}

impl MarketRow {
    fn from_ticker(ticker: &Ticker) -> Option<Self> {
        let timestamp = Utc
            .timestamp_opt(ticker.timestamp, 0)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        Some(MarketRow {
            market: ticker.market.clone(),
            last_price: ticker.last_price_f64()?,
            bid: ticker.bid_f64(),
            ask: ticker.ask_f64(),
            volume: ticker.volume_f64(),
            high: ticker.high.as_deref().and_then(|v| v.parse().ok()),
            low: ticker.low.as_deref().and_then(|v| v.parse().ok()),
            timestamp,
        })
    }
}

/// Whether `market` survives the snapshot filter
pub fn is_tracked(market: &str, extra_removed: &[String]) -> bool {
    if market.contains("insta") {
        return false;
    }
    !REMOVED_CURRENCIES
        .iter()
        .copied()
        .chain(extra_removed.iter().map(String::as_str))
        .any(|currency| market.ends_with(currency))
}

/// Filter and sort tickers into snapshot rows
pub fn market_rows(tickers: &[Ticker], extra_removed: &[String]) -> Vec<MarketRow> {
    let mut rows: Vec<MarketRow> = tickers
        .iter()
        .filter(|t| is_tracked(&t.market, extra_removed))
        .filter_map(MarketRow::from_ticker)
        .collect();
    rows.sort_by(|a, b| a.market.cmp(&b.market));
    rows
}

pub fn snapshot_file_name(date: NaiveDate) -> String {
    format!("{}_market_data.csv", date.format("%Y-%m-%d"))
}

/// Write `{date}_market_data.csv` into `dir`
pub fn write_snapshot(dir: &Path, date: NaiveDate, rows: &[MarketRow]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(snapshot_file_name(date));
    let mut wtr = csv::Writer::from_path(&path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    info!("Wrote {} markets to {}", rows.len(), path.display());
    Ok(path)
}

pub fn read_snapshot(path: &Path) -> Result<Vec<MarketRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Snapshot file in `dir` for `date`, if one was written
pub fn find_snapshot(dir: &Path, date: NaiveDate) -> Result<Option<PathBuf>> {
    let prefix = date.format("%Y-%m-%d").to_string();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(&prefix) && n.ends_with(".csv"))
            .unwrap_or(false);
        if matches {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// Whole weeks between two dates
pub fn week_number(initial: NaiveDate, current: NaiveDate) -> i64 {
    (current - initial).num_days().div_euclid(7)
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeekChange {
    pub market: String,
    pub initial_price: f64,
    pub current_price: f64,
    /// Percent change rounded to two decimals
    pub change_percent: f64,
}

/// Price change of every initial market still present in `latest`
pub fn week_change(initial: &[MarketRow], latest: &[MarketRow]) -> Vec<WeekChange> {
    let current: HashMap<&str, f64> = latest
        .iter()
        .map(|r| (r.market.as_str(), r.last_price))
        .collect();

    initial
        .iter()
        .filter(|r| r.last_price != 0.0)
        .filter_map(|r| {
            let current_price = *current.get(r.market.as_str())?;
            let change = (current_price - r.last_price) / r.last_price * 100.0;
            Some(WeekChange {
                market: r.market.clone(),
                initial_price: r.last_price,
                current_price,
                change_percent: (change * 100.0).round() / 100.0,
            })
        })
        .collect()
}

/// Write `week_{n}_change.csv` into `dir`
pub fn write_week_change(dir: &Path, week: i64, changes: &[WeekChange]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("week_{}_change.csv", week));
    let mut wtr = csv::Writer::from_path(&path)?;
    wtr.write_record([
        "market".to_string(),
        format!("Week {} Price", week),
        format!("Week {} Current Price", week),
        format!("Week {} Change", week),
    ])?;
    for c in changes {
        wtr.write_record([
            c.market.clone(),
            c.initial_price.to_string(),
            c.current_price.to_string(),
            format!("{} %", c.change_percent),
        ])?;
    }
    wtr.flush()?;
    info!("Wrote week {} change for {} markets to {}", week, changes.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ticker(market: &str, price: &str) -> Ticker {
        serde_json::from_value(serde_json::json!({
            "market": market,
            "last_price": price,
            "bid": price,
            "ask": price,
            "volume": "10",
            "timestamp": 1_700_000_000i64,
            "high": "2",
            "low": "1"
        }))
        .unwrap()
    }

    fn row(market: &str, price: f64) -> MarketRow {
        MarketRow {
            market: market.to_string(),
            last_price: price,
            bid: None,
            ask: None,
            volume: None,
            high: None,
            low: None,
            timestamp: String::new(),
        }
    }

    #[test]
    fn test_filter_and_sort() {
        let tickers = vec![
            ticker("SOLUSDT", "20"),
            ticker("BTCINR", "3000000"),
            ticker("ADAUSDT", "0.3"),
            ticker("BTCETH", "18"),
            ticker("BTCUSDT_insta", "43000"),
            ticker("LINKBTC", "0.0003"),
        ];
        let rows = market_rows(&tickers, &["BTC".to_string()]);
        let markets: Vec<&str> = rows.iter().map(|r| r.market.as_str()).collect();
        assert_eq!(markets, vec!["ADAUSDT", "SOLUSDT"]);
        assert_eq!(rows[0].high, Some(2.0));
    }

    #[test]
    fn test_snapshot_file_round_trip() {
        let dir = tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2023, 12, 20).unwrap();
        let rows = market_rows(&[ticker("ADAUSDT", "0.3")], &[]);

        let path = write_snapshot(dir.path(), date, &rows).unwrap();
        assert!(path.ends_with("2023-12-20_market_data.csv"));
        assert_eq!(read_snapshot(&path).unwrap(), rows);
        assert_eq!(find_snapshot(dir.path(), date).unwrap(), Some(path));
    }

    #[test]
    fn test_week_number() {
        let start = NaiveDate::from_ymd_opt(2023, 12, 20).unwrap();
        assert_eq!(week_number(start, NaiveDate::from_ymd_opt(2023, 12, 26).unwrap()), 0);
        assert_eq!(week_number(start, NaiveDate::from_ymd_opt(2023, 12, 27).unwrap()), 1);
        assert_eq!(week_number(start, NaiveDate::from_ymd_opt(2024, 1, 17).unwrap()), 4);
    }

    #[test]
    fn test_week_change_arithmetic() {
        let initial = vec![row("ADAUSDT", 0.3), row("SOLUSDT", 20.0), row("GONEUSDT", 1.0)];
        let latest = vec![row("ADAUSDT", 0.33), row("SOLUSDT", 15.0)];

        let changes = week_change(&initial, &latest);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].change_percent, 10.0);
        assert_eq!(changes[1].change_percent, -25.0);
        assert_eq!(changes[1].current_price, 15.0);
    }

    #[test]
    fn test_week_change_file() {
        let dir = tempdir().unwrap();
        let changes = week_change(&[row("SOLUSDT", 20.0)], &[row("SOLUSDT", 25.0)]);
        let path = write_week_change(dir.path(), 3, &changes).unwrap();

        let raw = fs::read_to_string(path).unwrap();
        let mut lines = raw.lines();
        assert_eq!(
            lines.next(),
            Some("market,Week 3 Price,Week 3 Current Price,Week 3 Change")
        );
        assert_eq!(lines.next(), Some("SOLUSDT,20,25,25 %"));
    }
}
