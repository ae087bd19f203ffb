//! Indicator snapshots and the sources that produce them
//!
//! A snapshot is a flat map of named values for one symbol and interval,
//! keyed the way the TradingView scanner names its columns. The trading
//! loop only reads it through the typed accessors.

pub mod candles;
pub mod tradingview;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::config::BotConfig;
use crate::error::{BotError, Result};
use crate::indicators::FibonacciPivots;

pub use candles::CandleIndicatorSource;
pub use tradingview::TradingViewClient;

pub const RSI: &str = "RSI";
pub const EMA10: &str = "EMA10";
pub const EMA20: &str = "EMA20";
pub const EMA50: &str = "EMA50";
pub const EMA100: &str = "EMA100";
pub const EMA200: &str = "EMA200";
pub const MACD: &str = "MACD.macd";
pub const MACD_SIGNAL: &str = "MACD.signal";
pub const STOCH_K: &str = "Stoch.K";
pub const STOCH_D: &str = "Stoch.D";
pub const PIVOT_S3: &str = "Pivot.M.Fibonacci.S3";
pub const PIVOT_S2: &str = "Pivot.M.Fibonacci.S2";
pub const PIVOT_S1: &str = "Pivot.M.Fibonacci.S1";
pub const PIVOT_MIDDLE: &str = "Pivot.M.Fibonacci.Middle";
pub const PIVOT_R1: &str = "Pivot.M.Fibonacci.R1";
pub const PIVOT_R2: &str = "Pivot.M.Fibonacci.R2";
pub const PIVOT_R3: &str = "Pivot.M.Fibonacci.R3";
pub const OPEN: &str = "open";
pub const HIGH: &str = "high";
pub const LOW: &str = "low";
pub const CLOSE: &str = "close";
pub const VOLUME: &str = "volume";

/// Every field a snapshot may carry, in scanner column order
pub const SNAPSHOT_FIELDS: [&str; 22] = [
    RSI,
    EMA10,
    EMA20,
    EMA50,
    EMA100,
    EMA200,
    MACD,
    MACD_SIGNAL,
    STOCH_K,
    STOCH_D,
    PIVOT_S3,
    PIVOT_S2,
    PIVOT_S1,
    PIVOT_MIDDLE,
    PIVOT_R1,
    PIVOT_R2,
    PIVOT_R3,
    OPEN,
    HIGH,
    LOW,
    CLOSE,
    VOLUME,
];

/// Chart interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHours,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1W")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneHour => "1h",
            Interval::TwoHours => "2h",
            Interval::FourHours => "4h",
            Interval::OneDay => "1d",
            Interval::OneWeek => "1W",
            Interval::OneMonth => "1M",
        }
    }

    /// Column suffix the scanner expects; the daily chart has none
    pub fn scanner_suffix(&self) -> &'static str {
        match self {
            Interval::OneMinute => "|1",
            Interval::FiveMinutes => "|5",
            Interval::FifteenMinutes => "|15",
            Interval::ThirtyMinutes => "|30",
            Interval::OneHour => "|60",
            Interval::TwoHours => "|120",
            Interval::FourHours => "|240",
            Interval::OneDay => "",
            Interval::OneWeek => "|1W",
            Interval::OneMonth => "|1M",
        }
    }

    /// Interval name on the exchange candles endpoint
    pub fn candle_interval(&self) -> &'static str {
        match self {
            Interval::OneWeek => "1w",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1m" => Ok(Interval::OneMinute),
            "5m" => Ok(Interval::FiveMinutes),
            "15m" => Ok(Interval::FifteenMinutes),
            "30m" => Ok(Interval::ThirtyMinutes),
            "1h" => Ok(Interval::OneHour),
            "2h" => Ok(Interval::TwoHours),
            "4h" => Ok(Interval::FourHours),
            "1d" => Ok(Interval::OneDay),
            "1W" | "1w" => Ok(Interval::OneWeek),
            "1M" => Ok(Interval::OneMonth),
            other => Err(BotError::Config(format!("Unsupported interval: {}", other))),
        }
    }
}

/// What to fetch indicators for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorQuery {
    /// Ticker symbol, e.g. "BTCUSDT"
    pub symbol: String,
    /// Screener name, e.g. "Crypto"
    pub screener: String,
    /// Exchange as known to the provider, e.g. "Binance"
    pub exchange: String,
    pub interval: Interval,
}

impl IndicatorQuery {
    pub fn new(
        symbol: impl Into<String>,
        screener: impl Into<String>,
        exchange: impl Into<String>,
        interval: Interval,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            screener: screener.into(),
            exchange: exchange.into(),
            interval,
        }
    }

    pub fn from_config(config: &BotConfig) -> Result<Self> {
        Ok(Self::new(
            config.symbol(),
            &config.screener,
            &config.market,
            config.interval.parse()?,
        ))
    }

    /// Provider ticker, e.g. "BINANCE:BTCUSDT"
    pub fn ticker(&self) -> String {
        format!("{}:{}", self.exchange.to_uppercase(), self.symbol)
    }
}

/// Indicator values for one symbol and interval at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    values: BTreeMap<String, f64>,
}

impl IndicatorSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), value);
    }

    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Value of `key`, or [`BotError::MissingIndicator`]
    pub fn require(&self, key: &str) -> Result<f64> {
        self.get(key)
            .ok_or_else(|| BotError::MissingIndicator(key.to_string()))
    }

    pub fn rsi(&self) -> Result<f64> {
        self.require(RSI)
    }

    pub fn close(&self) -> Result<f64> {
        self.require(CLOSE)
    }

    pub fn pivots(&self) -> Result<FibonacciPivots> {
        Ok(FibonacciPivots {
            s3: self.require(PIVOT_S3)?,
            s2: self.require(PIVOT_S2)?,
            s1: self.require(PIVOT_S1)?,
            pivot: self.require(PIVOT_MIDDLE)?,
            r1: self.require(PIVOT_R1)?,
            r2: self.require(PIVOT_R2)?,
            r3: self.require(PIVOT_R3)?,
        })
    }

    pub fn set_pivots(&mut self, pivots: &FibonacciPivots) {
        self.insert(PIVOT_S3, pivots.s3);
        self.insert(PIVOT_S2, pivots.s2);
        self.insert(PIVOT_S1, pivots.s1);
        self.insert(PIVOT_MIDDLE, pivots.pivot);
        self.insert(PIVOT_R1, pivots.r1);
        self.insert(PIVOT_R2, pivots.r2);
        self.insert(PIVOT_R3, pivots.r3);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Anything that can produce an indicator snapshot
#[async_trait]
pub trait IndicatorSource: Send + Sync {
    async fn snapshot(&self, query: &IndicatorQuery) -> Result<IndicatorSnapshot>;
}

#[async_trait]
impl<T: IndicatorSource + ?Sized> IndicatorSource for Box<T> {
    async fn snapshot(&self, query: &IndicatorQuery) -> Result<IndicatorSnapshot> {
        (**self).snapshot(query).await
    }
}
