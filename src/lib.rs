//! CoinDCX Trading Bot
//!
//! A personal trading toolkit for the CoinDCX exchange: HMAC-signed order
//! placement, indicator snapshots from the TradingView scanner (or computed
//! locally from exchange candles), a pivot-band trading loop, per-user
//! credential storage and CSV/email reporting.
//!
//! ## CoinDCX Example
//! ```no_run
//! use crypto_trading_bot::coindcx::CoinDCXClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = CoinDCXClient::new("api_key", "api_secret")?;
//!     let ticker = client.get_ticker("BTCUSDT").await?;
//!     println!("Price: {}", ticker.last_price);
//!     Ok(())
//! }
//! ```
//!
//! ## Indicator Example
//! ```no_run
//! use crypto_trading_bot::config::IndicatorConfig;
//! use crypto_trading_bot::indicator::{IndicatorQuery, IndicatorSource, Interval, TradingViewClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let scanner = TradingViewClient::new(&IndicatorConfig::default())?;
//!     let query = IndicatorQuery::new("BTCUSDT", "Crypto", "Binance", Interval::FourHours);
//!     let snapshot = scanner.snapshot(&query).await?;
//!     println!("RSI: {}", snapshot.rsi()?);
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod coindcx;
pub mod config;
pub mod credentials;
pub mod error;
pub mod indicator;
pub mod indicators;
pub mod notify;
pub mod report;
pub mod scan;
pub mod strategy;

pub use bot::{BotState, ExchangeApi, TradingBot};
pub use config::AppConfig;
pub use error::{BotError, Result};
pub use indicator::{IndicatorQuery, IndicatorSnapshot, IndicatorSource, Interval};
pub use strategy::{Action, PriceLevels, TradeRules};
