//! CoinDCX Exchange API Library
//!
//! # Quick Start
//!
//! ```no_run
//! use crypto_trading_bot::coindcx::{CoinDCXClient, OrderRequest, OrderSide};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = CoinDCXClient::new("your_api_key", "your_api_secret")?;
//!
//!     let ticker = client.get_ticker("BTCUSDT").await?;
//!     println!("BTC/USDT: {}", ticker.last_price);
//!
//!     let order = OrderRequest::limit(OrderSide::Buy, "BTCUSDT", 0.001, 40000.0);
//!     let response = client.place_order(&order).await?;
//!     println!("Order placed: {:?}", response);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`auth`]: HMAC-SHA256 request signing
//! - [`types`]: Request and response type definitions
//! - [`client`]: Main API client implementation

pub mod auth;
pub mod client;
pub mod types;

pub use auth::{sign_request, Credentials, SignedRequest};
pub use client::{check_auth_marker, ClientConfig, CoinDCXClient, API_BASE_URL, PUBLIC_BASE_URL};

pub use types::{
    Balance, Candle, MarketDetails, OrderRequest, OrderResponse, OrderSide, OrderType,
    OrdersResponse, Ticker, Trade, UserInfo,
};
