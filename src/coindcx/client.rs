//! CoinDCX API Client
//!
//! One method per endpoint, all following the same path: build the body,
//! sign it, POST it, parse the JSON, check for the embedded `401` marker and
//! return typed data.
//!
//! # Example
//!
//! ```no_run
//! use crypto_trading_bot::coindcx::CoinDCXClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = CoinDCXClient::new("api_key", "api_secret")?;
//!
//!     let ticker = client.get_ticker("BTCUSDT").await?;
//!     println!("BTC/USDT price: {}", ticker.last_price);
//!
//!     for balance in client.get_balances().await? {
//!         println!("{}: {}", balance.currency, balance.balance);
//!     }
//!
//!     Ok(())
//! }
//! ```

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::auth::{Credentials, SignedRequest};
use super::types::*;
use crate::config::ExchangeConfig;
use crate::error::{BotError, Result};
use crate::report::OrderHistory;

/// Base URL for CoinDCX API
pub const API_BASE_URL: &str = "https://api.coindcx.com";

/// Base URL for public market data endpoints
pub const PUBLIC_BASE_URL: &str = "https://public.coindcx.com";

/// Numeric marker the exchange embeds in JSON bodies for rejected credentials
pub const UNAUTHORIZED_MARKER: i64 = 401;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub public_base_url: String,
    /// Request timeout applied to every call
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: API_BASE_URL.to_string(),
            public_base_url: PUBLIC_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl ClientConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Point both authenticated and public endpoints at `base_url`
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.public_base_url = base_url.clone();
        self.api_base_url = base_url;
        self
    }
}

impl From<&ExchangeConfig> for ClientConfig {
    fn from(config: &ExchangeConfig) -> Self {
        Self {
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
        }
    }
}

/// Fail with [`BotError::Unauthorized`] when a top-level value of a JSON
/// object equals the `401` marker
///
/// The exchange reports rejected credentials inside the payload rather than
/// through the HTTP status, so every response passes through here.
pub fn check_auth_marker(value: &Value) -> Result<()> {
    if let Value::Object(map) = value {
        if map
            .values()
            .any(|v| v.as_f64() == Some(UNAUTHORIZED_MARKER as f64))
        {
            return Err(BotError::Unauthorized);
        }
    }
    Ok(())
}

/// CoinDCX Exchange API Client
///
/// Public endpoints work without credentials; authenticated endpoints
/// return [`BotError::MissingCredentials`] when none were supplied.
#[derive(Clone)]
pub struct CoinDCXClient {
    credentials: Option<Credentials>,
    http_client: Client,
    api_base_url: String,
    public_base_url: String,
    order_history: Option<OrderHistory>,
}

impl CoinDCXClient {
    /// Create a new client with API credentials
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Result<Self> {
        Self::with_config(
            Some(Credentials::new(api_key, api_secret)),
            ClientConfig::default(),
        )
    }

    /// Create a client for public market data only
    pub fn public(config: ClientConfig) -> Result<Self> {
        Self::with_config(None, config)
    }

    /// Create a new client with custom configuration
    pub fn with_config(credentials: Option<Credentials>, config: ClientConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            credentials,
            http_client,
            api_base_url: config.api_base_url,
            public_base_url: config.public_base_url,
            order_history: None,
        })
    }

    /// Append every placed order to `history`
    pub fn with_order_history(mut self, history: OrderHistory) -> Self {
        self.order_history = Some(history);
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    async fn read_response<R: DeserializeOwned>(response: Response) -> Result<R> {
        let status = response.status();
        let text = response.text().await?;

        let value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(_) if !status.is_success() => {
                return Err(BotError::Api {
                    status: status.as_u16(),
                    body: text,
                })
            }
            Err(e) => return Err(e.into()),
        };

        check_auth_marker(&value)?;

        if !status.is_success() {
            return Err(BotError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(serde_json::from_value(value)?)
    }

    async fn public_get<R: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<R> {
        debug!("GET {}", url);
        let response = self.http_client.get(url).query(query).send().await?;
        Self::read_response(response).await
    }

    /// Sign `body` and POST it to an authenticated endpoint
    async fn signed_post<T, R>(&self, endpoint: &str, body: &T) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(BotError::MissingCredentials)?;
        let signed = SignedRequest::new(body, credentials)?;
        let url = format!("{}{}", self.api_base_url, endpoint);
        debug!("POST {}", url);

        let mut request = self.http_client.post(&url);
        for (name, value) in signed.headers() {
            request = request.header(name, value);
        }
        let response = request.body(signed.into_body()).send().await?;

        Self::read_response(response).await
    }

    fn record_order(&self, order: &OrderRequest) {
        if let Some(history) = &self.order_history {
            match history.record(order) {
                Ok(()) => info!("Written to order history file!"),
                Err(e) => warn!("Failed to write order history: {}", e),
            }
        }
    }

    // ==================== PUBLIC ENDPOINTS ====================

    /// Get ticker information for all markets
    pub async fn get_all_tickers(&self) -> Result<Vec<Ticker>> {
        let url = format!("{}/exchange/ticker", self.api_base_url);
        self.public_get(&url, &[]).await
    }

    /// Get ticker information for a specific market
    pub async fn get_ticker(&self, market: &str) -> Result<Ticker> {
        self.get_all_tickers()
            .await?
            .into_iter()
            .find(|t| t.market == market)
            .ok_or_else(|| BotError::TickerNotFound(market.to_string()))
    }

    /// Get list of all available market symbols
    pub async fn get_markets(&self) -> Result<Vec<String>> {
        let url = format!("{}/exchange/v1/markets", self.api_base_url);
        self.public_get(&url, &[]).await
    }

    /// Get detailed information for all markets
    pub async fn get_markets_details(&self) -> Result<Vec<MarketDetails>> {
        let url = format!("{}/exchange/v1/markets_details", self.api_base_url);
        self.public_get(&url, &[]).await
    }

    /// Get details for one market symbol (e.g. "BTCUSDT")
    pub async fn get_market_details(&self, symbol: &str) -> Result<MarketDetails> {
        self.get_markets_details()
            .await?
            .into_iter()
            .find(|m| m.symbol == symbol)
            .ok_or_else(|| BotError::MarketNotFound(symbol.to_string()))
    }

    /// Get details for every market quoted in `quote` (e.g. all "*USDT")
    pub async fn get_markets_details_for_quote(&self, quote: &str) -> Result<Vec<MarketDetails>> {
        Ok(self
            .get_markets_details()
            .await?
            .into_iter()
            .filter(|m| m.symbol.ends_with(quote))
            .collect())
    }

    /// Get details for each of `symbols`, in the order the exchange lists them
    pub async fn get_markets_details_for_symbols(
        &self,
        symbols: &[String],
    ) -> Result<Vec<MarketDetails>> {
        Ok(self
            .get_markets_details()
            .await?
            .into_iter()
            .filter(|m| symbols.contains(&m.symbol))
            .collect())
    }

    /// Get candle/OHLCV data for a market
    ///
    /// # Arguments
    /// * `pair` - Trading pair (e.g., "B-BTC_USDT")
    /// * `interval` - Candle interval (1m, 5m, 15m, 30m, 1h, 2h, 4h, 6h, 8h, 1d, 3d, 1w, 1M)
    /// * `limit` - Number of candles (max 1000)
    pub async fn get_candles(&self, pair: &str, interval: &str, limit: u32) -> Result<Vec<Candle>> {
        let url = format!("{}/market_data/candles", self.public_base_url);
        let query = [
            ("pair", pair.to_string()),
            ("interval", interval.to_string()),
            ("limit", limit.to_string()),
        ];
        self.public_get(&url, &query).await
    }

    /// Get candles for a market symbol, resolving its candle pair first
    pub async fn get_candles_for_symbol(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        let details = self.get_market_details(symbol).await?;
        let pair = details
            .pair
            .ok_or_else(|| BotError::MarketNotFound(format!("{} has no candle pair", symbol)))?;
        self.get_candles(&pair, interval, limit).await
    }

    // ==================== AUTHENTICATED ENDPOINTS ====================

    pub async fn get_balances(&self) -> Result<Vec<Balance>> {
        self.signed_post("/exchange/v1/users/balances", &TimestampRequest::new())
            .await
    }

    /// Available balance of one currency, zero when the account holds none
    pub async fn get_balance(&self, currency: &str) -> Result<f64> {
        Ok(self
            .get_balances()
            .await?
            .into_iter()
            .find(|b| b.currency == currency)
            .map(|b| b.balance)
            .unwrap_or(0.0))
    }

    pub async fn get_user_info(&self) -> Result<UserInfo> {
        self.signed_post("/exchange/v1/users/info", &TimestampRequest::new())
            .await
    }

    /// Place a new order
    pub async fn place_order(&self, order: &OrderRequest) -> Result<OrdersResponse> {
        let response: OrdersResponse = self
            .signed_post("/exchange/v1/orders/create", order)
            .await?;
        info!(
            "{} {} order placed on {}: qty={} price={:?}",
            order.side, order.order_type, order.market, order.total_quantity, order.price_per_unit
        );
        self.record_order(order);
        Ok(response)
    }

    pub async fn place_buy_limit_order(
        &self,
        market: &str,
        price: f64,
        quantity: f64,
    ) -> Result<OrdersResponse> {
        self.place_order(&OrderRequest::limit(OrderSide::Buy, market, quantity, price))
            .await
    }

    pub async fn place_sell_limit_order(
        &self,
        market: &str,
        price: f64,
        quantity: f64,
    ) -> Result<OrdersResponse> {
        self.place_order(&OrderRequest::limit(OrderSide::Sell, market, quantity, price))
            .await
    }

    /// Buy at the current market price; executes immediately
    pub async fn place_market_buy_order(&self, market: &str, quantity: f64) -> Result<OrdersResponse> {
        self.place_order(&OrderRequest::market(OrderSide::Buy, market, quantity))
            .await
    }

    /// Sell at the current market price; executes immediately
    pub async fn place_market_sell_order(&self, market: &str, quantity: f64) -> Result<OrdersResponse> {
        self.place_order(&OrderRequest::market(OrderSide::Sell, market, quantity))
            .await
    }

    /// Create several orders in one request
    pub async fn create_multiple_orders(&self, orders: Vec<OrderRequest>) -> Result<OrdersResponse> {
        let body = MultipleOrdersRequest { orders };
        let response: OrdersResponse = self
            .signed_post("/exchange/v1/orders/create_multiple", &body)
            .await?;
        for order in &body.orders {
            self.record_order(order);
        }
        Ok(response)
    }

    pub async fn get_order_status(&self, order_id: &str) -> Result<OrderResponse> {
        self.signed_post("/exchange/v1/orders/status", &OrderStatusRequest::by_id(order_id))
            .await
    }

    pub async fn get_multiple_order_status(&self, ids: &[String]) -> Result<Vec<OrderResponse>> {
        self.signed_post("/exchange/v1/orders/status_multiple", &OrderIdsRequest::new(ids))
            .await
    }

    /// Get active orders for a market, optionally for one side only
    pub async fn get_active_orders(
        &self,
        market: &str,
        side: Option<OrderSide>,
    ) -> Result<OrdersResponse> {
        let mut request = ActiveOrdersRequest::new(market);
        if let Some(s) = side {
            request = request.with_side(s);
        }
        self.signed_post("/exchange/v1/orders/active_orders", &request)
            .await
    }

    pub async fn get_active_orders_count(
        &self,
        market: &str,
        side: Option<OrderSide>,
    ) -> Result<ActiveOrdersCount> {
        let mut request = ActiveOrdersRequest::new(market);
        if let Some(s) = side {
            request = request.with_side(s);
        }
        self.signed_post("/exchange/v1/orders/active_orders_count", &request)
            .await
    }

    /// Get trade history, starting after `from_id` when given
    pub async fn get_trade_history(&self, from_id: Option<i64>, limit: u32) -> Result<Vec<Trade>> {
        self.signed_post(
            "/exchange/v1/orders/trade_history",
            &TradeHistoryRequest::new(from_id, limit),
        )
        .await
    }

    pub async fn cancel_order(&self, order_id: &str) -> Result<Value> {
        self.signed_post("/exchange/v1/orders/cancel", &CancelOrderRequest::new(order_id))
            .await
    }

    /// Cancel all orders for a market, optionally for one side only
    pub async fn cancel_all_orders(&self, market: &str, side: Option<OrderSide>) -> Result<Value> {
        let mut request = ActiveOrdersRequest::new(market);
        if let Some(s) = side {
            request = request.with_side(s);
        }
        self.signed_post("/exchange/v1/orders/cancel_all", &request)
            .await
    }

    pub async fn cancel_orders_by_ids(&self, ids: &[String]) -> Result<Value> {
        self.signed_post("/exchange/v1/orders/cancel_by_ids", &OrderIdsRequest::new(ids))
            .await
    }

    /// Change the price of an open order
    pub async fn edit_order_price(&self, order_id: &str, price: f64) -> Result<Value> {
        self.signed_post(
            "/exchange/v1/orders/edit",
            &EditPriceRequest::new(order_id, price),
        )
        .await
    }

    // ==================== FUNDING ENDPOINTS ====================

    pub async fn fetch_lend_orders(&self) -> Result<Value> {
        self.signed_post("/exchange/v1/funding/fetch_orders", &TimestampRequest::new())
            .await
    }

    pub async fn lend(&self, currency: &str, amount: f64, duration: u32) -> Result<Value> {
        self.signed_post(
            "/exchange/v1/funding/lend",
            &LendRequest::new(currency, amount, duration),
        )
        .await
    }

    pub async fn settle(&self, order_id: &str) -> Result<Value> {
        self.signed_post("/exchange/v1/funding/settle", &CancelOrderRequest::new(order_id))
            .await
    }
}
