//! Types and models for CoinDCX API
//!
//! Request bodies keep their field order stable because the serialised
//! form is what gets signed. Every authenticated body carries a
//! millisecond `timestamp`.

use serde::{Deserialize, Serialize};

use super::auth::now_millis;

/// Market ticker information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    /// Market pair name (e.g., "BTCUSDT")
    pub market: String,
    /// Last traded price
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    pub last_price: String,
    /// Highest bid price in orderbook
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    pub bid: String,
    /// Lowest ask price in orderbook
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    pub ask: String,
    /// 24-hour trading volume
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    pub volume: String,
    /// Timestamp (seconds) when ticker was generated
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub change_24_hour: Option<String>,
    #[serde(default)]
    pub high: Option<String>,
    #[serde(default)]
    pub low: Option<String>,
}

impl Ticker {
    pub fn last_price_f64(&self) -> Option<f64> {
        self.last_price.parse().ok()
    }

    pub fn bid_f64(&self) -> Option<f64> {
        self.bid.parse().ok()
    }

    pub fn ask_f64(&self) -> Option<f64> {
        self.ask.parse().ok()
    }

    pub fn volume_f64(&self) -> Option<f64> {
        self.volume.parse().ok()
    }

    /// Ticker time as a UTC datetime
    pub fn datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::<chrono::Utc>::from_timestamp(self.timestamp, 0)
    }
}

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

impl std::str::FromStr for OrderSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" => Ok(OrderSide::Buy),
            "sell" => Ok(OrderSide::Sell),
            other => Err(format!("Unknown order side: {}", other)),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    MarketOrder,
    LimitOrder,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::MarketOrder => write!(f, "market_order"),
            OrderType::LimitOrder => write!(f, "limit_order"),
        }
    }
}

/// Request to create a new order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub side: OrderSide,
    pub order_type: OrderType,
    /// Market pair (e.g., "BTCUSDT")
    pub market: String,
    /// Price per unit (limit orders only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_unit: Option<f64>,
    pub total_quantity: f64,
    pub timestamp: i64,
    /// Exchange code, required inside multi-order batches ("I" for CoinDCX)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ecode: Option<String>,
}

impl OrderRequest {
    pub fn market(side: OrderSide, market: impl Into<String>, quantity: f64) -> Self {
        Self {
            side,
            order_type: OrderType::MarketOrder,
            market: market.into(),
            price_per_unit: None,
            total_quantity: quantity,
            timestamp: now_millis(),
            ecode: None,
        }
    }

    pub fn limit(side: OrderSide, market: impl Into<String>, quantity: f64, price: f64) -> Self {
        Self {
            side,
            order_type: OrderType::LimitOrder,
            market: market.into(),
            price_per_unit: Some(price),
            total_quantity: quantity,
            timestamp: now_millis(),
            ecode: None,
        }
    }

    pub fn with_ecode(mut self, ecode: impl Into<String>) -> Self {
        self.ecode = Some(ecode.into());
        self
    }
}

/// Batch order creation body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultipleOrdersRequest {
    pub orders: Vec<OrderRequest>,
}

/// Order as reported by the exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub order_type: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub fee_amount: Option<f64>,
    #[serde(default)]
    pub total_quantity: Option<f64>,
    #[serde(default)]
    pub remaining_quantity: Option<f64>,
    #[serde(default)]
    pub avg_price: Option<f64>,
    #[serde(default)]
    pub price_per_unit: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Response containing multiple orders
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrdersResponse {
    #[serde(default)]
    pub orders: Vec<OrderResponse>,
}

/// Active order count response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveOrdersCount {
    pub count: u64,
    #[serde(default)]
    pub status: Option<i64>,
}

/// Request to cancel an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    pub id: String,
    pub timestamp: i64,
}

impl CancelOrderRequest {
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            id: order_id.into(),
            timestamp: now_millis(),
        }
    }
}

/// Body for endpoints taking a list of order ids
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderIdsRequest {
    pub ids: Vec<String>,
    pub timestamp: i64,
}

impl OrderIdsRequest {
    pub fn new(ids: &[String]) -> Self {
        Self {
            ids: ids.to_vec(),
            timestamp: now_millis(),
        }
    }
}

/// Request to change the price of an open order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditPriceRequest {
    pub id: String,
    pub timestamp: i64,
    pub price_per_unit: f64,
}

impl EditPriceRequest {
    pub fn new(order_id: impl Into<String>, price: f64) -> Self {
        Self {
            id: order_id.into(),
            timestamp: now_millis(),
            price_per_unit: price,
        }
    }
}

/// User balance information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    /// Currency code (e.g., "BTC", "USDT")
    pub currency: String,
    /// Available balance
    #[serde(deserialize_with = "deserialize_f64_or_string")]
    pub balance: f64,
    /// Balance locked in open orders
    #[serde(default, deserialize_with = "deserialize_f64_or_string")]
    pub locked_balance: f64,
}

impl Balance {
    pub fn total(&self) -> f64 {
        self.balance + self.locked_balance
    }
}

/// Market details information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDetails {
    /// CoinDCX internal name
    #[serde(default)]
    pub coindcx_name: String,
    /// Market symbol (e.g., "BTCUSDT")
    pub symbol: String,
    #[serde(default)]
    pub base_currency_short_name: String,
    #[serde(default)]
    pub target_currency_short_name: String,
    #[serde(default)]
    pub min_quantity: f64,
    #[serde(default)]
    pub max_quantity: f64,
    #[serde(default)]
    pub min_price: f64,
    #[serde(default)]
    pub max_price: f64,
    #[serde(default)]
    pub min_notional: f64,
    #[serde(default)]
    pub step: f64,
    #[serde(default)]
    pub max_leverage: Option<f64>,
    #[serde(default)]
    pub order_types: Vec<String>,
    /// Market status ("active" or "inactive")
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub ecode: Option<String>,
    /// Candle-data pair identifier (e.g., "B-BTC_USDT")
    #[serde(default)]
    pub pair: Option<String>,
}

/// Trade history entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: i64,
    pub order_id: String,
    pub side: String,
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    pub fee_amount: String,
    #[serde(default)]
    pub ecode: String,
    #[serde(deserialize_with = "deserialize_f64_or_string")]
    pub quantity: f64,
    #[serde(deserialize_with = "deserialize_f64_or_string")]
    pub price: f64,
    pub symbol: String,
    /// Trade timestamp in milliseconds
    pub timestamp: i64,
}

/// Trade history request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeHistoryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_id: Option<i64>,
    pub limit: u32,
    pub timestamp: i64,
}

impl TradeHistoryRequest {
    pub fn new(from_id: Option<i64>, limit: u32) -> Self {
        Self {
            from_id,
            limit,
            timestamp: now_millis(),
        }
    }
}

/// User info response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub coindcx_id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub mobile_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Candle/OHLCV data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Candle open time in milliseconds
    pub time: i64,
}

/// Timestamp-only request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampRequest {
    pub timestamp: i64,
}

impl TimestampRequest {
    pub fn new() -> Self {
        Self {
            timestamp: now_millis(),
        }
    }
}

impl Default for TimestampRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Active orders request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveOrdersRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<OrderSide>,
    pub market: String,
    pub timestamp: i64,
}

impl ActiveOrdersRequest {
    pub fn new(market: impl Into<String>) -> Self {
        Self {
            side: None,
            market: market.into(),
            timestamp: now_millis(),
        }
    }

    pub fn with_side(mut self, side: OrderSide) -> Self {
        self.side = Some(side);
        self
    }
}

/// Order status request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusRequest {
    pub id: String,
    pub timestamp: i64,
}

impl OrderStatusRequest {
    pub fn by_id(order_id: impl Into<String>) -> Self {
        Self {
            id: order_id.into(),
            timestamp: now_millis(),
        }
    }
}

/// Lend request for the funding endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LendRequest {
    pub currency_short_name: String,
    pub duration: u32,
    pub amount: f64,
    pub timestamp: i64,
}

impl LendRequest {
    pub fn new(currency: impl Into<String>, amount: f64, duration: u32) -> Self {
        Self {
            currency_short_name: currency.into(),
            duration,
            amount,
            timestamp: now_millis(),
        }
    }
}

// Custom deserializer for fields that can be string or number
fn deserialize_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct StringOrNumber;

    impl<'de> Visitor<'de> for StringOrNumber {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or a number")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(v.to_string())
        }

        fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(v)
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(v.to_string())
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(v.to_string())
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(v.to_string())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(StringOrNumber)
}

// Custom deserializer for f64 that can handle string representation
fn deserialize_f64_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct F64OrString;

    impl<'de> Visitor<'de> for F64OrString {
        type Value = f64;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a number or a string representing a number")
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(v)
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(v as f64)
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(v as f64)
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            v.parse().map_err(de::Error::custom)
        }

        fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            v.parse().map_err(de::Error::custom)
        }
    }

    deserializer.deserialize_any(F64OrString)
}
