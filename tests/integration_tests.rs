//! Integration tests for the CoinDCX trading bot
//!
//! The exchange and the indicator scanner are replaced by one mockito
//! server; file-backed stores live in temporary directories.

use mockito::{Matcher, Server};
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::tempdir;

use crypto_trading_bot::coindcx::auth::{HEADER_API_KEY, HEADER_SIGNATURE};
use crypto_trading_bot::coindcx::{ClientConfig, CoinDCXClient, Credentials, OrderSide};
use crypto_trading_bot::config::{AppConfig, BotConfig, CredentialBackend, CredentialsConfig};
use crypto_trading_bot::credentials::{open_store, CredentialRecord, CredentialStore, SecretCipher};
use crypto_trading_bot::indicator::{IndicatorQuery, IndicatorSource, TradingViewClient, SNAPSHOT_FIELDS};
use crypto_trading_bot::notify::LogNotifier;
use crypto_trading_bot::report::OrderHistory;
use crypto_trading_bot::{Action, BotError, TradingBot};

// =============================================================================
// Test Utilities
// =============================================================================

fn signed_client(server: &Server) -> CoinDCXClient {
    CoinDCXClient::with_config(
        Some(Credentials::new("test_key", "test_secret")),
        ClientConfig::default()
            .with_base_url(server.url())
            .with_timeout(Duration::from_secs(5)),
    )
    .unwrap()
}

fn tickers_body(market: &str, price: &str) -> String {
    json!([
        {"market": "ETHUSDT", "last_price": "2300.5", "bid": "2300", "ask": "2301", "volume": "120", "timestamp": 1_700_000_000i64},
        {"market": market, "last_price": price, "bid": price, "ask": price, "volume": "10", "timestamp": 1_700_000_000i64}
    ])
    .to_string()
}

/// Scanner row with the given RSI and close, pivots 80/85/90/100/110/115/120
fn scanner_body(rsi: f64, close: f64) -> String {
    let values: Vec<Value> = SNAPSHOT_FIELDS
        .iter()
        .map(|field| match *field {
            "RSI" => json!(rsi),
            "Pivot.M.Fibonacci.S3" => json!(80.0),
            "Pivot.M.Fibonacci.S2" => json!(85.0),
            "Pivot.M.Fibonacci.S1" => json!(90.0),
            "Pivot.M.Fibonacci.Middle" => json!(100.0),
            "Pivot.M.Fibonacci.R1" => json!(110.0),
            "Pivot.M.Fibonacci.R2" => json!(115.0),
            "Pivot.M.Fibonacci.R3" => json!(120.0),
            "close" => json!(close),
            _ => json!(1.0),
        })
        .collect();
    json!({"totalCount": 1, "data": [{"s": "BINANCE:BTCUSDT", "d": values}]}).to_string()
}

fn bot_config() -> BotConfig {
    BotConfig {
        retry_delay_secs: 0,
        poll_interval_secs: 0,
        ..BotConfig::default()
    }
}

// =============================================================================
// Exchange Client Tests
// =============================================================================

#[tokio::test]
async fn test_signed_request_headers_and_balance() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/exchange/v1/users/balances")
        .match_header(HEADER_API_KEY, "test_key")
        .match_header(HEADER_SIGNATURE, Matcher::Regex("^[0-9a-f]{64}$".to_string()))
        .match_header("content-type", "application/json")
        .match_body(Matcher::Regex(r#"^\{"timestamp":\d+\}$"#.to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"currency":"USDT","balance":"250.5","locked_balance":"0"},{"currency":"BTC","balance":0.01,"locked_balance":0}]"#)
        .create_async()
        .await;

    let client = signed_client(&server);
    assert_eq!(client.get_balance("USDT").await.unwrap(), 250.5);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_missing_currency_balance_is_zero() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/exchange/v1/users/balances")
        .with_status(200)
        .with_body(r#"[{"currency":"BTC","balance":"0.01","locked_balance":"0"}]"#)
        .create_async()
        .await;

    let client = signed_client(&server);
    assert_eq!(client.get_balance("DOGE").await.unwrap(), 0.0);
}

#[tokio::test]
async fn test_unauthorized_marker_in_success_body() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/exchange/v1/users/info")
        .with_status(200)
        .with_body(r#"{"code":401,"message":"Invalid credentials","status":"error"}"#)
        .create_async()
        .await;

    let client = signed_client(&server);
    let err = client.get_user_info().await.unwrap_err();
    assert!(matches!(err, BotError::Unauthorized));
}

#[tokio::test]
async fn test_non_json_error_status() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/exchange/v1/orders/cancel")
        .with_status(502)
        .with_body("Bad Gateway")
        .create_async()
        .await;

    let client = signed_client(&server);
    match client.cancel_order("abc").await {
        Err(BotError::Api { status, body }) => {
            assert_eq!(status, 502);
            assert_eq!(body, "Bad Gateway");
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ticker_lookup() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/exchange/ticker")
        .with_status(200)
        .with_body(tickers_body("BTCUSDT", "43000.1"))
        .expect(2)
        .create_async()
        .await;

    let client = CoinDCXClient::public(ClientConfig::default().with_base_url(server.url())).unwrap();
    let ticker = client.get_ticker("BTCUSDT").await.unwrap();
    assert_eq!(ticker.last_price_f64(), Some(43000.1));

    let err = client.get_ticker("NOPEUSDT").await.unwrap_err();
    assert!(matches!(err, BotError::TickerNotFound(m) if m == "NOPEUSDT"));
}

#[tokio::test]
async fn test_candles_for_symbol_resolves_pair() {
    let mut server = Server::new_async().await;
    let _details = server
        .mock("GET", "/exchange/v1/markets_details")
        .with_status(200)
        .with_body(r#"[{"symbol":"BTCUSDT","pair":"B-BTC_USDT","status":"active"}]"#)
        .create_async()
        .await;
    let candles = server
        .mock("GET", "/market_data/candles")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("pair".into(), "B-BTC_USDT".into()),
            Matcher::UrlEncoded("interval".into(), "4h".into()),
            Matcher::UrlEncoded("limit".into(), "2".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"[{"open":1,"high":2,"low":0.5,"close":1.5,"volume":10,"time":1700000000000},
                {"open":1.5,"high":2.5,"low":1,"close":2,"volume":12,"time":1700014400000}]"#,
        )
        .create_async()
        .await;

    let client = CoinDCXClient::public(ClientConfig::default().with_base_url(server.url())).unwrap();
    let details = client
        .get_markets_details_for_symbols(&["BTCUSDT".to_string(), "ETHUSDT".to_string()])
        .await
        .unwrap();
    assert_eq!(details.len(), 1);

    let result = client.get_candles_for_symbol("BTCUSDT", "4h", 2).await.unwrap();

    candles.assert_async().await;
    assert_eq!(result.len(), 2);
    assert_eq!(result[1].close, 2.0);
}

#[tokio::test]
async fn test_public_client_cannot_sign() {
    let client = CoinDCXClient::public(ClientConfig::default().with_base_url("http://127.0.0.1:1")).unwrap();
    let err = client.get_balances().await.unwrap_err();
    assert!(matches!(err, BotError::MissingCredentials));
}

#[tokio::test]
async fn test_order_placement_appends_history() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/exchange/v1/orders/create")
        .match_body(Matcher::PartialJson(json!({
            "side": "buy",
            "order_type": "limit_order",
            "market": "BTCUSDT",
            "price_per_unit": 40000.0,
            "total_quantity": 0.001
        })))
        .with_status(200)
        .with_body(r#"{"orders":[{"id":"ord-1","status":"open","market":"BTCUSDT","side":"buy"}]}"#)
        .expect(2)
        .create_async()
        .await;

    let dir = tempdir().unwrap();
    let history = OrderHistory::new(dir.path().join("orders.csv"));
    let client = signed_client(&server).with_order_history(history.clone());

    let response = client.place_buy_limit_order("BTCUSDT", 40000.0, 0.001).await.unwrap();
    assert_eq!(response.orders[0].id, "ord-1");
    client.place_buy_limit_order("BTCUSDT", 40000.0, 0.001).await.unwrap();

    mock.assert_async().await;
    let rows = history.load().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].side, "buy");
    assert_eq!(rows[0].price, Some(40000.0));
}

// =============================================================================
// Indicator Tests
// =============================================================================

#[tokio::test]
async fn test_scanner_error_status() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/crypto/scan")
        .with_status(500)
        .with_body("oops")
        .create_async()
        .await;

    let scanner = TradingViewClient::with_scanner_url(&server.url(), Duration::from_secs(5)).unwrap();
    let query = IndicatorQuery::from_config(&BotConfig::default()).unwrap();
    let err = scanner.snapshot(&query).await.unwrap_err();
    assert!(matches!(err, BotError::Api { status: 500, .. }));
}

// =============================================================================
// Trading Loop Tests
// =============================================================================

#[tokio::test]
async fn test_cycle_buys_in_support_band() {
    let mut server = Server::new_async().await;
    let _scan = server
        .mock("POST", "/crypto/scan")
        .with_status(200)
        .with_body(scanner_body(25.0, 100.0))
        .create_async()
        .await;
    let _tickers = server
        .mock("GET", "/exchange/ticker")
        .with_status(200)
        .with_body(tickers_body("BTCUSDT", "95"))
        .create_async()
        .await;
    let _balances = server
        .mock("POST", "/exchange/v1/users/balances")
        .with_status(200)
        .with_body(r#"[{"currency":"USDT","balance":"1000","locked_balance":"0"}]"#)
        .create_async()
        .await;
    let order = server
        .mock("POST", "/exchange/v1/orders/create")
        .match_body(Matcher::PartialJson(json!({
            "side": "buy",
            "market": "BTCUSDT",
            "price_per_unit": 90.0
        })))
        .with_status(200)
        .with_body(r#"{"orders":[{"id":"ord-7","status":"open"}]}"#)
        .expect(1)
        .create_async()
        .await;

    let dir = tempdir().unwrap();
    let history = OrderHistory::new(dir.path().join("orders.csv"));
    let exchange = signed_client(&server).with_order_history(history.clone());
    let scanner = TradingViewClient::with_scanner_url(&server.url(), Duration::from_secs(5)).unwrap();

    let mut bot = TradingBot::new(exchange, scanner, LogNotifier, bot_config()).unwrap();
    let levels = bot.initialise().await.unwrap();
    assert_eq!(levels.buy, 100.0);
    assert_eq!(levels.sell, 110.0);

    // 95 sits between S1 and the pivot, below the close
    assert_eq!(bot.run_cycle().await, Some(vec![Action::Buy]));
    let state = bot.state();
    assert!(state.open_position);
    assert_eq!(state.entry_price, 90.0);
    assert_eq!(state.levels.unwrap().sell, 100.0);
    assert!((state.position_quantity - 330.0 / 90.0).abs() < 1e-9);

    // Already holding: no second buy
    assert_eq!(bot.run_cycle().await, Some(vec![]));

    order.assert_async().await;
    assert_eq!(history.load().unwrap().len(), 1);
}

#[tokio::test]
async fn test_cycle_skips_when_exchange_rejects_keys() {
    let mut server = Server::new_async().await;
    let _scan = server
        .mock("POST", "/crypto/scan")
        .with_status(200)
        .with_body(scanner_body(25.0, 100.0))
        .create_async()
        .await;
    let _tickers = server
        .mock("GET", "/exchange/ticker")
        .with_status(200)
        .with_body(tickers_body("BTCUSDT", "95"))
        .create_async()
        .await;
    let balances = server
        .mock("POST", "/exchange/v1/users/balances")
        .with_status(200)
        .with_body(r#"{"code":401,"message":"Unauthorized"}"#)
        .expect(2)
        .create_async()
        .await;

    let exchange = signed_client(&server);
    let scanner = TradingViewClient::with_scanner_url(&server.url(), Duration::from_secs(5)).unwrap();
    let mut bot = TradingBot::new(exchange, scanner, LogNotifier, bot_config()).unwrap();
    bot.initialise().await.unwrap();

    assert_eq!(bot.run_cycle().await, None);
    assert!(!bot.state().open_position);
    balances.assert_async().await;
}

// =============================================================================
// Credential Store Tests
// =============================================================================

fn record(username: &str) -> CredentialRecord {
    CredentialRecord {
        username: username.to_string(),
        email: "ada@example.com".to_string(),
        api_key: "api-key-1".to_string(),
        secret_key: "secret-1".to_string(),
        google_auth_key: "otp-seed".to_string(),
        ..CredentialRecord::default()
    }
}

#[test]
fn test_chained_store_lifecycle() {
    let dir = tempdir().unwrap();
    let config = CredentialsConfig {
        backend: CredentialBackend::Chained,
        yaml_path: dir.path().join("credentials.yaml"),
        sqlite_path: dir.path().join("credentials.db"),
        encryption_key: Some(SecretCipher::generate_key()),
    };

    let mut store = open_store(&config).unwrap();
    store.add(&record("Ada Lovelace")).unwrap();
    assert!(matches!(
        store.add(&record("adalovelace")),
        Err(BotError::CredentialExists(_))
    ));

    let found = store.get("ADA lovelace").unwrap();
    assert_eq!(found.api_key, "api-key-1");
    assert_eq!(found.credentials().api_key(), "api-key-1");

    store
        .update(&CredentialRecord {
            username: "adalovelace".to_string(),
            secret_key: "secret-2".to_string(),
            ..CredentialRecord::default()
        })
        .unwrap();
    let updated = store.get("adalovelace").unwrap();
    assert_eq!(updated.secret_key, "secret-2");
    assert_eq!(updated.email, "ada@example.com");

    // Secrets never reach the SQL file in clear text
    let conn = rusqlite::Connection::open(&config.sqlite_path).unwrap();
    let stored: String = conn
        .query_row("SELECT secret_key FROM users WHERE username = 'adalovelace'", [], |row| row.get(0))
        .unwrap();
    assert_ne!(stored, "secret-2");

    // The YAML file holds the same account
    let yaml = std::fs::read_to_string(&config.yaml_path).unwrap();
    assert!(yaml.contains("adalovelace"));

    store.delete("adalovelace").unwrap();
    assert!(matches!(
        store.get("adalovelace"),
        Err(BotError::CredentialNotFound(_))
    ));
}

#[test]
fn test_chained_store_without_key_uses_yaml() {
    let dir = tempdir().unwrap();
    let config = CredentialsConfig {
        backend: CredentialBackend::Chained,
        yaml_path: dir.path().join("credentials.yaml"),
        sqlite_path: dir.path().join("credentials.db"),
        encryption_key: None,
    };

    let mut store = open_store(&config).unwrap();
    store.add(&record("grace")).unwrap();
    assert_eq!(store.get("Grace").unwrap().secret_key, "secret-1");
    assert!(!config.sqlite_path.exists());
}

// =============================================================================
// Configuration Tests
// =============================================================================

#[test]
fn test_partial_config_keeps_defaults() {
    let config = AppConfig::from_yaml(
        r#"
owner:
  username: ada
bot:
  coin_1: ETH
  interval: 1h
credentials:
  backend: yaml
"#,
    )
    .unwrap();

    assert_eq!(config.owner.username, "ada");
    assert_eq!(config.bot.symbol(), "ETHUSDT");
    assert_eq!(config.bot.max_trades, 100);
    assert_eq!(config.credentials.backend, CredentialBackend::Yaml);
    assert!(config.email.is_none());
    assert_eq!(
        IndicatorQuery::from_config(&config.bot).unwrap().ticker(),
        "BINANCE:ETHUSDT"
    );
}

#[test]
fn test_invalid_rsi_thresholds_rejected() {
    let err = AppConfig::from_yaml("bot:\n  rsi_buy_below: 70\n  rsi_sell_above: 30\n").unwrap_err();
    assert!(matches!(err, BotError::Config(_)));
}

#[test]
fn test_order_side_parses_from_cli_text() {
    assert_eq!("BUY".parse::<OrderSide>().unwrap(), OrderSide::Buy);
    assert!("hold".parse::<OrderSide>().is_err());
}
