//! Command implementations and the wiring they share

pub mod account;
pub mod credentials;
pub mod market;
pub mod trade;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use crypto_trading_bot::coindcx::{ClientConfig, CoinDCXClient, Credentials};
use crypto_trading_bot::config::{AppConfig, IndicatorProvider};
use crypto_trading_bot::credentials::{open_store, CredentialStore};
use crypto_trading_bot::indicator::{CandleIndicatorSource, IndicatorSource, TradingViewClient};
use crypto_trading_bot::notify::{LogNotifier, Notifier, SmtpNotifier};
use crypto_trading_bot::report::OrderHistory;

/// Load `path`, or fall back to defaults plus environment when it is absent
pub fn load_config(path: &str) -> Result<AppConfig> {
    if Path::new(path).exists() {
        AppConfig::from_file(path).with_context(|| format!("Failed to load config from {}", path))
    } else {
        let mut config = AppConfig::default();
        config.apply_env();
        Ok(config)
    }
}

/// Single-threaded runtime for one command
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")
}

/// Resolve API credentials for `account`
///
/// Keys from the environment or the `exchange` section win when no account
/// is named; otherwise the credential store is asked for the account, or
/// for `owner.username`.
pub fn resolve_credentials(config: &AppConfig, account: Option<&str>) -> Result<Credentials> {
    if account.is_none() {
        if let (Some(key), Some(secret)) = (&config.exchange.api_key, &config.exchange.api_secret)
        {
            return Ok(Credentials::new(key, secret));
        }
    }

    let identity = account.unwrap_or(&config.owner.username);
    if identity.trim().is_empty() {
        anyhow::bail!(
            "No API keys configured: set COINDCX_API_KEY/COINDCX_API_SECRET, owner.username or --account"
        );
    }

    let store = open_store(&config.credentials).context("Failed to open credential store")?;
    let record = store
        .get(identity)
        .with_context(|| format!("No stored credentials for {}", identity))?;
    info!("Using stored credentials of {}", identity);
    Ok(record.credentials())
}

/// Authenticated client that records every order to the history file
pub fn exchange_client(config: &AppConfig, account: Option<&str>) -> Result<CoinDCXClient> {
    let credentials = resolve_credentials(config, account)?;
    let client = CoinDCXClient::with_config(Some(credentials), ClientConfig::from(&config.exchange))?
        .with_order_history(OrderHistory::new(&config.paths.order_history_file));
    Ok(client)
}

/// Client for public endpoints only
pub fn public_client(config: &AppConfig) -> Result<CoinDCXClient> {
    Ok(CoinDCXClient::public(ClientConfig::from(&config.exchange))?)
}

/// Indicator source selected by `indicators.provider`
pub fn indicator_source(config: &AppConfig) -> Result<Box<dyn IndicatorSource>> {
    let source: Box<dyn IndicatorSource> = match config.indicators.provider {
        IndicatorProvider::TradingView => Box::new(TradingViewClient::new(&config.indicators)?),
        IndicatorProvider::Candles => Box::new(CandleIndicatorSource::new(
            public_client(config)?,
            config.indicators.candle_limit,
        )),
    };
    Ok(source)
}

/// SMTP notifier to the owner when mail is configured, log-only otherwise
pub fn notifier(config: &AppConfig) -> Box<dyn Notifier> {
    match &config.email {
        Some(email) if !config.owner.email.is_empty() => {
            match SmtpNotifier::new(email, &config.owner.email) {
                Ok(smtp) => return Box::new(smtp),
                Err(e) => warn!("Email disabled: {}", e),
            }
        }
        Some(_) => warn!("Email disabled: owner.email is not set"),
        None => {}
    }
    Box::new(LogNotifier)
}
