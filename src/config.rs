//! Configuration management
//!
//! Handles loading and parsing of the YAML configuration file with
//! environment variable overrides for secrets. Every section has defaults
//! so a partial file (or no file at all) still yields a usable config.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{BotError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub owner: OwnerConfig,
    pub exchange: ExchangeConfig,
    pub indicators: IndicatorConfig,
    pub bot: BotConfig,
    pub credentials: CredentialsConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailConfig>,
    pub paths: PathsConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file and apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            BotError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_yaml(&contents)?;
        config.apply_env();
        Ok(config)
    }

    /// Parse configuration from YAML text, without environment overrides
    pub fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: AppConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load secrets from environment variables when set
    pub fn apply_env(&mut self) {
        if let Ok(api_key) = std::env::var("COINDCX_API_KEY") {
            self.exchange.api_key = Some(api_key);
        }
        if let Ok(api_secret) = std::env::var("COINDCX_API_SECRET") {
            self.exchange.api_secret = Some(api_secret);
        }
        if let Ok(key) = std::env::var("CREDENTIALS_ENCRYPTION_KEY") {
            self.credentials.encryption_key = Some(key);
        }
        if let Some(email) = self.email.as_mut() {
            if let Ok(username) = std::env::var("SMTP_USERNAME") {
                email.username = username;
            }
            if let Ok(password) = std::env::var("SMTP_PASSWORD") {
                email.password = password;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let bot = &self.bot;
        if !(0.0..=1.0).contains(&bot.order_fraction) {
            return Err(BotError::Config(format!(
                "bot.order_fraction must be within [0, 1], got {}",
                bot.order_fraction
            )));
        }
        if bot.rsi_buy_below >= bot.rsi_sell_above {
            return Err(BotError::Config(format!(
                "bot.rsi_buy_below ({}) must be below bot.rsi_sell_above ({})",
                bot.rsi_buy_below, bot.rsi_sell_above
            )));
        }
        Ok(())
    }
}

/// Account owner, used as the default trading account and mail recipient
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnerConfig {
    pub username: String,
    pub email: String,
}

/// Exchange configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub api_base_url: String,
    pub public_base_url: String,
    pub timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_secret: Option<String>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        ExchangeConfig {
            api_base_url: "https://api.coindcx.com".to_string(),
            public_base_url: "https://public.coindcx.com".to_string(),
            timeout_secs: 60,
            api_key: None,
            api_secret: None,
        }
    }
}

impl ExchangeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which indicator source feeds the trading loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorProvider {
    #[default]
    TradingView,
    Candles,
}

/// Indicator provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub provider: IndicatorProvider,
    pub scanner_url: String,
    pub timeout_secs: u64,
    /// Number of candles fetched when indicators are computed locally
    pub candle_limit: u32,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        IndicatorConfig {
            provider: IndicatorProvider::TradingView,
            scanner_url: "https://scanner.tradingview.com".to_string(),
            timeout_secs: 60,
            candle_limit: 300,
        }
    }
}

/// Trading loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub coin_1: String,
    pub coin_2: String,
    /// Exchange name as known to the indicator provider (e.g. "Binance")
    pub market: String,
    pub screener: String,
    pub interval: String,
    pub rsi_buy_below: f64,
    pub rsi_sell_above: f64,
    pub max_trades: u32,
    pub retry_delay_secs: u64,
    pub poll_interval_secs: u64,
    pub order_fraction: f64,
    pub min_order_value: f64,
}

impl Default for BotConfig {
    fn default() -> Self {
        BotConfig {
            coin_1: "BTC".to_string(),
            coin_2: "USDT".to_string(),
            market: "Binance".to_string(),
            screener: "Crypto".to_string(),
            interval: "4h".to_string(),
            rsi_buy_below: 37.0,
            rsi_sell_above: 60.0,
            max_trades: 100,
            retry_delay_secs: 60,
            poll_interval_secs: 60,
            order_fraction: 0.33,
            min_order_value: 0.0001,
        }
    }
}

impl BotConfig {
    /// Exchange market symbol, e.g. "BTCUSDT"
    pub fn symbol(&self) -> String {
        format!("{}{}", self.coin_1, self.coin_2)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Credential backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    Yaml,
    Sqlite,
    /// SQL table first, YAML file as fallback
    #[default]
    Chained,
}

impl std::str::FromStr for CredentialBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yaml" => Ok(Self::Yaml),
            "sqlite" | "sql" => Ok(Self::Sqlite),
            "chained" => Ok(Self::Chained),
            other => Err(format!("Unknown credential backend: {}", other)),
        }
    }
}

/// Credential store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub backend: CredentialBackend,
    pub yaml_path: PathBuf,
    pub sqlite_path: PathBuf,
    /// Base64 AES-256 key used to encrypt secrets in the SQL table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        CredentialsConfig {
            backend: CredentialBackend::Chained,
            yaml_path: PathBuf::from("credentials.yaml"),
            sqlite_path: PathBuf::from("credentials.db"),
            encryption_key: None,
        }
    }
}

/// SMTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    /// Sender address, defaults to the SMTP username when empty
    pub sender: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        EmailConfig {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            username: String::new(),
            password: String::new(),
            sender: String::new(),
        }
    }
}

/// Output file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub order_history_file: PathBuf,
    pub market_data_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            order_history_file: PathBuf::from("order_history.csv"),
            market_data_dir: PathBuf::from("market_data"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.bot.max_trades, 100);
        assert_eq!(config.bot.rsi_buy_below, 37.0);
        assert_eq!(config.bot.rsi_sell_above, 60.0);
        assert_eq!(config.bot.symbol(), "BTCUSDT");
        assert_eq!(config.exchange.timeout(), Duration::from_secs(60));
        assert_eq!(config.credentials.backend, CredentialBackend::Chained);
        assert!(config.email.is_none());
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
owner:
  username: vishalnadig
bot:
  coin_1: XRP
  interval: 1h
indicators:
  provider: candles
email:
  username: bot@example.com
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.owner.username, "vishalnadig");
        assert_eq!(config.bot.symbol(), "XRPUSDT");
        assert_eq!(config.bot.interval, "1h");
        assert_eq!(config.bot.max_trades, 100);
        assert_eq!(config.indicators.provider, IndicatorProvider::Candles);
        let email = config.email.unwrap();
        assert_eq!(email.smtp_host, "smtp.gmail.com");
        assert_eq!(email.smtp_port, 587);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = AppConfig::from_yaml("").unwrap();
        assert_eq!(config.bot.coin_2, "USDT");
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let yaml = "bot:\n  rsi_buy_below: 70\n  rsi_sell_above: 60\n";
        assert!(matches!(
            AppConfig::from_yaml(yaml),
            Err(BotError::Config(_))
        ));
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("yaml".parse::<CredentialBackend>(), Ok(CredentialBackend::Yaml));
        assert_eq!("SQL".parse::<CredentialBackend>(), Ok(CredentialBackend::Sqlite));
        assert!("redis".parse::<CredentialBackend>().is_err());
    }
}
