//! Error types for the trading bot library

use thiserror::Error;

/// Errors surfaced by the exchange client, indicator sources, credential
/// stores and reporting glue
#[derive(Debug, Error)]
pub enum BotError {
    /// The exchange answered with the embedded `401` marker
    #[error("Unauthorized user credentials")]
    Unauthorized,

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Credentials not found for {0}")]
    CredentialNotFound(String),

    #[error("User {0} already present")]
    CredentialExists(String),

    #[error("Either username or first_name and last_name must be provided")]
    InvalidIdentity,

    #[error("Signed request attempted without API credentials")]
    MissingCredentials,

    #[error("No indicator data for {0}")]
    IndicatorUnavailable(String),

    #[error("Indicator {0} missing from snapshot")]
    MissingIndicator(String),

    #[error("Ticker not found for {0}")]
    TickerNotFound(String),

    #[error("Market not found: {0}")]
    MarketNotFound(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Email error: {0}")]
    Email(String),
}

pub type Result<T> = std::result::Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            BotError::Unauthorized.to_string(),
            "Unauthorized user credentials"
        );
        assert_eq!(
            BotError::CredentialNotFound("vishal".into()).to_string(),
            "Credentials not found for vishal"
        );
        let api = BotError::Api {
            status: 500,
            body: "oops".into(),
        };
        assert_eq!(api.to_string(), "API error (500): oops");
    }

    #[test]
    fn test_from_io_error() {
        let err: BotError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, BotError::Io(_)));
    }
}
