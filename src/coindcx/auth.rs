//! Authentication utilities for CoinDCX API
//!
//! Implements HMAC-SHA256 signature generation as per
//! the official CoinDCX API documentation: the signature is the hex digest
//! of the compact JSON body, keyed by the API secret.

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::error::Result;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_API_KEY: &str = "X-AUTH-APIKEY";
pub const HEADER_SIGNATURE: &str = "X-AUTH-SIGNATURE";

/// Current time in epoch milliseconds, the unit CoinDCX expects in `timestamp`
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate HMAC-SHA256 signature for API authentication
///
/// # Example
///
/// ```
/// use crypto_trading_bot::coindcx::auth::sign_request;
///
/// let signature = sign_request(r#"{"timestamp":1234567890}"#, "your-api-secret");
/// assert_eq!(signature.len(), 64);
/// ```
pub fn sign_request(body: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a signature against the expected value
pub fn verify_signature(body: &str, secret: &str, signature: &str) -> bool {
    let computed = sign_request(body, secret);
    constant_time_eq(computed.as_bytes(), signature.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// API credentials container
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .finish()
    }
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Create credentials from environment variables
    ///
    /// Looks for `COINDCX_API_KEY` and `COINDCX_API_SECRET`
    pub fn from_env() -> std::result::Result<Self, std::env::VarError> {
        let api_key = std::env::var("COINDCX_API_KEY")?;
        let api_secret = std::env::var("COINDCX_API_SECRET")?;
        Ok(Self::new(api_key, api_secret))
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }

    /// Sign a request body
    pub fn sign(&self, body: &str) -> String {
        sign_request(body, &self.api_secret)
    }
}

/// A serialised, signed request body ready to be POSTed
#[derive(Debug, Clone)]
pub struct SignedRequest {
    body: String,
    api_key: String,
    signature: String,
}

impl SignedRequest {
    /// Serialise `body` compactly and sign it with `credentials`
    ///
    /// The serialised form is exactly what gets sent, so the exchange
    /// recomputes the same digest.
    pub fn new<T: Serialize + ?Sized>(body: &T, credentials: &Credentials) -> Result<Self> {
        let body = serde_json::to_string(body)?;
        let signature = credentials.sign(&body);
        Ok(Self {
            body,
            api_key: credentials.api_key().to_string(),
            signature,
        })
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Headers required by the exchange for authenticated endpoints
    pub fn headers(&self) -> [(&'static str, &str); 3] {
        [
            ("Content-Type", "application/json"),
            (HEADER_API_KEY, &self.api_key),
            (HEADER_SIGNATURE, &self.signature),
        ]
    }

    pub fn into_body(self) -> String {
        self.body
    }
}
