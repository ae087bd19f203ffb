//! Symmetric encryption for secrets stored in the SQL table
//!
//! AES-256-GCM with a random 96-bit nonce per value. Stored form is
//! base64(nonce || ciphertext), so one column holds everything needed to
//! decrypt.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::STANDARD as b64;
use base64::Engine;

use crate::error::{BotError, Result};

const NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct SecretCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretCipher(***)")
    }
}

impl SecretCipher {
    /// Fresh random key, base64 encoded
    pub fn generate_key() -> String {
        b64.encode(Aes256Gcm::generate_key(OsRng))
    }

    /// Build a cipher from a base64 key of 32 bytes
    pub fn from_base64(key: &str) -> Result<Self> {
        let raw = b64
            .decode(key.trim())
            .map_err(|e| BotError::Crypto(format!("Invalid key encoding: {}", e)))?;
        let cipher = Aes256Gcm::new_from_slice(&raw).map_err(|_| {
            BotError::Crypto(format!("Key must be 32 bytes, got {}", raw.len()))
        })?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| BotError::Crypto("Encryption failed".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(b64.encode(out))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let raw = b64
            .decode(encoded)
            .map_err(|e| BotError::Crypto(format!("Invalid ciphertext encoding: {}", e)))?;
        if raw.len() < NONCE_LEN {
            return Err(BotError::Crypto("Ciphertext too short".to_string()));
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| BotError::Crypto("Decryption failed: wrong key or tampered data".to_string()))?;
        String::from_utf8(plaintext).map_err(|e| BotError::Crypto(e.to_string()))
    }
}
