//! Per-user exchange credentials
//!
//! Records are keyed by a normalised identity: the username, or first and
//! last name joined, lowercased with spaces removed. Two backends exist, a
//! plaintext YAML file and a SQLite table with encrypted secrets, plus a
//! chained store that reads SQL first and falls back to YAML.

pub mod cipher;
pub mod sqlite;
pub mod yaml;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::coindcx::Credentials;
use crate::config::{CredentialBackend, CredentialsConfig};
use crate::error::{BotError, Result};

pub use cipher::SecretCipher;
pub use sqlite::SqliteCredentialStore;
pub use yaml::YamlCredentialStore;

/// Normalise an identity into a store key
///
/// A non-empty `username` wins; otherwise both names are required.
pub fn normalise_identity(username: &str, first_name: &str, last_name: &str) -> Result<String> {
    let raw = if !username.trim().is_empty() {
        username.to_string()
    } else if !first_name.trim().is_empty() && !last_name.trim().is_empty() {
        format!("{}{}", first_name, last_name)
    } else {
        return Err(BotError::InvalidIdentity);
    };
    Ok(raw.to_lowercase().split_whitespace().collect())
}

/// Credentials and contact details of one account
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialRecord {
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub first_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub last_name: String,
    pub email: String,
    pub api_key: String,
    pub secret_key: String,
    pub google_auth_key: String,
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("username", &self.username)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("api_key", &self.api_key)
            .field("secret_key", &"***")
            .field("google_auth_key", &"***")
            .finish()
    }
}

impl CredentialRecord {
    /// Store key of this record
    pub fn key(&self) -> Result<String> {
        normalise_identity(&self.username, &self.first_name, &self.last_name)
    }

    /// API credentials for signing exchange requests
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.api_key, &self.secret_key)
    }

    /// Overwrite fields that are non-empty in `update`
    pub fn merge(&mut self, update: &CredentialRecord) {
        let fields = [
            (&mut self.first_name, &update.first_name),
            (&mut self.last_name, &update.last_name),
            (&mut self.email, &update.email),
            (&mut self.api_key, &update.api_key),
            (&mut self.secret_key, &update.secret_key),
            (&mut self.google_auth_key, &update.google_auth_key),
        ];
        for (current, new) in fields {
            if !new.is_empty() {
                current.clone_from(new);
            }
        }
    }
}

/// Storage for credential records
///
/// `add` fails with [`BotError::CredentialExists`] for a known identity;
/// `get`, `update` and `delete` fail with [`BotError::CredentialNotFound`]
/// for an unknown one.
pub trait CredentialStore: Send {
    fn get(&self, identity: &str) -> Result<CredentialRecord>;

    fn add(&mut self, record: &CredentialRecord) -> Result<()>;

    /// Merge the non-empty fields of `record` into the stored one
    fn update(&mut self, record: &CredentialRecord) -> Result<()>;

    fn delete(&mut self, identity: &str) -> Result<()>;
}

impl<T: CredentialStore + ?Sized> CredentialStore for Box<T> {
    fn get(&self, identity: &str) -> Result<CredentialRecord> {
        (**self).get(identity)
    }

    fn add(&mut self, record: &CredentialRecord) -> Result<()> {
        (**self).add(record)
    }

    fn update(&mut self, record: &CredentialRecord) -> Result<()> {
        (**self).update(record)
    }

    fn delete(&mut self, identity: &str) -> Result<()> {
        (**self).delete(identity)
    }
}

/// SQL first, YAML as fallback
///
/// Reads try the primary store and fall back on any failure. Writes go to
/// both and succeed when at least one backend accepted them.
pub struct ChainedStore<P, F> {
    primary: P,
    fallback: F,
}

impl<P: CredentialStore, F: CredentialStore> ChainedStore<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }

    fn both(first: Result<()>, second: Result<()>) -> Result<()> {
        match (first, second) {
            (Ok(()), _) | (_, Ok(())) => Ok(()),
            (Err(e), Err(_)) => Err(e),
        }
    }
}

impl<P: CredentialStore, F: CredentialStore> CredentialStore for ChainedStore<P, F> {
    fn get(&self, identity: &str) -> Result<CredentialRecord> {
        match self.primary.get(identity) {
            Ok(record) => Ok(record),
            Err(e) => {
                debug!("Primary credential lookup failed ({}), trying fallback", e);
                self.fallback.get(identity)
            }
        }
    }

    fn add(&mut self, record: &CredentialRecord) -> Result<()> {
        let first = self.primary.add(record);
        let second = self.fallback.add(record);
        if let (Err(a), Err(b)) = (&first, &second) {
            warn!("Credential add failed in both stores: {}; {}", a, b);
        }
        Self::both(first, second)
    }

    fn update(&mut self, record: &CredentialRecord) -> Result<()> {
        let first = self.primary.update(record);
        let second = self.fallback.update(record);
        Self::both(first, second)
    }

    fn delete(&mut self, identity: &str) -> Result<()> {
        let first = self.primary.delete(identity);
        let second = self.fallback.delete(identity);
        Self::both(first, second)
    }
}

/// Open the configured credential backend
pub fn open_store(config: &CredentialsConfig) -> Result<Box<dyn CredentialStore>> {
    let sqlite = || -> Result<SqliteCredentialStore> {
        let key = config
            .encryption_key
            .as_deref()
            .ok_or_else(|| BotError::Config("credentials.encryption_key is not set".to_string()))?;
        SqliteCredentialStore::open(&config.sqlite_path, SecretCipher::from_base64(key)?)
    };

    let store: Box<dyn CredentialStore> = match config.backend {
        CredentialBackend::Yaml => Box::new(YamlCredentialStore::open(&config.yaml_path)?),
        CredentialBackend::Sqlite => Box::new(sqlite()?),
        CredentialBackend::Chained => {
            let yaml = YamlCredentialStore::open(&config.yaml_path)?;
            match sqlite() {
                Ok(sql) => Box::new(ChainedStore::new(sql, yaml)),
                Err(e) => {
                    warn!("SQL credential store unavailable ({}), using YAML only", e);
                    Box::new(yaml)
                }
            }
        }
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore {
        records: HashMap<String, CredentialRecord>,
    }

    impl CredentialStore for MemoryStore {
        fn get(&self, identity: &str) -> Result<CredentialRecord> {
            self.records
                .get(identity)
                .cloned()
                .ok_or_else(|| BotError::CredentialNotFound(identity.to_string()))
        }

        fn add(&mut self, record: &CredentialRecord) -> Result<()> {
            let key = record.key()?;
            if self.records.contains_key(&key) {
                return Err(BotError::CredentialExists(key));
            }
            self.records.insert(key, record.clone());
            Ok(())
        }

        fn update(&mut self, record: &CredentialRecord) -> Result<()> {
            let key = record.key()?;
            let current = self
                .records
                .get_mut(&key)
                .ok_or_else(|| BotError::CredentialNotFound(key.clone()))?;
            current.merge(record);
            Ok(())
        }

        fn delete(&mut self, identity: &str) -> Result<()> {
            self.records
                .remove(identity)
                .map(|_| ())
                .ok_or_else(|| BotError::CredentialNotFound(identity.to_string()))
        }
    }

    fn record(username: &str, api_key: &str) -> CredentialRecord {
        CredentialRecord {
            username: username.to_string(),
            api_key: api_key.to_string(),
            secret_key: "secret".to_string(),
            ..CredentialRecord::default()
        }
    }

    #[test]
    fn test_normalise_identity() {
        assert_eq!(normalise_identity("Vishal Nadig", "", "").unwrap(), "vishalnadig");
        assert_eq!(normalise_identity("", "Vishal", "Nadig").unwrap(), "vishalnadig");
        assert_eq!(normalise_identity("bot", "Ignored", "Name").unwrap(), "bot");
        assert!(matches!(
            normalise_identity("", "Vishal", ""),
            Err(BotError::InvalidIdentity)
        ));
        assert!(matches!(normalise_identity(" ", "", ""), Err(BotError::InvalidIdentity)));
    }

    #[test]
    fn test_merge_keeps_empty_fields() {
        let mut current = record("alice", "old-key");
        current.email = "alice@example.com".to_string();
        current.merge(&record("alice", "new-key"));
        assert_eq!(current.api_key, "new-key");
        assert_eq!(current.email, "alice@example.com");
    }

    #[test]
    fn test_debug_hides_secrets() {
        let debug = format!("{:?}", record("alice", "key"));
        assert!(debug.contains("alice"));
        assert!(!debug.contains("secret\""));
    }

    #[test]
    fn test_chained_get_falls_back() {
        let mut yaml = MemoryStore::default();
        yaml.add(&record("bob", "yaml-key")).unwrap();
        let store = ChainedStore::new(MemoryStore::default(), yaml);
        assert_eq!(store.get("bob").unwrap().api_key, "yaml-key");
        assert!(matches!(store.get("carol"), Err(BotError::CredentialNotFound(_))));
    }

    #[test]
    fn test_chained_prefers_primary() {
        let mut sql = MemoryStore::default();
        sql.add(&record("bob", "sql-key")).unwrap();
        let mut yaml = MemoryStore::default();
        yaml.add(&record("bob", "yaml-key")).unwrap();
        let store = ChainedStore::new(sql, yaml);
        assert_eq!(store.get("bob").unwrap().api_key, "sql-key");
    }

    #[test]
    fn test_chained_writes_reach_both() {
        let mut store = ChainedStore::new(MemoryStore::default(), MemoryStore::default());
        store.add(&record("dave", "k1")).unwrap();
        assert!(store.primary.get("dave").is_ok());
        assert!(store.fallback.get("dave").is_ok());

        assert!(matches!(
            store.add(&record("dave", "k2")),
            Err(BotError::CredentialExists(_))
        ));

        store.update(&record("dave", "k3")).unwrap();
        assert_eq!(store.fallback.get("dave").unwrap().api_key, "k3");

        store.delete("dave").unwrap();
        assert!(matches!(store.delete("dave"), Err(BotError::CredentialNotFound(_))));
    }
}
