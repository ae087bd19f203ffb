//! Plaintext YAML credential file
//!
//! ```yaml
//! accounts:
//!   vishalnadig:
//!     username: VishalNadig
//!     email: someone@example.com
//!     api_key: ...
//!     secret_key: ...
//!     google_auth_key: ...
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{normalise_identity, CredentialRecord, CredentialStore};
use crate::error::{BotError, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    accounts: BTreeMap<String, CredentialRecord>,
}

pub struct YamlCredentialStore {
    path: PathBuf,
    file: CredentialFile,
}

impl YamlCredentialStore {
    /// Load `path`, starting empty when the file does not exist yet
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                CredentialFile::default()
            } else {
                serde_yaml::from_str(&contents)?
            }
        } else {
            CredentialFile::default()
        };
        Ok(Self { path, file })
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.file.accounts.keys().map(String::as_str)
    }

    /// Write `accounts` to disk, then adopt them; memory is untouched on failure
    fn commit(&mut self, accounts: BTreeMap<String, CredentialRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = CredentialFile { accounts };
        fs::write(&self.path, serde_yaml::to_string(&file)?)?;
        self.file = file;
        Ok(())
    }
}

impl CredentialStore for YamlCredentialStore {
    fn get(&self, identity: &str) -> Result<CredentialRecord> {
        let key = normalise_identity(identity, "", "")?;
        self.file
            .accounts
            .get(&key)
            .cloned()
            .ok_or(BotError::CredentialNotFound(key))
    }

    fn add(&mut self, record: &CredentialRecord) -> Result<()> {
        let key = record.key()?;
        if self.file.accounts.contains_key(&key) {
            return Err(BotError::CredentialExists(key));
        }
        let mut accounts = self.file.accounts.clone();
        accounts.insert(key.clone(), record.clone());
        self.commit(accounts)?;
        info!("{} added to {}", key, self.path.display());
        Ok(())
    }

    fn update(&mut self, record: &CredentialRecord) -> Result<()> {
        let key = record.key()?;
        let mut accounts = self.file.accounts.clone();
        let current = accounts
            .get_mut(&key)
            .ok_or_else(|| BotError::CredentialNotFound(key.clone()))?;
        current.merge(record);
        self.commit(accounts)?;
        info!("{} updated in {}", key, self.path.display());
        Ok(())
    }

    fn delete(&mut self, identity: &str) -> Result<()> {
        let key = normalise_identity(identity, "", "")?;
        let mut accounts = self.file.accounts.clone();
        if accounts.remove(&key).is_none() {
            return Err(BotError::CredentialNotFound(key));
        }
        self.commit(accounts)?;
        info!("{} deleted from {}", key, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record() -> CredentialRecord {
        CredentialRecord {
            username: "Vishal Nadig".to_string(),
            email: "vishal@example.com".to_string(),
            api_key: "api".to_string(),
            secret_key: "secret".to_string(),
            google_auth_key: "2fa".to_string(),
            ..CredentialRecord::default()
        }
    }

    #[test]
    fn test_add_persists_and_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.yaml");

        let mut store = YamlCredentialStore::open(&path).unwrap();
        store.add(&record()).unwrap();

        let reloaded = YamlCredentialStore::open(&path).unwrap();
        let found = reloaded.get("vishalnadig").unwrap();
        assert_eq!(found.api_key, "api");
        assert_eq!(reloaded.identities().collect::<Vec<_>>(), vec!["vishalnadig"]);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("accounts:"));
    }

    #[test]
    fn test_lookup_normalises() {
        let dir = tempdir().unwrap();
        let mut store = YamlCredentialStore::open(dir.path().join("c.yaml")).unwrap();
        store.add(&record()).unwrap();
        assert!(store.get("Vishal Nadig").is_ok());
    }

    #[test]
    fn test_duplicate_add_fails() {
        let dir = tempdir().unwrap();
        let mut store = YamlCredentialStore::open(dir.path().join("c.yaml")).unwrap();
        store.add(&record()).unwrap();
        assert!(matches!(
            store.add(&record()),
            Err(BotError::CredentialExists(k)) if k == "vishalnadig"
        ));
    }

    #[test]
    fn test_update_and_delete_missing_fail() {
        let dir = tempdir().unwrap();
        let mut store = YamlCredentialStore::open(dir.path().join("c.yaml")).unwrap();
        assert!(matches!(store.update(&record()), Err(BotError::CredentialNotFound(_))));
        assert!(matches!(store.delete("nobody"), Err(BotError::CredentialNotFound(_))));
    }

    #[test]
    fn test_update_merges() {
        let dir = tempdir().unwrap();
        let mut store = YamlCredentialStore::open(dir.path().join("c.yaml")).unwrap();
        store.add(&record()).unwrap();

        let update = CredentialRecord {
            username: "vishalnadig".to_string(),
            api_key: "rotated".to_string(),
            ..CredentialRecord::default()
        };
        store.update(&update).unwrap();

        let found = store.get("vishalnadig").unwrap();
        assert_eq!(found.api_key, "rotated");
        assert_eq!(found.secret_key, "secret");
    }

    #[test]
    fn test_failed_write_leaves_store_unchanged() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("accounts");
        let mut store = YamlCredentialStore::open(sub.join("c.yaml")).unwrap();
        store.add(&record()).unwrap();

        // a plain file where the directory was makes every write fail
        fs::remove_dir_all(&sub).unwrap();
        fs::write(&sub, "").unwrap();

        let update = CredentialRecord {
            username: "vishalnadig".to_string(),
            api_key: "rotated".to_string(),
            ..CredentialRecord::default()
        };
        assert!(matches!(store.update(&update), Err(BotError::Io(_))));
        assert_eq!(store.get("vishalnadig").unwrap().api_key, "api");

        assert!(matches!(store.delete("vishalnadig"), Err(BotError::Io(_))));
        assert!(store.get("vishalnadig").is_ok());

        let other = CredentialRecord {
            username: "ada".to_string(),
            ..record()
        };
        assert!(matches!(store.add(&other), Err(BotError::Io(_))));
        assert!(matches!(store.get("ada"), Err(BotError::CredentialNotFound(_))));
        // a retry reports the write failure again, not a duplicate
        assert!(matches!(store.add(&other), Err(BotError::Io(_))));
    }
}
