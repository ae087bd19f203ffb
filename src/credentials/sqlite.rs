//! SQLite credential table with encrypted secrets
//!
//! The API key, secret key and 2FA key columns hold [`SecretCipher`]
//! ciphertext; names and email are plain.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::{normalise_identity, CredentialRecord, CredentialStore, SecretCipher};
use crate::error::{BotError, Result};

pub struct SqliteCredentialStore {
    conn: Mutex<Connection>,
    cipher: SecretCipher,
}

impl SqliteCredentialStore {
    pub fn open(db_path: impl AsRef<Path>, cipher: SecretCipher) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        let store = Self::with_connection(conn, cipher)?;
        info!("Credential database opened at {}", db_path.display());
        Ok(store)
    }

    pub fn in_memory(cipher: SecretCipher) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, cipher)
    }

    fn with_connection(conn: Connection, cipher: SecretCipher) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT '',
                email TEXT NOT NULL DEFAULT '',
                api_key TEXT NOT NULL,
                secret_key TEXT NOT NULL,
                google_auth_key TEXT NOT NULL
            )",
            [],
        )?;
        debug!("Credential schema created/verified");
        Ok(Self {
            conn: Mutex::new(conn),
            cipher,
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row("SELECT id FROM users WHERE username = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    fn write(&self, key: &str, record: &CredentialRecord, insert: bool) -> Result<()> {
        let api_key = self.cipher.encrypt(&record.api_key)?;
        let secret_key = self.cipher.encrypt(&record.secret_key)?;
        let google_auth_key = self.cipher.encrypt(&record.google_auth_key)?;
        let sql = if insert {
            "INSERT INTO users
             (username, first_name, last_name, email, api_key, secret_key, google_auth_key)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        } else {
            "UPDATE users SET first_name = ?2, last_name = ?3, email = ?4,
             api_key = ?5, secret_key = ?6, google_auth_key = ?7
             WHERE username = ?1"
        };
        self.conn().execute(
            sql,
            params![
                key,
                record.first_name,
                record.last_name,
                record.email,
                api_key,
                secret_key,
                google_auth_key
            ],
        )?;
        Ok(())
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn get(&self, identity: &str) -> Result<CredentialRecord> {
        let key = normalise_identity(identity, "", "")?;
        let row = self
            .conn()
            .query_row(
                "SELECT username, first_name, last_name, email, api_key, secret_key, google_auth_key
                 FROM users WHERE username = ?1",
                params![key],
                |row| {
                    Ok((
                        CredentialRecord {
                            username: row.get(0)?,
                            first_name: row.get(1)?,
                            last_name: row.get(2)?,
                            email: row.get(3)?,
                            ..CredentialRecord::default()
                        },
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        let (mut record, api_key, secret_key, google_auth_key) =
            row.ok_or_else(|| BotError::CredentialNotFound(key.clone()))?;
        record.api_key = self.cipher.decrypt(&api_key)?;
        record.secret_key = self.cipher.decrypt(&secret_key)?;
        record.google_auth_key = self.cipher.decrypt(&google_auth_key)?;
        debug!("Credentials retrieved for {}", key);
        Ok(record)
    }

    fn add(&mut self, record: &CredentialRecord) -> Result<()> {
        let key = record.key()?;
        if self.exists(&key)? {
            return Err(BotError::CredentialExists(key));
        }
        self.write(&key, record, true)?;
        info!("{} added to credential database", key);
        Ok(())
    }

    fn update(&mut self, record: &CredentialRecord) -> Result<()> {
        let key = record.key()?;
        let mut current = self.get(&key)?;
        current.merge(record);
        self.write(&key, &current, false)?;
        info!("{} updated in credential database", key);
        Ok(())
    }

    fn delete(&mut self, identity: &str) -> Result<()> {
        let key = normalise_identity(identity, "", "")?;
        let removed = self
            .conn()
            .execute("DELETE FROM users WHERE username = ?1", params![key])?;
        if removed == 0 {
            return Err(BotError::CredentialNotFound(key));
        }
        info!("{} deleted from credential database", key);
        Ok(())
    }
}
