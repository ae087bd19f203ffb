//! Credentials commands - manage per-user exchange keys

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crypto_trading_bot::config::AppConfig;
use crypto_trading_bot::credentials::{
    normalise_identity, open_store, CredentialRecord, CredentialStore, SecretCipher,
};

/// Account identity: a username, or first and last name
#[derive(Args, Debug)]
pub struct IdentityArgs {
    #[arg(short, long, default_value = "")]
    pub username: String,
    #[arg(long, default_value = "")]
    pub first_name: String,
    #[arg(long, default_value = "")]
    pub last_name: String,
}

impl IdentityArgs {
    fn key(&self) -> Result<String> {
        normalise_identity(&self.username, &self.first_name, &self.last_name)
            .context("Give --username, or both --first-name and --last-name")
    }
}

/// Account record; fields left out stay empty (add) or unchanged (update)
#[derive(Args, Debug)]
pub struct RecordArgs {
    #[command(flatten)]
    pub identity: IdentityArgs,
    #[arg(long, default_value = "")]
    pub email: String,
    #[arg(long, default_value = "")]
    pub api_key: String,
    #[arg(long, default_value = "")]
    pub secret_key: String,
    #[arg(long, default_value = "")]
    pub google_auth_key: String,
}

impl From<RecordArgs> for CredentialRecord {
    fn from(args: RecordArgs) -> Self {
        CredentialRecord {
            username: args.identity.username,
            first_name: args.identity.first_name,
            last_name: args.identity.last_name,
            email: args.email,
            api_key: args.api_key,
            secret_key: args.secret_key,
            google_auth_key: args.google_auth_key,
        }
    }
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 4 {
        "*".repeat(secret.len())
    } else {
        format!("{}{}", visible, "*".repeat(8))
    }
}

pub fn get(config: AppConfig, identity: IdentityArgs) -> Result<()> {
    let key = identity.key()?;
    let store = open_store(&config.credentials)?;
    let record = store.get(&key)?;

    println!("Account:  {}", key);
    println!("  Email:      {}", record.email);
    println!("  API key:    {}", record.api_key);
    println!("  Secret key: {}", mask(&record.secret_key));
    println!("  2FA key:    {}", mask(&record.google_auth_key));
    Ok(())
}

pub fn add(config: AppConfig, record: RecordArgs) -> Result<()> {
    let record = CredentialRecord::from(record);
    let key = record.key().context("Give --username, or both --first-name and --last-name")?;
    if record.api_key.is_empty() || record.secret_key.is_empty() {
        anyhow::bail!("--api-key and --secret-key are required when adding an account");
    }

    let mut store = open_store(&config.credentials)?;
    store.add(&record)?;
    info!("Added credentials for {}", key);
    println!("Added {}", key);
    Ok(())
}

pub fn update(config: AppConfig, record: RecordArgs) -> Result<()> {
    let record = CredentialRecord::from(record);
    let key = record.key().context("Give --username, or both --first-name and --last-name")?;

    let mut store = open_store(&config.credentials)?;
    store.update(&record)?;
    info!("Updated credentials for {}", key);
    println!("Updated {}", key);
    Ok(())
}

pub fn delete(config: AppConfig, identity: IdentityArgs) -> Result<()> {
    let key = identity.key()?;
    let mut store = open_store(&config.credentials)?;
    store.delete(&key)?;
    info!("Deleted credentials for {}", key);
    println!("Deleted {}", key);
    Ok(())
}

pub fn gen_key() -> Result<()> {
    println!("{}", SecretCipher::generate_key());
    println!("Set it as CREDENTIALS_ENCRYPTION_KEY or credentials.encryption_key");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask() {
        assert_eq!(mask("abc"), "***");
        assert_eq!(mask("abcdefgh"), "abcd********");
    }
}
