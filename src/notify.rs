//! Trade and alert notifications
//!
//! [`SmtpNotifier`] mails the account owner over STARTTLS; [`LogNotifier`]
//! stands in when no mail server is configured.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::EmailConfig;
use crate::error::{BotError, Result};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, message: &str) -> Result<()>;
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Box<T> {
    async fn notify(&self, subject: &str, message: &str) -> Result<()> {
        (**self).notify(subject, message).await
    }
}

/// Writes notifications to the log only
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subject: &str, message: &str) -> Result<()> {
        info!("[notify] {}: {}", subject, message);
        Ok(())
    }
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    recipient: Mailbox,
}

fn mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e| BotError::Email(format!("Invalid address {:?}: {}", address, e)))
}

impl SmtpNotifier {
    pub fn new(config: &EmailConfig, recipient: &str) -> Result<Self> {
        let sender = if config.sender.is_empty() {
            &config.username
        } else {
            &config.sender
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| BotError::Email(e.to_string()))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            sender: mailbox(sender)?,
            recipient: mailbox(recipient)?,
        })
    }

    pub fn build_message(&self, subject: &str, body: &str) -> Result<Message> {
        Message::builder()
            .from(self.sender.clone())
            .to(self.recipient.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| BotError::Email(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, subject: &str, message: &str) -> Result<()> {
        let email = self.build_message(subject, message)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| BotError::Email(e.to_string()))?;
        info!("Mail sent to {}", self.recipient);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email_config() -> EmailConfig {
        EmailConfig {
            username: "bot@example.com".to_string(),
            password: "app-password".to_string(),
            ..EmailConfig::default()
        }
    }

    #[tokio::test]
    async fn test_log_notifier() {
        let notifier: Box<dyn Notifier> = Box::new(LogNotifier);
        assert!(notifier.notify("Trade closed", "profit 1.2%").await.is_ok());
    }

    #[tokio::test]
    async fn test_message_headers() {
        let notifier = SmtpNotifier::new(&email_config(), "owner@example.com").unwrap();
        let message = notifier.build_message("Price alert", "BTC above 40000").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Price alert"));
        assert!(raw.contains("To: owner@example.com"));
        assert!(raw.contains("From: bot@example.com"));
    }

    #[tokio::test]
    async fn test_invalid_recipient() {
        let result = SmtpNotifier::new(&email_config(), "not an address");
        assert!(matches!(result, Err(BotError::Email(_))));
    }
}
