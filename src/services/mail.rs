use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::config::MailConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Mail relay rejected message with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Writes messages to the log instead of delivering them
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        info!(to = %email.to, subject = %email.subject, "Mail (not delivered):\n{}", email.text);
        Ok(())
    }
}

/// Delivers mail by POSTing JSON to an HTTP relay
#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    relay_url: String,
}

impl HttpMailer {
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            relay_url: relay_url.into(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let response = self.client.post(&self.relay_url).json(&email).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Rejected(status.as_u16()));
        }
        info!(to = %email.to, "Mail handed to relay");
        Ok(())
    }
}

/// Pick the mailer for the configured relay
pub fn from_config(config: &MailConfig) -> Arc<dyn Mailer> {
    match &config.relay_url {
        Some(url) => Arc::new(HttpMailer::new(url.clone())),
        None => Arc::new(LogMailer),
    }
}

pub fn password_reset_email(from: &str, to: &str, reset_url: &str, ttl_minutes: i64) -> Email {
    Email {
        from: from.to_string(),
        to: to.to_string(),
        subject: format!("Your password reset token (valid for {} min)", ttl_minutes),
        text: format!(
            "Forgot your password? Submit a PATCH request with your new password and passwordConfirmed to: {}\n\
             If you didn't forget your password, please ignore this email.",
            reset_url
        ),
    }
}
