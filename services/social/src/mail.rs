//! Outbound mail
//!
//! The service only ever sends one kind of message, the account activation
//! email. Transports implement [`Mailer`].

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

/// Path the activation link points at, relative to the public base URL
pub const VERIFICATION_PATH: &str = "/auth/accountVerification";

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("Mail relay rejected the message with status {0}")]
    Rejected(u16),
}

/// A message ready to be sent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationEmail {
    pub subject: String,
    pub recipient: String,
    pub body: String,
}

impl NotificationEmail {
    /// Activation email for `recipient` carrying `token`
    pub fn activation(public_base_url: &str, recipient: &str, token: &str) -> Self {
        Self {
            subject: "Please activate your account".to_string(),
            recipient: recipient.to_string(),
            body: format!(
                "Please click this link to activate your account:\n\n{}\n\n",
                verification_url(public_base_url, token)
            ),
        }
    }
}

/// Link a user follows to activate their account
pub fn verification_url(public_base_url: &str, token: &str) -> String {
    format!(
        "{}{}/{}",
        public_base_url.trim_end_matches('/'),
        VERIFICATION_PATH,
        token
    )
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &NotificationEmail) -> Result<(), MailError>;
}

/// Writes messages to the log instead of delivering them
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &NotificationEmail) -> Result<(), MailError> {
        info!(
            recipient = %email.recipient,
            subject = %email.subject,
            "Outgoing email:\n{}",
            email.body
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Hands messages to an HTTP mail relay as JSON
#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    relay_url: String,
    from: String,
}

impl HttpMailer {
    /// `timeout` bounds each relay call, which runs inside the signup transaction
    pub fn new(relay_url: String, from: String, timeout: Duration) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            relay_url,
            from,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &NotificationEmail) -> Result<(), MailError> {
        let message = RelayMessage {
            from: &self.from,
            to: &email.recipient,
            subject: &email.subject,
            body: &email.body,
        };

        let response = self
            .client
            .post(&self.relay_url)
            .json(&message)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to reach mail relay: {}", e);
                MailError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            error!("Mail relay answered {}", status);
            return Err(MailError::Rejected(status.as_u16()));
        }

        info!("Activation email handed to relay for {}", email.recipient);
        Ok(())
    }
}
