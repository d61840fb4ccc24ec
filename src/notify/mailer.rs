//! Outbound notification delivery.

use super::errors::NotifyResult;
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::env;

/// Best-effort notification delivery.
///
/// Callers decide what to send; implementations only deliver. Failures are
/// surfaced unmodified and never retried here.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one message to the given direct and blind-copied recipients.
    async fn notify(
        &self,
        to: &[String],
        bcc: &[String],
        subject: &str,
        body: &str,
    ) -> NotifyResult<()>;
}

/// SMTP relay configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// Relay hostname
    pub host: String,
    /// Relay username
    pub username: String,
    /// Relay password
    pub password: String,
    /// Sender mailbox, e.g. `Tournament Tracker <no-reply@example.com>`
    pub sender: String,
}

impl SmtpConfig {
    /// Load configuration from environment variables.
    ///
    /// Expected environment variables:
    /// - `SMTP_HOST`: relay hostname (default: localhost)
    /// - `SMTP_USERNAME` / `SMTP_PASSWORD`: relay credentials (default: empty)
    /// - `SMTP_SENDER`: sender mailbox (default: no-reply@localhost)
    pub fn from_env() -> Self {
        Self {
            host: env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
            username: env::var("SMTP_USERNAME").unwrap_or_default(),
            password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            sender: env::var("SMTP_SENDER")
                .unwrap_or_else(|_| "no-reply@localhost".to_string()),
        }
    }
}

/// Notifier delivering plain-text email over an SMTP relay.
#[derive(Clone)]
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpNotifier {
    /// Build a notifier for the configured relay.
    ///
    /// # Errors
    ///
    /// Fails when the relay hostname or sender mailbox cannot be parsed.
    pub fn new(config: &SmtpConfig) -> NotifyResult<Self> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
            .credentials(credentials)
            .build();
        let sender = config.sender.parse()?;

        Ok(Self { transport, sender })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(
        &self,
        to: &[String],
        bcc: &[String],
        subject: &str,
        body: &str,
    ) -> NotifyResult<()> {
        if to.is_empty() && bcc.is_empty() {
            log::warn!("dropping notification '{subject}': no recipients");
            return Ok(());
        }

        let mut builder = Message::builder().from(self.sender.clone());
        for address in to {
            builder = builder.to(address.parse()?);
        }
        for address in bcc {
            builder = builder.bcc(address.parse()?);
        }
        let message = builder
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        self.transport.send(message).await?;
        log::info!(
            "sent '{subject}' to {} recipient(s)",
            to.len() + bcc.len()
        );
        Ok(())
    }
}
