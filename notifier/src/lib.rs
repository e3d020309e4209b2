//! Outbound email for match alerts and the daily digest.

pub mod templates;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::time::Duration;
use threadwatch_core::{CoreError, MailConfig, MailError};
use tracing::{debug, info};

pub use templates::{
    alert_subject, digest_subject, markdown_to_html, render_daily_digest, render_match_alert,
};

/// Delivers one HTML message to the configured recipient.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, subject: &str, html_body: &str) -> Result<(), CoreError>;
}

/// SMTP mailer authenticating with the sender's own account.
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    /// Port 465 uses implicit TLS, every other port upgrades with STARTTLS.
    pub fn from_config(config: &MailConfig) -> Result<Self, CoreError> {
        let from = parse_mailbox(&config.username)?;
        let to = parse_mailbox(&config.recipient)?;

        let builder = if config.smtp_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        }
        .map_err(|e| MailError::BuildFailed {
            reason: e.to_string(),
        })?;

        let transport = builder
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(Duration::from_secs(config.timeout_secs)))
            .build();

        debug!(
            host = %config.smtp_host,
            port = config.smtp_port,
            "SMTP transport configured"
        );

        Ok(Self { transport, from, to })
    }

    pub fn recipient(&self) -> &Mailbox {
        &self.to
    }

    pub fn build_message(&self, subject: &str, html_body: &str) -> Result<Message, CoreError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| MailError::BuildFailed {
                reason: e.to_string(),
            })?;
        Ok(message)
    }
}

#[async_trait]
impl Mailer for EmailNotifier {
    async fn send(&self, subject: &str, html_body: &str) -> Result<(), CoreError> {
        let message = self.build_message(subject, html_body)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::DeliveryFailed {
                reason: e.to_string(),
            })?;

        info!(
            channel = "email",
            subject = %subject,
            recipient = %self.to.email,
            "Email delivered"
        );
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, CoreError> {
    address.trim().parse::<Mailbox>().map_err(|_| {
        MailError::InvalidAddress {
            address: address.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MailConfig {
        MailConfig {
            smtp_host: "smtp.example.com".to_string(),
            username: "alerts@example.com".to_string(),
            password: "app-password".to_string(),
            recipient: "Founder <founder@example.com>".to_string(),
            ..MailConfig::default()
        }
    }

    #[test]
    fn test_from_config_parses_addresses() {
        let notifier = EmailNotifier::from_config(&config()).unwrap();
        assert_eq!(notifier.recipient().email.to_string(), "founder@example.com");
    }

    #[test]
    fn test_implicit_tls_port_is_accepted() {
        let notifier = EmailNotifier::from_config(&MailConfig {
            smtp_port: 465,
            ..config()
        });
        assert!(notifier.is_ok());
    }

    #[test]
    fn test_invalid_sender_is_rejected() {
        let result = EmailNotifier::from_config(&MailConfig {
            username: "not-an-email".to_string(),
            ..config()
        });
        match result {
            Err(CoreError::Mail(MailError::InvalidAddress { address })) => {
                assert_eq!(address, "not-an-email")
            }
            other => panic!("Expected InvalidAddress, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_missing_recipient_is_rejected() {
        let result = EmailNotifier::from_config(&MailConfig {
            recipient: String::new(),
            ..config()
        });
        assert!(matches!(
            result,
            Err(CoreError::Mail(MailError::InvalidAddress { .. }))
        ));
    }

    #[test]
    fn test_message_is_html() {
        let notifier = EmailNotifier::from_config(&config()).unwrap();
        let message = notifier
            .build_message("Daily Reddit Report - 2024-05-01", "<h1>Report</h1>")
            .unwrap();

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Daily Reddit Report - 2024-05-01"));
        assert!(raw.contains("Content-Type: text/html; charset=utf-8"));
        assert!(raw.contains("From: alerts@example.com"));
        assert!(raw.contains("<h1>Report</h1>"));
    }
}
