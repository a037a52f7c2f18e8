//! SMTP delivery of HTML reports.
//!
//! Uses the `lettre` crate over a STARTTLS relay.

use lettre::message::{header::ContentType, Mailbox};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info, warn};

use crate::errors::NotificationError;

/// SMTP sender for one set of recipients.
pub struct EmailSender {
    smtp_addr: String,
    from: String,
    recipients: Vec<String>,
}

impl EmailSender {
    /// `smtp_addr` is `host:port` (e.g. `smtp.example.com:587`).
    pub fn new(smtp_addr: String, from: String, recipients: Vec<String>) -> Self {
        info!(smtp = %smtp_addr, from = %from, recipients = ?recipients, "initializing email sender");
        Self { smtp_addr, from, recipients }
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// Send one HTML message addressed to every recipient.
    pub async fn send(&self, subject: &str, html_body: &str) -> Result<(), NotificationError> {
        debug!(subject, to = ?self.recipients, "sending email");
        let email = self.build_message(subject, html_body)?;
        let transport = self.build_transport()?;

        match transport.send(email).await {
            Ok(_) => {
                info!(to = ?self.recipients, "report email sent");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "failed to send email");
                Err(NotificationError::EmailError(format!("SMTP send failed: {}", e)))
            }
        }
    }

    fn build_message(&self, subject: &str, html_body: &str) -> Result<Message, NotificationError> {
        let from: Mailbox = self
            .from
            .parse()
            .map_err(|e| NotificationError::EmailError(format!("invalid from address: {}", e)))?;

        let mut builder = Message::builder().from(from).subject(subject).header(ContentType::TEXT_HTML);
        for recipient in &self.recipients {
            let to: Mailbox = recipient.parse().map_err(|e| {
                NotificationError::EmailError(format!("invalid recipient '{}': {}", recipient, e))
            })?;
            builder = builder.to(to);
        }
        builder
            .body(html_body.to_string())
            .map_err(|e| NotificationError::EmailError(format!("failed to build email: {}", e)))
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotificationError> {
        let (host, port) = match self.smtp_addr.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().unwrap_or(587)),
            None => (self.smtp_addr.as_str(), 587),
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| NotificationError::EmailError(format!("SMTP connection error: {}", e)))?
            .port(port)
            .build();
        Ok(transport)
    }
}
