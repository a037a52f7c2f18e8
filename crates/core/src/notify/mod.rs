//! Report delivery.
//!
//! The [`ReportMailer`] emails the rendered report when SMTP is configured.
//! A report that cannot be delivered is written to the log instead, so the
//! run never fails on delivery.

pub mod email;

use tracing::{info, warn};

use crate::config::NotificationConfig;

/// How a report reached the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Emailed(Vec<String>),
    Logged,
}

pub struct ReportMailer {
    email: Option<email::EmailSender>,
}

impl ReportMailer {
    /// Build a mailer from the notification settings. Without explicit
    /// recipients the report goes to `user` at the configured domain.
    pub fn new(config: &NotificationConfig, user: &str) -> Self {
        let recipients = if !config.email_recipients.is_empty() {
            config.email_recipients.clone()
        } else {
            match config.email_domain.as_deref() {
                Some(domain) if !user.is_empty() => vec![format!("{}@{}", user, domain)],
                _ => Vec::new(),
            }
        };
        let from = config.email_from.clone().or_else(|| recipients.first().cloned());

        let email = match (&config.email_smtp, from) {
            (Some(smtp), Some(from)) if !recipients.is_empty() => {
                info!("report email enabled");
                Some(email::EmailSender::new(smtp.clone(), from, recipients))
            }
            _ => None,
        };
        Self { email }
    }

    pub fn is_configured(&self) -> bool {
        self.email.is_some()
    }

    /// Send the report, or log it when email is unavailable or fails.
    pub async fn deliver(&self, subject: &str, html: &str) -> Delivery {
        if let Some(ref email) = self.email {
            match email.send(subject, html).await {
                Ok(()) => return Delivery::Emailed(email.recipients().to_vec()),
                Err(e) => warn!(error = %e, "could not email report"),
            }
        }
        info!(subject, report = %html, "patchtester report");
        Delivery::Logged
    }
}
