//! Outgoing e-mail: transports, templates and the order notifier.

mod notifier;
mod smtp;
mod templates;

pub use notifier::OrderNotifier;
pub use smtp::SmtpMailer;
pub use templates::EmailTemplates;

use crate::common::error::Result;
use crate::config::MailConfig;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<()>;
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            html = message.html_body.is_some(),
            "SMTP not configured, logging e-mail instead of sending:\n{}",
            message.text_body
        );
        Ok(())
    }
}

/// SMTP when a host is configured, the log otherwise.
pub fn build_mailer(config: &MailConfig) -> Result<Arc<dyn Mailer>> {
    match config.smtp_host.as_deref() {
        Some(host) => {
            info!("Sending e-mail through SMTP relay {}:{}", host, config.smtp_port);
            Ok(Arc::new(SmtpMailer::new(config, host)?))
        }
        None => {
            info!("No SMTP host configured; e-mails will be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}
