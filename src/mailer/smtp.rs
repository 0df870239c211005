use super::{EmailMessage, Mailer};
use crate::common::error::{Result, ShopError};
use crate::config::MailConfig;
use async_trait::async_trait;
use lettre::message::{header, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use std::time::Duration;
use tracing::debug;

/// Async SMTP relay delivery.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig, host: &str) -> Result<Self> {
        let builder = if config.smtp_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        }
        .map_err(|e| ShopError::Mail(format!("Failed to create SMTP transport: {e}")))?
        .port(config.smtp_port)
        .timeout(Some(Duration::from_secs(config.smtp_timeout_secs)));

        let builder = match (&config.smtp_username, &config.smtp_password) {
            (Some(username), Some(password)) => builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().clone(),
            )),
            _ => builder,
        };

        let from = config
            .from
            .parse()
            .map_err(|e| ShopError::Config(format!("Invalid mail.from address: {e}")))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, msg: &EmailMessage) -> Result<Message> {
        let to: Mailbox = msg
            .to
            .parse()
            .map_err(|e| ShopError::Mail(format!("Invalid recipient '{}': {}", msg.to, e)))?;

        let text_part = SinglePart::builder()
            .header(header::ContentType::TEXT_PLAIN)
            .body(msg.text_body.clone());
        let body = match &msg.html_body {
            Some(html) => MultiPart::alternative().singlepart(text_part).singlepart(
                SinglePart::builder()
                    .header(header::ContentType::TEXT_HTML)
                    .body(html.clone()),
            ),
            None => MultiPart::alternative().singlepart(text_part),
        };

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&msg.subject)
            .multipart(body)
            .map_err(|e| ShopError::Mail(format!("Failed to build message: {e}")))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        debug!(to = %message.to, subject = %message.subject, "Sending e-mail");
        let email = self.build_message(&message)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| ShopError::Mail(format!("Failed to send e-mail: {e}")))?;
        Ok(())
    }
}
