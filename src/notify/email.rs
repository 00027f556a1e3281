use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use crate::config::NOTIFY_TIMEOUT_SECS;
use crate::error::{AppError, NotifyError, Result};
use crate::notify::NotificationChannel;

/// Sends each alert as a plain-text email. The first line of the alert becomes the subject.
pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailChannel {
    /// Port 465 uses implicit TLS, 587 uses STARTTLS. Any other port is rejected.
    pub fn new(
        host: &str,
        port: u16,
        user: &str,
        password: &str,
        from: &str,
        to: &str,
    ) -> Result<Self> {
        let builder = match port {
            465 => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
            587 => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
            other => {
                return Err(AppError::Config(format!(
                    "EMAIL_PORT must be 465 (TLS) or 587 (STARTTLS), got {other}"
                )))
            }
        }
        .map_err(|e| AppError::Config(format!("invalid SMTP relay '{host}': {e}")))?;

        let transport = builder
            .port(port)
            .credentials(Credentials::new(user.to_string(), password.to_string()))
            .timeout(Some(Duration::from_secs(NOTIFY_TIMEOUT_SECS)))
            .build();
        Self::with_transport(transport, from, to)
    }

    pub fn with_transport(
        transport: AsyncSmtpTransport<Tokio1Executor>,
        from: &str,
        to: &str,
    ) -> Result<Self> {
        Ok(Self { transport, from: mailbox("EMAIL_FROM", from)?, to: mailbox("EMAIL_RECIPIENT", to)? })
    }

    fn build_message(&self, text: &str) -> std::result::Result<Message, NotifyError> {
        let subject = text.lines().next().unwrap_or("Price alert");
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(text.to_string())?;
        Ok(message)
    }
}

fn mailbox(key: &str, raw: &str) -> Result<Mailbox> {
    raw.parse()
        .map_err(|e| AppError::Config(format!("{key} is not a valid address '{raw}': {e}")))
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, message: &str) -> std::result::Result<(), NotifyError> {
        let email = self.build_message(message)?;
        let response = self.transport.send(email).await?;
        debug!(code = %response.code(), to = %self.to, "[NOTIFY] Email delivered");
        Ok(())
    }
}
