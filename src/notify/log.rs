use async_trait::async_trait;
use tracing::info;

use crate::config::LOG_CHANNEL;
use crate::error::NotifyError;
use crate::notify::NotificationChannel;

/// Writes alerts to the application log. Always available.
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        LOG_CHANNEL
    }

    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        info!(channel = LOG_CHANNEL, "[NOTIFY] {}", message.replace('\n', " | "));
        Ok(())
    }
}
