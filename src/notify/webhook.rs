use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::error::NotifyError;
use crate::notify::NotificationChannel;

/// Posts `{"text": message}` to an incoming-webhook URL (Slack and Discord accept this shape).
pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
}

impl WebhookChannel {
    pub fn new(client: reqwest::Client, url: &str) -> Self {
        Self { client, url: url.to_string() }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&json!({ "text": message }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { status: status.as_u16(), body });
        }
        debug!(status = status.as_u16(), "[NOTIFY] Webhook delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::serve;

    #[tokio::test]
    async fn accepts_any_success_status() {
        let base = serve("HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n").await;
        let channel = WebhookChannel::new(reqwest::Client::new(), &format!("{base}/hook"));
        assert!(channel.send("Price alert: Kettle").await.is_ok());
    }

    #[tokio::test]
    async fn server_errors_are_rejections() {
        let base = serve("HTTP/1.1 500 Internal Server Error\r\nContent-Length: 4\r\nConnection: close\r\n\r\noops").await;
        let channel = WebhookChannel::new(reqwest::Client::new(), &format!("{base}/hook"));
        assert!(matches!(
            channel.send("hi").await,
            Err(NotifyError::Rejected { status: 500, ref body }) if body == "oops"
        ));
    }
}
