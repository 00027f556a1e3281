use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::TELEGRAM_MAX_MESSAGE_CHARS;
use crate::error::NotifyError;
use crate::notify::NotificationChannel;

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

/// Delivers alerts through the Telegram Bot API `sendMessage` method.
pub struct TelegramChannel {
    client: reqwest::Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramChannel {
    pub fn new(client: reqwest::Client, api_url: &str, token: &str, chat_id: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_url.trim_end_matches('/'), token),
            chat_id: chat_id.to_string(),
        }
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let text = truncate(message, TELEGRAM_MAX_MESSAGE_CHARS);
        if text.len() != message.len() {
            warn!(
                chars = message.chars().count(),
                limit = TELEGRAM_MAX_MESSAGE_CHARS,
                "[NOTIFY] Telegram message truncated"
            );
        }

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text: &text,
                disable_web_page_preview: true,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { status: status.as_u16(), body });
        }
        debug!(chat_id = %self.chat_id, "[NOTIFY] Telegram message delivered");
        Ok(())
    }
}

/// Cut `message` to at most `max_chars` characters, preferring the last line
/// boundary and marking the cut with `...`.
pub fn truncate(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }
    let keep: String = message.chars().take(max_chars.saturating_sub(4)).collect();
    match keep.rfind('\n') {
        Some(pos) => format!("{}\n...", &keep[..pos]),
        None => {
            let keep: String = message.chars().take(max_chars.saturating_sub(3)).collect();
            format!("{keep}...")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::serve;

    #[test]
    fn short_messages_are_untouched() {
        assert_eq!(truncate("hello\nworld", 4096), "hello\nworld");
    }

    #[test]
    fn long_messages_are_cut_at_a_line_boundary() {
        let message = "line one\nline two\nline three";
        let cut = truncate(message, 20);
        assert_eq!(cut, "line one\n...");
        assert!(cut.chars().count() <= 20);
    }

    #[test]
    fn single_long_line_is_hard_cut() {
        let message = "é".repeat(5000);
        let cut = truncate(&message, TELEGRAM_MAX_MESSAGE_CHARS);
        assert_eq!(cut.chars().count(), TELEGRAM_MAX_MESSAGE_CHARS);
        assert!(cut.ends_with("..."));
    }

    #[tokio::test]
    async fn delivers_to_bot_api() {
        let base = serve("HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{\"ok\":true}").await;
        let channel = TelegramChannel::new(reqwest::Client::new(), &base, "123:abc", "42");
        assert!(channel.send("Price alert: Kettle").await.is_ok());
    }

    #[tokio::test]
    async fn api_errors_are_rejections() {
        let base = serve(
            "HTTP/1.1 400 Bad Request\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{\"ok\":false,\"description\":\"chat not found\"}",
        )
        .await;
        let channel = TelegramChannel::new(reqwest::Client::new(), &base, "123:abc", "42");
        match channel.send("hi").await {
            Err(NotifyError::Rejected { status, body }) => {
                assert_eq!(status, 400);
                assert!(body.contains("chat not found"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }
}
