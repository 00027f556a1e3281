pub mod email;
pub mod log;
pub mod telegram;
pub mod webhook;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::config::{Config, NOTIFY_TIMEOUT_SECS};
use crate::error::{AppError, NotifyError, Result};
use crate::types::{ItemConfig, TrackingOutcome};

pub use email::EmailChannel;
pub use self::log::LogChannel;
pub use telegram::TelegramChannel;
pub use webhook::WebhookChannel;

/// One delivery mechanism for alert messages.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, message: &str) -> std::result::Result<(), NotifyError>;
}

/// Lookup table of registered channels by name.
pub struct Notifier {
    channels: HashMap<String, Arc<dyn NotificationChannel>>,
}

impl Notifier {
    /// A notifier with only the `log` channel registered.
    pub fn new() -> Self {
        let mut notifier = Self { channels: HashMap::new() };
        notifier.register(Arc::new(LogChannel));
        notifier
    }

    /// Register every channel whose settings are present.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let mut notifier = Self::new();
        if let (Some(host), Some(user), Some(password), Some(recipient)) = (
            &cfg.email_host,
            &cfg.email_user,
            &cfg.email_password,
            &cfg.email_recipient,
        ) {
            let from = cfg.email_from.as_deref().unwrap_or(user);
            notifier.register(Arc::new(EmailChannel::new(
                host,
                cfg.email_port,
                user,
                password,
                from,
                recipient,
            )?));
        }

        let needs_http = cfg.webhook_url.is_some()
            || (cfg.telegram_bot_token.is_some() && cfg.telegram_chat_id.is_some());
        if !needs_http {
            return Ok(notifier);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(NOTIFY_TIMEOUT_SECS))
            .build()
            .map_err(AppError::Http)?;

        if let (Some(token), Some(chat_id)) = (&cfg.telegram_bot_token, &cfg.telegram_chat_id) {
            notifier.register(Arc::new(TelegramChannel::new(
                client.clone(),
                &cfg.telegram_api_url,
                token,
                chat_id,
            )));
        }
        if let Some(url) = &cfg.webhook_url {
            notifier.register(Arc::new(WebhookChannel::new(client, url)));
        }
        Ok(notifier)
    }

    /// Replaces any channel already registered under the same name.
    pub fn register(&mut self, channel: Arc<dyn NotificationChannel>) {
        info!(channel = channel.name(), "[NOTIFY] Channel registered");
        self.channels.insert(channel.name().to_string(), channel);
    }

    pub fn has_channel(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    /// Configured channel names with no registered implementation.
    pub fn missing<'a>(&self, configured: &'a [String]) -> Vec<&'a str> {
        configured
            .iter()
            .map(String::as_str)
            .filter(|name| !self.has_channel(name))
            .collect()
    }

    pub async fn send(&self, channel: &str, message: &str) -> std::result::Result<(), NotifyError> {
        let Some(ch) = self.channels.get(channel) else {
            return Err(NotifyError::UnknownChannel(channel.to_string()));
        };
        ch.send(message).await
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Human-readable alert for an item that reached its target.
pub fn alert_message(item: &ItemConfig, outcome: &TrackingOutcome) -> String {
    let mut lines = vec![
        format!("Price alert: {}", item.name),
        format!("Price: {} (target {})", outcome.new_price, item.target_price),
    ];
    if let Some(prev) = &outcome.previous_price {
        lines.push(format!("Previous: {prev}"));
    }
    lines.push(format!("Link: {}", item.url));
    lines.join("\n")
}
