use std::time::Duration;

use crate::error::{AppError, Result};

pub const ITEMS_CONFIG_PATH: &str = "items_config.json";
pub const DB_PATH: &str = "price_history.db";
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Total time allowed for one page fetch, including body download.
pub const FETCH_TIMEOUT_SECS: u64 = 15;

/// Time allowed to establish the TCP/TLS connection.
pub const FETCH_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Telegram rejects messages longer than this many characters.
pub const TELEGRAM_MAX_MESSAGE_CHARS: usize = 4096;

/// Timeout for notification delivery requests.
pub const NOTIFY_TIMEOUT_SECS: u64 = 10;

/// SMTP submission port used when EMAIL_PORT is unset (STARTTLS).
pub const EMAIL_PORT: u16 = 587;

/// Channel name that is always registered and only writes to the log.
pub const LOG_CHANNEL: &str = "log";

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the JSON item catalogue (ITEMS_CONFIG)
    pub items_path: String,
    pub db_path: String,
    pub log_level: String,
    pub fetch_timeout_secs: u64,
    pub fetch_connect_timeout_secs: u64,
    pub user_agent: String,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub telegram_api_url: String,
    /// Slack/Discord-style incoming webhook (WEBHOOK_URL)
    pub webhook_url: Option<String>,
    pub email_host: Option<String>,
    /// 465 for implicit TLS, 587 for STARTTLS
    pub email_port: u16,
    pub email_user: Option<String>,
    pub email_password: Option<String>,
    pub email_recipient: Option<String>,
    /// Sender address; EMAIL_USER when unset (EMAIL_FROM)
    pub email_from: Option<String>,
    /// Keep history in memory only; nothing is written to DB_PATH (DRY_RUN)
    pub dry_run: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            items_path: std::env::var("ITEMS_CONFIG")
                .unwrap_or_else(|_| ITEMS_CONFIG_PATH.to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| DB_PATH.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            fetch_timeout_secs: parse_secs("FETCH_TIMEOUT_SECS", FETCH_TIMEOUT_SECS)?,
            fetch_connect_timeout_secs: parse_secs(
                "FETCH_CONNECT_TIMEOUT_SECS",
                FETCH_CONNECT_TIMEOUT_SECS,
            )?,
            user_agent: std::env::var("USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
            telegram_bot_token: non_empty_var("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: non_empty_var("TELEGRAM_CHAT_ID"),
            telegram_api_url: std::env::var("TELEGRAM_API_URL")
                .unwrap_or_else(|_| TELEGRAM_API_URL.to_string()),
            webhook_url: non_empty_var("WEBHOOK_URL"),
            email_host: non_empty_var("EMAIL_HOST"),
            email_port: parse_port("EMAIL_PORT", EMAIL_PORT)?,
            email_user: non_empty_var("EMAIL_USER"),
            email_password: non_empty_var("EMAIL_PASSWORD"),
            email_recipient: non_empty_var("EMAIL_RECIPIENT"),
            email_from: non_empty_var("EMAIL_FROM"),
            dry_run: parse_bool("DRY_RUN")?,
        })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn fetch_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_connect_timeout_secs)
    }

    fn email_fields(&self) -> [bool; 4] {
        [
            self.email_host.is_some(),
            self.email_user.is_some(),
            self.email_password.is_some(),
            self.email_recipient.is_some(),
        ]
    }

    /// Host, user, password and recipient are all set.
    pub fn email_configured(&self) -> bool {
        self.email_fields().iter().all(|set| *set)
    }

    /// Some but not all of the required EMAIL_* settings are set.
    pub fn email_incomplete(&self) -> bool {
        self.email_fields().iter().any(|set| *set) && !self.email_configured()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_secs(key: &str, default: u64) -> Result<u64> {
    match non_empty_var(key) {
        None => Ok(default),
        Some(raw) => match raw.parse::<u64>() {
            Ok(0) | Err(_) => Err(AppError::Config(format!(
                "{key} must be a positive number of seconds, got '{raw}'"
            ))),
            Ok(secs) => Ok(secs),
        },
    }
}

fn parse_port(key: &str, default: u16) -> Result<u16> {
    match non_empty_var(key) {
        None => Ok(default),
        Some(raw) => match raw.parse::<u16>() {
            Ok(0) | Err(_) => Err(AppError::Config(format!("{key} must be a TCP port, got '{raw}'"))),
            Ok(port) => Ok(port),
        },
    }
}

fn parse_bool(key: &str) -> Result<bool> {
    match non_empty_var(key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(AppError::Config(format!("{key} must be a boolean, got '{v}'"))),
        },
    }
}

/// Defaults with every optional channel unset.
#[cfg(test)]
impl Config {
    pub(crate) fn bare() -> Self {
        Config {
            items_path: ITEMS_CONFIG_PATH.to_string(),
            db_path: DB_PATH.to_string(),
            log_level: "info".to_string(),
            fetch_timeout_secs: FETCH_TIMEOUT_SECS,
            fetch_connect_timeout_secs: FETCH_CONNECT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            telegram_bot_token: None,
            telegram_chat_id: None,
            telegram_api_url: TELEGRAM_API_URL.to_string(),
            webhook_url: None,
            email_host: None,
            email_port: EMAIL_PORT,
            email_user: None,
            email_password: None,
            email_recipient: None,
            email_from: None,
            dry_run: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_needs_host_user_password_and_recipient() {
        let mut cfg = Config::bare();
        assert!(!cfg.email_configured());
        assert!(!cfg.email_incomplete());

        cfg.email_host = Some("smtp.shop.test".to_string());
        cfg.email_user = Some("alerts@shop.test".to_string());
        assert!(!cfg.email_configured());
        assert!(cfg.email_incomplete());

        cfg.email_password = Some("secret".to_string());
        cfg.email_recipient = Some("me@shop.test".to_string());
        assert!(cfg.email_configured());
        assert!(!cfg.email_incomplete());
    }
}
