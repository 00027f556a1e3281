use thiserror::Error;

/// Process-level failures. Anything surfacing as an `AppError` aborts the run.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// A selector that cannot be compiled. Raised while validating the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("invalid CSS selector '{expression}': {message}")]
    Css { expression: String, message: String },

    #[error("invalid path query '{expression}' at offset {offset}: {message}")]
    XPath {
        expression: String,
        offset: usize,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Per-item failures: recovered at the item runner boundary, never fatal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP status {0}")]
    Status(u16),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    #[error("price text is empty")]
    Empty,

    #[error("no digits in price text")]
    NoDigits,

    #[error("ambiguous or malformed digit grouping in '{0}'")]
    MalformedGrouping(String),

    #[error("price '{0}' is out of range")]
    OutOfRange(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionFailure {
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("no selector matched (tried {0:?})")]
    SelectorNoMatch(Vec<String>),

    #[error("unparsable price '{raw}': {reason}")]
    UnparsablePrice {
        raw: String,
        reason: NormalizationError,
    },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored price '{0}' is not a decimal")]
    CorruptPrice(String),

    #[error("stored timestamp '{0}' is not RFC 3339")]
    CorruptTimestamp(String),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("no notification channel registered as '{0}'")]
    UnknownChannel(String),

    #[error("delivery failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("channel rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("cannot build email: {0}")]
    Email(#[from] lettre::error::Error),
}
