//! Error types for Satchel gateway

use thiserror::Error;

/// Result type alias for Satchel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Satchel gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Chat completion error
    #[error("chat error: {0}")]
    Chat(String),

    /// The model's reply contained no parseable JSON object
    #[error("malformed model output: {0}")]
    MalformedModelOutput(String),

    /// Upstream AI service rejected the call with a rate limit
    #[error("upstream rate limited: {0}")]
    UpstreamRateLimited(String),

    /// Upstream AI service requires payment
    #[error("upstream payment required: {0}")]
    UpstreamPaymentRequired(String),

    /// No or invalid caller identity
    #[error("unauthorized")]
    Unauthorized,

    /// Unique constraint violation on insert
    #[error("already exists: {0}")]
    Conflict(String),

    /// A command cycle is already in flight for this caller
    #[error("a voice command is already being processed")]
    Busy,

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl Error {
    /// Whether this error should surface to the user as an "already exists"
    /// rejection rather than a generic failure
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
