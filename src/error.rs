//! Error types for the crypto dashboard

use thiserror::Error;

/// Errors that can occur when fetching data from an upstream API
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network request failed
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Invalid response from provider
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Provider API error
    #[error("Provider API error: {0}")]
    ApiError(String),
}

/// Errors raised by the client-local key-value storage
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing a slot failed
    #[error("Storage I/O error on slot {slot}: {source}")]
    Io {
        slot: String,
        #[source]
        source: std::io::Error,
    },

    /// A value could not be serialized for storage
    #[error("Failed to serialize slot {slot}: {source}")]
    Serialize {
        slot: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Creates an Io error for a slot
    pub fn io(slot: &str, source: std::io::Error) -> Self {
        Self::Io {
            slot: slot.to_string(),
            source,
        }
    }

    /// Creates a Serialize error for a slot
    pub fn serialize(slot: &str, source: serde_json::Error) -> Self {
        Self::Serialize {
            slot: slot.to_string(),
            source,
        }
    }
}

/// Errors from the alert store
#[derive(Debug, Error)]
pub enum AlertError {
    /// The target price cannot be stored or compared
    #[error("Invalid alert target: {0}")]
    InvalidTarget(f64),

    /// The alert list could not be persisted
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors from the market-data poller
#[derive(Debug, Error)]
pub enum PollerError {
    /// A background task is already armed for this poller
    #[error("Poller is already running")]
    AlreadyRunning,

    /// The page request is out of range
    #[error("Invalid page request: {0}")]
    InvalidPage(String),
}

/// Errors loading configuration from the environment
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable holds a value that cannot be parsed
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

/// Errors from the user repository of the auth backend
#[derive(Debug, Error)]
pub enum UserStoreError {
    /// Query or connection failure, including constraint violations
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors talking to the auth backend from the dashboard client
#[derive(Debug, Error)]
pub enum SessionError {
    /// Network request failed
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend rejected the request with a user-facing message
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// No user is logged in
    #[error("Not logged in, run `login` first")]
    NotLoggedIn,

    /// The session could not be persisted
    #[error(transparent)]
    Storage(#[from] StorageError),
}
