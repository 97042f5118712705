//! Error types for the feedback notification reconciler

use thiserror::Error;

/// Errors raised while feeding or configuring the notification reconciler
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Push channel could not be opened or dropped mid-stream
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Fallback query failed
    #[error("Query error: {message}")]
    Query { message: String },

    /// Realtime payload without a usable row id
    #[error("Malformed payload: {reason}")]
    MalformedPayload { reason: String },

    /// Invalid SQL identifier for a table or channel
    #[error("Invalid identifier: {identifier}")]
    InvalidIdentifier { identifier: String },

    /// Reconciler sources were already started
    #[error("Reconciler {reconciler_id} is already running")]
    AlreadyStarted { reconciler_id: uuid::Uuid },

    /// Operation attempted on a reconciler that was already shut down
    #[error("Reconciler {reconciler_id} has been disposed")]
    Disposed { reconciler_id: uuid::Uuid },
}

impl NotifyError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a query error
    pub fn query<S: Into<String>>(message: S) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Create a malformed payload error
    pub fn malformed<S: Into<String>>(reason: S) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }

    /// Create an invalid identifier error
    pub fn invalid_identifier<S: Into<String>>(identifier: S) -> Self {
        Self::InvalidIdentifier {
            identifier: identifier.into(),
        }
    }

    /// Whether the error only affects a single payload and the stream can continue
    pub fn is_payload_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedPayload { .. } | Self::Serialization(_)
        )
    }
}

impl From<config::ConfigError> for NotifyError {
    fn from(error: config::ConfigError) -> Self {
        NotifyError::config(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NotifyError>;
