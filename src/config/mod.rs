//! # Notification Feed Configuration
//!
//! Settings for the feedback notification reconciler: which sources run, how
//! often and how widely the fallback poll reads, and which table and channel
//! the Postgres backend talks to.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use jeepney_notify::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new().load()?;
//! println!("polling every {:?}", config.poll_interval());
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::deployment::{DeploymentMode, PollStrategy};
use crate::error::{NotifyError, Result};

pub use loader::{detect_environment, sanitize_database_url, ConfigLoader};

/// Maximum rows a single poll tick may read
pub const MAX_POLL_LIMIT: u32 = 100;

/// Configuration for the notification reconciler and its Postgres backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Which sources to run
    pub deployment_mode: DeploymentMode,

    /// Fallback poll period in milliseconds
    pub poll_interval_ms: u64,

    /// Which rows each poll tick reads
    pub poll_strategy: PollStrategy,

    /// Maximum rows read per poll tick
    pub poll_limit: u32,

    /// Feedback table name
    pub feedback_table: String,

    /// LISTEN/NOTIFY channel carrying inserted feedback rows
    pub notify_channel: String,

    /// Connection string; `DATABASE_URL` wins when set
    pub database_url: Option<String>,

    /// Create the insert trigger on startup
    pub install_trigger: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            deployment_mode: DeploymentMode::Hybrid,
            poll_interval_ms: 10_000,
            poll_strategy: PollStrategy::Latest,
            poll_limit: 1,
            feedback_table: "feedback".to_string(),
            notify_channel: "feedback_inserted".to_string(),
            database_url: None,
            install_trigger: false,
        }
    }
}

impl NotifyConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deployment_mode(mut self, mode: DeploymentMode) -> Self {
        self.deployment_mode = mode;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_poll_strategy(mut self, strategy: PollStrategy) -> Self {
        self.poll_strategy = strategy;
        self
    }

    pub fn with_poll_limit(mut self, limit: u32) -> Self {
        self.poll_limit = limit;
        self
    }

    pub fn with_feedback_table<S: Into<String>>(mut self, table: S) -> Self {
        self.feedback_table = table.into();
        self
    }

    pub fn with_notify_channel<S: Into<String>>(mut self, channel: S) -> Self {
        self.notify_channel = channel.into();
        self
    }

    /// Poll period as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(NotifyError::config("poll_interval_ms must be greater than zero"));
        }

        if self.poll_limit == 0 || self.poll_limit > MAX_POLL_LIMIT {
            return Err(NotifyError::config(format!(
                "poll_limit must be between 1 and {MAX_POLL_LIMIT}"
            )));
        }

        validate_identifier(&self.feedback_table)?;
        validate_identifier(&self.notify_channel)?;

        Ok(())
    }
}

/// Check that a table or channel name is a plain SQL identifier
///
/// Names are interpolated into SQL, so only `[A-Za-z_][A-Za-z0-9_]*` up to 63
/// bytes (the Postgres identifier limit) is accepted.
pub fn validate_identifier(identifier: &str) -> Result<()> {
    let mut chars = identifier.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && identifier.len() <= 63 {
        Ok(())
    } else {
        Err(NotifyError::invalid_identifier(identifier))
    }
}
