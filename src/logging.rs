//! # Structured Logging Module
//!
//! Environment-aware console logging using the tracing ecosystem.
//!
//! - Log level follows the environment (`debug` in development/test, `info` in
//!   production) unless `RUST_LOG` is set
//! - `LOG_FORMAT=json` switches to JSON lines for log shippers
//! - ANSI colors only when stdout is a terminal
//! - Domain helpers for feed events so every source logs the same fields

use chrono::Utc;
use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::detect_environment;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Output format of the console layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    pub fn from_env_value(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "json" | "jsonl" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// Initialize structured logging with environment-specific configuration
///
/// Safe to call more than once; a subscriber installed elsewhere is kept.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = detect_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));
        let format = std::env::var("LOG_FORMAT")
            .map(|v| LogFormat::from_env_value(&v))
            .unwrap_or(LogFormat::Compact);
        let use_ansi = std::io::stdout().is_terminal();

        let console_layer = match format {
            LogFormat::Json => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(use_ansi)
                .with_filter(filter)
                .boxed(),
        };

        if tracing_subscriber::registry()
            .with(console_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
            return;
        }

        tracing::info!(
            environment = %environment,
            format = ?format,
            ansi_colors = use_ansi,
            "Structured logging initialized"
        );
    });
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log a feed event from either source
pub fn log_feed_event(
    source: &str,
    operation: &str,
    feedback_id: Option<i64>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        source = %source,
        operation = %operation,
        feedback_id = feedback_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "FEED_EVENT"
    );
}

/// Log an absorbed failure with context
pub fn log_feed_error(source: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::warn!(
        source = %source,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "FEED_ERROR"
    );
}
