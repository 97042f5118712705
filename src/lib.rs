#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Jeepney Notify
//!
//! Feedback notification feed for the jeepney route administration console.
//!
//! ## Overview
//!
//! The console header shows administrators a bell with an unread badge and a
//! dropdown of "new feedback" alerts. Alerts come from two independent,
//! unreliable sources:
//!
//! - a **push channel** delivering inserted feedback rows as they happen
//! - a **fallback poll** re-reading the newest feedback rows on a timer
//!
//! Both may report the same row. The [`NotificationReconciler`] merges them
//! into one newest-first list with at most one alert per feedback id, derives
//! the badge from it and lets the user clear it locally.
//!
//! ## Module Organization
//!
//! - [`reconciler`] - The reconciler and its start/shutdown lifecycle
//! - [`notification`] - Alert items, the de-duplicated list and snapshots
//! - [`dropdown`] - Header dropdown visibility and rendering
//! - [`source`] - Injected push and poll source traits
//! - [`postgres`] - `LISTEN/NOTIFY` + query implementation of the sources
//! - [`feedback`] - Feedback rows and realtime payload decoding
//! - [`config`] - Configuration loading
//! - [`deployment`] - Which sources run
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use jeepney_notify::{ConfigLoader, NotificationReconciler, PgFeedbackStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! jeepney_notify::logging::init_structured_logging();
//! let config = ConfigLoader::new().load()?;
//!
//! let pool = sqlx::PgPool::connect("postgresql://localhost/jeepney").await?;
//! let store = Arc::new(PgFeedbackStore::new(pool, &config)?);
//! let reconciler = Arc::new(NotificationReconciler::new(config, store.clone(), store)?);
//!
//! let handle = reconciler.start()?;
//! // ... render reconciler.snapshot() whenever subscribe_changes() fires ...
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod deployment;
pub mod dropdown;
pub mod error;
pub mod feedback;
pub mod logging;
pub mod notification;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod reconciler;
pub mod source;
pub mod stats;

pub use config::{ConfigLoader, NotifyConfig};
pub use deployment::{DeploymentMode, PollStrategy};
pub use error::{NotifyError, Result};
pub use feedback::{FeedbackId, FeedbackRow};
pub use notification::{NotificationItem, NotificationList, NotificationSnapshot};
#[cfg(feature = "postgres")]
pub use postgres::PgFeedbackStore;
pub use reconciler::{NotificationReconciler, ReconcilerHandle};
pub use source::{FeedbackQuery, FeedbackSubscriber, FeedbackSubscription, SubscriptionHandle};
pub use stats::StatsSnapshot;
