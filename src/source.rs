//! # Feedback sources
//!
//! The two collaborators the reconciler is built from. Both are injected, so
//! tests substitute in-memory fakes and production uses
//! [`PgFeedbackStore`](crate::postgres::PgFeedbackStore).

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;
use uuid::Uuid;

use crate::error::Result;
use crate::feedback::{FeedbackId, FeedbackRow};

/// Identifies one open push subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(Uuid);

impl SubscriptionHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn id(&self) -> Uuid {
        self.0
    }
}

impl Default for SubscriptionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stream of inserted feedback rows
///
/// Items that fail with a payload error (see
/// [`NotifyError::is_payload_error`](crate::error::NotifyError::is_payload_error))
/// are skipped by the consumer; any other error ends the subscription.
pub struct FeedbackSubscription {
    pub handle: SubscriptionHandle,
    pub events: BoxStream<'static, Result<FeedbackRow>>,
}

impl fmt::Debug for FeedbackSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedbackSubscription")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Push channel: insert events on the feedback table
#[async_trait]
pub trait FeedbackSubscriber: Send + Sync {
    /// Open a subscription to feedback inserts
    async fn subscribe(&self) -> Result<FeedbackSubscription>;

    /// Release a subscription; its stream ends afterwards
    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()>;
}

/// Fallback query against the feedback table
#[async_trait]
pub trait FeedbackQuery: Send + Sync {
    /// Newest rows by creation time, newest first
    async fn latest(&self, limit: u32) -> Result<Vec<FeedbackRow>>;

    /// Rows with an id above `id`, oldest first
    ///
    /// A backlog larger than `limit` is read by calling again with the highest
    /// id returned.
    async fn newer_than(&self, id: FeedbackId, limit: u32) -> Result<Vec<FeedbackRow>>;
}
