//! # Postgres feedback store
//!
//! [`FeedbackQuery`] and [`FeedbackSubscriber`] over a `sqlx::PgPool`. Inserts
//! reach the push channel through `LISTEN/NOTIFY`: a trigger on the feedback
//! table (see [`PgFeedbackStore::install_insert_trigger`]) publishes each new
//! row as JSON on the configured channel.

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument};

use crate::config::{validate_identifier, NotifyConfig};
use crate::error::{NotifyError, Result};
use crate::feedback::{FeedbackId, FeedbackRow};
use crate::source::{FeedbackQuery, FeedbackSubscriber, FeedbackSubscription, SubscriptionHandle};

/// Feedback table access plus its insert notifications
pub struct PgFeedbackStore {
    pool: PgPool,
    table: String,
    channel: String,
    subscriptions: Mutex<HashMap<SubscriptionHandle, oneshot::Sender<()>>>,
}

impl std::fmt::Debug for PgFeedbackStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgFeedbackStore")
            .field("table", &self.table)
            .field("channel", &self.channel)
            .field("pool", &"PgPool")
            .field("subscriptions", &self.subscriptions.lock().len())
            .finish()
    }
}

impl PgFeedbackStore {
    pub fn new(pool: PgPool, config: &NotifyConfig) -> Result<Self> {
        validate_identifier(&config.feedback_table)?;
        validate_identifier(&config.notify_channel)?;

        Ok(Self {
            pool,
            table: config.feedback_table.clone(),
            channel: config.notify_channel.clone(),
            subscriptions: Mutex::new(HashMap::new()),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Create or replace the trigger that notifies the channel on insert
    #[instrument(skip(self), fields(table = %self.table, channel = %self.channel))]
    pub async fn install_insert_trigger(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for statement in trigger_statements(&self.table, &self.channel) {
            sqlx::query(&statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        info!("Installed feedback insert trigger");
        Ok(())
    }
}

fn latest_sql(table: &str) -> String {
    format!(
        "SELECT id, first_name, last_name, created_at FROM {table} \
         ORDER BY created_at DESC, id DESC LIMIT $1"
    )
}

fn newer_than_sql(table: &str) -> String {
    format!(
        "SELECT id, first_name, last_name, created_at FROM {table} \
         WHERE id > $1 ORDER BY id ASC LIMIT $2"
    )
}

/// Statements creating the notify trigger; names must already be validated
///
/// Only the columns the feed reads are sent, keeping payloads well under the
/// 8000 byte `pg_notify` limit.
fn trigger_statements(table: &str, channel: &str) -> Vec<String> {
    let function = format!("{table}_notify_insert");
    vec![
        format!(
            "CREATE OR REPLACE FUNCTION {function}() RETURNS trigger AS $$ \
             BEGIN \
               PERFORM pg_notify('{channel}', json_build_object( \
                 'id', NEW.id, \
                 'first_name', NEW.first_name, \
                 'last_name', NEW.last_name, \
                 'created_at', NEW.created_at)::text); \
               RETURN NEW; \
             END; \
             $$ LANGUAGE plpgsql"
        ),
        format!("DROP TRIGGER IF EXISTS {function} ON {table}"),
        format!(
            "CREATE TRIGGER {function} AFTER INSERT ON {table} \
             FOR EACH ROW EXECUTE FUNCTION {function}()"
        ),
    ]
}

#[async_trait]
impl FeedbackQuery for PgFeedbackStore {
    async fn latest(&self, limit: u32) -> Result<Vec<FeedbackRow>> {
        let sql = latest_sql(&self.table);
        sqlx::query_as::<_, FeedbackRow>(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| NotifyError::query(e.to_string()))
    }

    async fn newer_than(&self, id: FeedbackId, limit: u32) -> Result<Vec<FeedbackRow>> {
        let sql = newer_than_sql(&self.table);
        sqlx::query_as::<_, FeedbackRow>(&sql)
            .bind(id)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| NotifyError::query(e.to_string()))
    }
}

#[async_trait]
impl FeedbackSubscriber for PgFeedbackStore {
    #[instrument(skip(self), fields(channel = %self.channel))]
    async fn subscribe(&self) -> Result<FeedbackSubscription> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| NotifyError::transport(format!("listener connect failed: {e}")))?;
        listener
            .listen(&self.channel)
            .await
            .map_err(|e| NotifyError::transport(format!("LISTEN {} failed: {e}", self.channel)))?;

        let handle = SubscriptionHandle::new();
        let (stop_tx, stop_rx) = oneshot::channel();
        self.subscriptions.lock().insert(handle, stop_tx);

        let events = listener
            .into_stream()
            .map(|notification| match notification {
                Ok(notification) => {
                    debug!(
                        channel = notification.channel(),
                        payload = notification.payload(),
                        "Received feedback notification"
                    );
                    FeedbackRow::from_payload(notification.payload())
                }
                Err(e) => Err(NotifyError::Database(e)),
            })
            .take_until(stop_rx)
            .boxed();

        info!(subscription = %handle, "Listening for feedback inserts");
        Ok(FeedbackSubscription { handle, events })
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()> {
        let stop = self.subscriptions.lock().remove(&handle);
        match stop {
            Some(stop) => {
                // The stream may already be gone
                let _ = stop.send(());
                debug!(subscription = %handle, "Released feedback subscription");
            }
            None => debug!(subscription = %handle, "Unknown subscription, nothing to release"),
        }
        Ok(())
    }
}
