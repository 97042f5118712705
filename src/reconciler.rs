//! # Notification Reconciler
//!
//! Merges "new feedback" alerts from two unreliable sources into one
//! newest-first, duplicate-free [`NotificationList`]:
//!
//! - **Push**: a [`FeedbackSubscriber`] stream of inserted rows
//! - **Poll**: a [`FeedbackQuery`] read of the newest rows on a fixed period
//!
//! Either source may be down; the poll is the availability floor. The first
//! source to report a given feedback id inserts it, later reports of the same
//! id are ignored while it is still listed.
//!
//! Mutation and change signalling are separate steps: every mutation happens
//! under the state lock and then publishes a [`NotificationSnapshot`] on a
//! `watch` channel for the display layer.
//!
//! ## Lifecycle
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use jeepney_notify::config::NotifyConfig;
//! use jeepney_notify::postgres::PgFeedbackStore;
//! use jeepney_notify::reconciler::NotificationReconciler;
//!
//! # async fn example(pool: sqlx::PgPool) -> jeepney_notify::Result<()> {
//! let config = NotifyConfig::default();
//! let store = Arc::new(PgFeedbackStore::new(pool, &config)?);
//! let reconciler = Arc::new(NotificationReconciler::new(config, store.clone(), store)?);
//!
//! let handle = reconciler.start()?; // mount
//! let mut changes = reconciler.subscribe_changes();
//! changes.changed().await.ok();
//! println!("badge: {}", changes.borrow().badge);
//!
//! handle.shutdown().await; // unmount
//! # Ok(())
//! # }
//! ```

use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::NotifyConfig;
use crate::deployment::PollStrategy;
use crate::dropdown::{Bounds, Dropdown, Point};
use crate::error::{NotifyError, Result};
use crate::feedback::{FeedbackId, FeedbackRow};
use crate::logging::{log_feed_error, log_feed_event};
use crate::notification::{NotificationItem, NotificationList, NotificationSnapshot};
use crate::source::{FeedbackQuery, FeedbackSubscriber, FeedbackSubscription};
use crate::stats::{ReconcilerStats, StatsSnapshot};

/// How long shutdown waits for a source task before aborting it
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct ReconcilerState {
    list: NotificationList,
    dropdown: Dropdown,
    /// Highest id a catch-up poll has read; push events and clears leave it alone
    poll_cursor: Option<FeedbackId>,
}

impl ReconcilerState {
    fn snapshot(&self) -> NotificationSnapshot {
        NotificationSnapshot::capture(&self.list, self.dropdown.is_open())
    }
}

/// Authoritative list of feedback alerts for one header instance
pub struct NotificationReconciler {
    reconciler_id: Uuid,
    config: NotifyConfig,
    subscriber: Arc<dyn FeedbackSubscriber>,
    query: Arc<dyn FeedbackQuery>,
    state: Mutex<ReconcilerState>,
    changes: watch::Sender<NotificationSnapshot>,
    stats: ReconcilerStats,
    started: AtomicBool,
    disposed: AtomicBool,
}

impl std::fmt::Debug for NotificationReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationReconciler")
            .field("reconciler_id", &self.reconciler_id)
            .field("config", &self.config)
            .field("badge", &self.badge())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl NotificationReconciler {
    /// Create a reconciler over the given sources
    ///
    /// Nothing runs until [`start`](Self::start); the operations can also be
    /// driven by hand.
    pub fn new(
        config: NotifyConfig,
        subscriber: Arc<dyn FeedbackSubscriber>,
        query: Arc<dyn FeedbackQuery>,
    ) -> Result<Self> {
        config.validate()?;

        let reconciler_id = Uuid::new_v4();
        let (changes, _) = watch::channel(NotificationSnapshot::default());

        info!(
            reconciler_id = %reconciler_id,
            deployment_mode = %config.deployment_mode,
            poll_interval = ?config.poll_interval(),
            poll_strategy = %config.poll_strategy,
            "Creating NotificationReconciler"
        );

        Ok(Self {
            reconciler_id,
            config,
            subscriber,
            query,
            state: Mutex::new(ReconcilerState::default()),
            changes,
            stats: ReconcilerStats::default(),
            started: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn reconciler_id(&self) -> Uuid {
        self.reconciler_id
    }

    pub fn config(&self) -> &NotifyConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Receive a snapshot after every change to the list or dropdown
    pub fn subscribe_changes(&self) -> watch::Receiver<NotificationSnapshot> {
        self.changes.subscribe()
    }

    pub fn snapshot(&self) -> NotificationSnapshot {
        self.state.lock().snapshot()
    }

    pub fn items(&self) -> Vec<NotificationItem> {
        self.state.lock().list.items().to_vec()
    }

    /// Unread badge, derived from the list
    pub fn badge(&self) -> usize {
        self.state.lock().list.badge()
    }

    pub fn newest_known_id(&self) -> Option<FeedbackId> {
        self.state.lock().list.newest_known_id()
    }

    /// Id the next catch-up poll reads above
    ///
    /// The highest id an earlier poll returned, or before the first
    /// successful poll the newest listed id.
    pub fn poll_cursor(&self) -> Option<FeedbackId> {
        let state = self.state.lock();
        state.poll_cursor.or_else(|| state.list.newest_known_id())
    }

    /// Push channel delivered an inserted row
    ///
    /// Returns `true` if a new item was prepended. Redelivery of a listed id is
    /// a no-op.
    pub fn on_channel_event(&self, row: FeedbackRow) -> bool {
        if self.is_disposed() {
            return false;
        }
        self.stats.record_channel_event();
        self.merge_rows("push", std::slice::from_ref(&row), false) == 1
    }

    /// Run one fallback poll
    ///
    /// Returns how many items were prepended. Query failures are logged,
    /// counted and swallowed; the next tick retries.
    #[instrument(skip(self), fields(reconciler_id = %self.reconciler_id))]
    pub async fn on_poll_tick(&self) -> usize {
        if self.is_disposed() {
            return 0;
        }
        self.stats.record_poll_tick();

        let limit = self.config.poll_limit;
        let catch_up = self.config.poll_strategy == PollStrategy::CatchUp;
        let result = match (catch_up, self.poll_cursor()) {
            (true, Some(cursor)) => self.query.newer_than(cursor, limit).await.map(|mut rows| {
                rows.reverse();
                rows
            }),
            _ => self.query.latest(limit).await,
        };

        match result {
            Ok(rows) => {
                debug!(rows = rows.len(), "Fallback poll returned rows");
                self.merge_rows("poll", &rows, catch_up)
            }
            Err(e) => {
                self.stats.record_poll_error();
                log_feed_error("poll", "query", &e.to_string(), Some("skipping tick"));
                0
            }
        }
    }

    /// Drop every alert locally; nothing is sent to the backend
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        if self.is_disposed() {
            return 0;
        }

        let removed = state.list.clear();
        self.stats.record_clear();
        if removed > 0 {
            self.changes.send_replace(state.snapshot());
        }

        debug!(reconciler_id = %self.reconciler_id, removed, "Cleared notifications");
        removed
    }

    /// Show or hide the dropdown; returns the new visibility
    pub fn toggle_visibility(&self) -> bool {
        let mut state = self.state.lock();
        if self.is_disposed() {
            return state.dropdown.is_open();
        }

        let open = state.dropdown.toggle();
        self.changes.send_replace(state.snapshot());
        open
    }

    pub fn is_dropdown_open(&self) -> bool {
        self.state.lock().dropdown.is_open()
    }

    /// Record the laid-out bounds of the dropdown panel
    pub fn set_dropdown_bounds(&self, bounds: Bounds) {
        self.state.lock().dropdown.set_bounds(bounds);
    }

    /// Pointer-down anywhere on the page; closes the dropdown if outside it
    pub fn handle_pointer_down(&self, point: Point) -> bool {
        let mut state = self.state.lock();
        if self.is_disposed() {
            return false;
        }

        let closed = state.dropdown.handle_pointer_down(point);
        if closed {
            self.changes.send_replace(state.snapshot());
        }
        closed
    }

    /// Text lines of the dropdown panel
    pub fn render(&self) -> Vec<String> {
        let state = self.state.lock();
        state.dropdown.render(&state.list)
    }

    /// Start the sources the deployment mode asks for
    ///
    /// Returns a handle whose [`shutdown`](ReconcilerHandle::shutdown)
    /// releases the subscription and stops the poll timer. Must be called
    /// inside a tokio runtime.
    #[instrument(skip(self), fields(reconciler_id = %self.reconciler_id))]
    pub fn start(self: &Arc<Self>) -> Result<ReconcilerHandle> {
        if self.is_disposed() {
            return Err(NotifyError::Disposed {
                reconciler_id: self.reconciler_id,
            });
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(NotifyError::AlreadyStarted {
                reconciler_id: self.reconciler_id,
            });
        }

        let mode = self.config.deployment_mode;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        if mode.has_event_driven() {
            let reconciler = Arc::clone(self);
            let shutdown = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move {
                reconciler.run_push_loop(shutdown).await;
            }));
        }

        if mode.has_polling() {
            let reconciler = Arc::clone(self);
            let shutdown = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move {
                reconciler.run_poll_loop(shutdown).await;
            }));
        }

        info!(
            deployment_mode = %mode,
            sources = tasks.len(),
            "NotificationReconciler started"
        );

        Ok(ReconcilerHandle {
            reconciler: Arc::clone(self),
            shutdown_tx,
            tasks,
            stopped: false,
        })
    }

    /// Prepend rows absent from the list and publish if anything changed
    ///
    /// With `advance_cursor` the poll cursor moves up to the highest row id,
    /// including rows that were already listed.
    fn merge_rows(&self, source: &str, rows: &[FeedbackRow], advance_cursor: bool) -> usize {
        if rows.is_empty() {
            return 0;
        }

        let mut state = self.state.lock();
        if self.is_disposed() {
            debug!(
                reconciler_id = %self.reconciler_id,
                source,
                "Ignoring rows delivered after shutdown"
            );
            return 0;
        }

        if advance_cursor {
            let highest = rows.iter().map(|row| row.id).max();
            state.poll_cursor = state.poll_cursor.max(highest);
        }

        let inserted_ids = state.list.merge_rows_inserted(rows);
        let inserted = inserted_ids.len();
        let duplicates = rows.len() - inserted;
        self.stats.record_inserted(inserted as u64);
        self.stats.record_duplicates(duplicates as u64);

        if inserted > 0 {
            self.changes.send_replace(state.snapshot());
        }
        let badge = state.list.badge();
        drop(state);

        for id in &inserted_ids {
            log_feed_event(source, "reconcile", Some(*id), "inserted", None);
        }
        debug!(
            source,
            inserted,
            duplicates,
            badge,
            ids = ?rows.iter().map(|row| row.id).collect::<Vec<_>>(),
            "Reconciled feedback rows"
        );

        inserted
    }

    /// Mark disposed; later events, ticks and actions are ignored
    fn dispose(&self) {
        let _state = self.state.lock();
        self.disposed.store(true, Ordering::SeqCst);
    }

    async fn run_push_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let subscription = tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => return,
            result = self.subscriber.subscribe() => result,
        };

        let FeedbackSubscription { handle, mut events } = match subscription {
            Ok(subscription) => subscription,
            Err(e) => {
                // Poll-only from here on
                log_feed_error(
                    "push",
                    "subscribe",
                    &e.to_string(),
                    Some("continuing without push channel"),
                );
                return;
            }
        };

        self.stats.set_push_connected(true);
        info!(reconciler_id = %self.reconciler_id, subscription = %handle, "Push channel subscribed");

        loop {
            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => break,
                next = events.next() => match next {
                    Some(Ok(row)) => {
                        self.on_channel_event(row);
                    }
                    Some(Err(e)) if e.is_payload_error() => {
                        self.stats.record_malformed_payload();
                        warn!(reconciler_id = %self.reconciler_id, error = %e, "Skipping malformed feedback payload");
                    }
                    Some(Err(e)) => {
                        error!(reconciler_id = %self.reconciler_id, error = %e, "Push channel failed");
                        break;
                    }
                    None => {
                        warn!(reconciler_id = %self.reconciler_id, "Push channel stream ended");
                        break;
                    }
                }
            }
        }

        self.stats.set_push_connected(false);
        drop(events);

        if let Err(e) = self.subscriber.unsubscribe(handle).await {
            log_feed_error("push", "unsubscribe", &e.to_string(), None);
        } else {
            info!(reconciler_id = %self.reconciler_id, subscription = %handle, "Push channel released");
        }
    }

    async fn run_poll_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.poll_interval();
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = interval.tick() => {
                    tokio::select! {
                        biased;
                        _ = wait_for_shutdown(&mut shutdown) => break,
                        _ = self.on_poll_tick() => {}
                    }
                }
            }
        }

        info!(reconciler_id = %self.reconciler_id, "Fallback poll stopped");
    }
}

/// Resolve once shutdown is signalled or the signalling side is gone
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Running sources of a started reconciler
///
/// Dropping the handle without calling [`shutdown`](Self::shutdown) still
/// disposes the reconciler and signals both tasks to stop.
#[derive(Debug)]
pub struct ReconcilerHandle {
    reconciler: Arc<NotificationReconciler>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    stopped: bool,
}

impl ReconcilerHandle {
    pub fn reconciler(&self) -> &Arc<NotificationReconciler> {
        &self.reconciler
    }

    /// Unsubscribe the push channel, cancel the poll timer and wait for both
    #[instrument(skip(self), fields(reconciler_id = %self.reconciler.reconciler_id))]
    pub async fn shutdown(mut self) {
        self.signal_stop();

        for mut task in std::mem::take(&mut self.tasks) {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await.is_err() {
                warn!("Source task did not stop in time, aborting");
                task.abort();
            }
        }

        info!("NotificationReconciler shut down");
    }

    fn signal_stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.reconciler.dispose();
        self.shutdown_tx.send_replace(true);
    }
}

impl Drop for ReconcilerHandle {
    fn drop(&mut self) {
        self.signal_stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NoSubscriber;

    #[async_trait]
    impl FeedbackSubscriber for NoSubscriber {
        async fn subscribe(&self) -> Result<FeedbackSubscription> {
            Err(NotifyError::transport("realtime unavailable"))
        }

        async fn unsubscribe(&self, _handle: crate::source::SubscriptionHandle) -> Result<()> {
            Ok(())
        }
    }

    /// Rows held newest first
    struct FixedQuery(Vec<FeedbackRow>);

    #[async_trait]
    impl FeedbackQuery for FixedQuery {
        async fn latest(&self, limit: u32) -> Result<Vec<FeedbackRow>> {
            Ok(self.0.iter().take(limit as usize).cloned().collect())
        }

        async fn newer_than(&self, id: FeedbackId, limit: u32) -> Result<Vec<FeedbackRow>> {
            Ok(self
                .0
                .iter()
                .rev()
                .filter(|row| row.id > id)
                .take(limit as usize)
                .cloned()
                .collect())
        }
    }

    fn reconciler(rows: Vec<FeedbackRow>) -> NotificationReconciler {
        NotificationReconciler::new(
            NotifyConfig::default(),
            Arc::new(NoSubscriber),
            Arc::new(FixedQuery(rows)),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = NotificationReconciler::new(
            NotifyConfig::default().with_poll_limit(0),
            Arc::new(NoSubscriber),
            Arc::new(FixedQuery(vec![])),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_channel_event_is_idempotent() {
        let reconciler = reconciler(vec![]);
        assert!(reconciler.on_channel_event(FeedbackRow::new(1).with_name("A", "B")));
        assert!(!reconciler.on_channel_event(FeedbackRow::new(1).with_name("A", "B")));
        assert_eq!(reconciler.badge(), 1);
        assert_eq!(reconciler.stats().duplicates_suppressed, 1);
    }

    #[tokio::test]
    async fn test_poll_after_channel_event_is_deduplicated() {
        let reconciler = reconciler(vec![FeedbackRow::new(5)]);
        reconciler.on_channel_event(FeedbackRow::new(5));
        assert_eq!(reconciler.on_poll_tick().await, 0);
        assert_eq!(reconciler.snapshot().ids(), vec![5]);
    }

    #[tokio::test]
    async fn test_catch_up_pages_forward_through_backlog() {
        let rows = (1..=5).rev().map(FeedbackRow::new).collect();
        let reconciler = NotificationReconciler::new(
            NotifyConfig::default()
                .with_poll_strategy(PollStrategy::CatchUp)
                .with_poll_limit(2),
            Arc::new(NoSubscriber),
            Arc::new(FixedQuery(rows)),
        )
        .unwrap();
        reconciler.on_channel_event(FeedbackRow::new(1));

        assert_eq!(reconciler.on_poll_tick().await, 2);
        assert_eq!(reconciler.poll_cursor(), Some(3));
        assert_eq!(reconciler.on_poll_tick().await, 2);
        assert_eq!(reconciler.on_poll_tick().await, 0);
        assert_eq!(reconciler.snapshot().ids(), vec![5, 4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_catch_up_cursor_ignores_push_and_clear() {
        let rows = (1..=4).rev().map(FeedbackRow::new).collect();
        let reconciler = NotificationReconciler::new(
            NotifyConfig::default()
                .with_poll_strategy(PollStrategy::CatchUp)
                .with_poll_limit(1),
            Arc::new(NoSubscriber),
            Arc::new(FixedQuery(rows)),
        )
        .unwrap();
        reconciler.on_channel_event(FeedbackRow::new(1));
        assert_eq!(reconciler.on_poll_tick().await, 1);

        // Push skips ahead to 4; polling still reads 3
        reconciler.on_channel_event(FeedbackRow::new(4));
        assert_eq!(reconciler.poll_cursor(), Some(2));
        assert_eq!(reconciler.on_poll_tick().await, 1);

        // Clearing keeps the cursor, so only the unread row 4 returns
        reconciler.clear();
        assert_eq!(reconciler.poll_cursor(), Some(3));
        assert_eq!(reconciler.on_poll_tick().await, 1);
        assert_eq!(reconciler.on_poll_tick().await, 0);
        assert_eq!(reconciler.snapshot().ids(), vec![4]);
    }

    #[test]
    fn test_toggle_publishes_snapshot() {
        let reconciler = reconciler(vec![]);
        let mut changes = reconciler.subscribe_changes();
        assert!(reconciler.toggle_visibility());
        assert!(changes.has_changed().unwrap());
        assert!(changes.borrow_and_update().dropdown_open);
    }

    #[test]
    fn test_clear_on_empty_list_does_not_publish() {
        let reconciler = reconciler(vec![]);
        let changes = reconciler.subscribe_changes();
        assert_eq!(reconciler.clear(), 0);
        assert!(!changes.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_disposed_reconciler_ignores_everything() {
        let reconciler = Arc::new(reconciler(vec![FeedbackRow::new(3)]));
        reconciler.on_channel_event(FeedbackRow::new(1));

        let handle = reconciler.start().unwrap();
        handle.shutdown().await;

        let stats_before = reconciler.stats();
        assert!(!reconciler.on_channel_event(FeedbackRow::new(2)));
        assert_eq!(reconciler.stats().channel_events, stats_before.channel_events);
        assert_eq!(reconciler.on_poll_tick().await, 0);
        assert_eq!(reconciler.stats().poll_ticks, stats_before.poll_ticks);
        assert_eq!(reconciler.clear(), 0);
        assert!(!reconciler.toggle_visibility());
        assert_eq!(reconciler.snapshot().ids(), vec![1]);
        assert!(matches!(
            reconciler.start(),
            Err(NotifyError::Disposed { .. })
        ));
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let reconciler = Arc::new(reconciler(vec![]));
        let handle = reconciler.start().unwrap();
        assert!(matches!(
            reconciler.start(),
            Err(NotifyError::AlreadyStarted { .. })
        ));
        handle.shutdown().await;
    }
}
