//! In-memory stand-ins for the feedback backend

#![allow(dead_code)]

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use jeepney_notify::{
    FeedbackId, FeedbackQuery, FeedbackRow, FeedbackSubscriber, FeedbackSubscription,
    NotificationReconciler, NotifyConfig, NotifyError, Result, SubscriptionHandle,
};

type EventSender = mpsc::UnboundedSender<Result<FeedbackRow>>;

/// Push channel whose events are injected by the test
#[derive(Default)]
pub struct FakeSubscriber {
    live: Mutex<HashMap<SubscriptionHandle, EventSender>>,
    unsubscribed: Mutex<Vec<SubscriptionHandle>>,
    subscribe_calls: AtomicUsize,
    fail_subscribe: AtomicBool,
}

impl FakeSubscriber {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Subscriber whose subscribe call always fails
    pub fn unreachable() -> Arc<Self> {
        let subscriber = Self::default();
        subscriber.fail_subscribe.store(true, Ordering::SeqCst);
        Arc::new(subscriber)
    }

    /// Deliver a row to every live subscription; `false` if nobody received it
    pub fn push(&self, row: FeedbackRow) -> bool {
        self.send(Ok(row))
    }

    pub fn push_error(&self, error: NotifyError) -> bool {
        self.send(Err(error))
    }

    fn send(&self, item: Result<FeedbackRow>) -> bool {
        let live = self.live.lock();
        let mut delivered = false;
        let mut item = Some(item);
        for sender in live.values() {
            // NotifyError is not Clone; only the first live stream gets the item
            if let Some(next) = item.take() {
                delivered |= sender.unbounded_send(next).is_ok();
            }
        }
        delivered
    }

    /// End every live stream as if the connection dropped
    pub fn disconnect(&self) {
        for sender in self.live.lock().values() {
            sender.close_channel();
        }
    }

    pub fn live_subscriptions(&self) -> usize {
        self.live.lock().len()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribed.lock().len()
    }
}

#[async_trait]
impl FeedbackSubscriber for FakeSubscriber {
    async fn subscribe(&self) -> Result<FeedbackSubscription> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(NotifyError::transport("realtime connection refused"));
        }

        let (sender, receiver) = mpsc::unbounded();
        let handle = SubscriptionHandle::new();
        self.live.lock().insert(handle, sender);

        Ok(FeedbackSubscription {
            handle,
            events: receiver.boxed(),
        })
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()> {
        self.live.lock().remove(&handle);
        self.unsubscribed.lock().push(handle);
        Ok(())
    }
}

/// Feedback table held in memory
#[derive(Default)]
pub struct FakeFeedbackTable {
    rows: Mutex<Vec<FeedbackRow>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FakeFeedbackTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_rows(rows: impl IntoIterator<Item = FeedbackRow>) -> Arc<Self> {
        let table = Self::default();
        table.rows.lock().extend(rows);
        Arc::new(table)
    }

    pub fn insert(&self, row: FeedbackRow) {
        self.rows.lock().push(row);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn read(
        &self,
        filter: impl Fn(&FeedbackRow) -> bool,
        oldest_first: bool,
        limit: u32,
    ) -> Result<Vec<FeedbackRow>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::query("connection reset by peer"));
        }

        // ids grow with creation time here
        let mut rows: Vec<FeedbackRow> = self.rows.lock().iter().filter(|r| filter(r)).cloned().collect();
        if oldest_first {
            rows.sort_by_key(|row| row.id);
        } else {
            rows.sort_by(|a, b| b.id.cmp(&a.id));
        }
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

#[async_trait]
impl FeedbackQuery for FakeFeedbackTable {
    async fn latest(&self, limit: u32) -> Result<Vec<FeedbackRow>> {
        self.read(|_| true, false, limit)
    }

    async fn newer_than(&self, id: FeedbackId, limit: u32) -> Result<Vec<FeedbackRow>> {
        self.read(|row| row.id > id, true, limit)
    }
}

pub fn row(id: FeedbackId, first: &str, last: &str) -> FeedbackRow {
    FeedbackRow::new(id).with_name(first, last)
}

pub fn reconciler_with(
    config: NotifyConfig,
    subscriber: &Arc<FakeSubscriber>,
    table: &Arc<FakeFeedbackTable>,
) -> Arc<NotificationReconciler> {
    Arc::new(
        NotificationReconciler::new(config, subscriber.clone(), table.clone())
            .expect("valid test configuration"),
    )
}

/// Let spawned tasks run until `condition` holds; paused time advances 1ms per round
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    condition()
}

/// Default poll period plus a margin
pub const PAST_ONE_TICK: Duration = Duration::from_millis(10_050);
