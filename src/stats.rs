//! Runtime counters for the notification reconciler

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Counters shared by the push and poll tasks
#[derive(Debug, Default)]
pub struct ReconcilerStats {
    channel_events: AtomicU64,
    malformed_payloads: AtomicU64,
    poll_ticks: AtomicU64,
    poll_errors: AtomicU64,
    items_inserted: AtomicU64,
    duplicates_suppressed: AtomicU64,
    clears: AtomicU64,
    push_connected: AtomicBool,
}

/// Point-in-time copy of [`ReconcilerStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub channel_events: u64,
    pub malformed_payloads: u64,
    pub poll_ticks: u64,
    pub poll_errors: u64,
    pub items_inserted: u64,
    pub duplicates_suppressed: u64,
    pub clears: u64,
    pub push_connected: bool,
}

impl ReconcilerStats {
    pub fn record_channel_event(&self) {
        self.channel_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed_payload(&self) {
        self.malformed_payloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_poll_tick(&self) {
        self.poll_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_poll_error(&self) {
        self.poll_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inserted(&self, count: u64) {
        self.items_inserted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_duplicates(&self, count: u64) {
        self.duplicates_suppressed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_clear(&self) {
        self.clears.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_push_connected(&self, connected: bool) {
        self.push_connected.store(connected, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            channel_events: self.channel_events.load(Ordering::Relaxed),
            malformed_payloads: self.malformed_payloads.load(Ordering::Relaxed),
            poll_ticks: self.poll_ticks.load(Ordering::Relaxed),
            poll_errors: self.poll_errors.load(Ordering::Relaxed),
            items_inserted: self.items_inserted.load(Ordering::Relaxed),
            duplicates_suppressed: self.duplicates_suppressed.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
            push_connected: self.push_connected.load(Ordering::SeqCst),
        }
    }
}
