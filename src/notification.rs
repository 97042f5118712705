//! # Notification list
//!
//! Newest-first list of "new feedback" alerts with at most one item per
//! feedback id. De-duplication is a linear scan; the list only ever holds the
//! handful of alerts an administrator has not cleared yet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::feedback::{FeedbackId, FeedbackRow};

/// One alert shown in the header dropdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationItem {
    /// Id of the originating feedback record
    pub id: FeedbackId,
    /// Precomputed display text
    pub message: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl NotificationItem {
    pub fn from_row(row: &FeedbackRow) -> Self {
        Self {
            id: row.id,
            message: format!("New feedback from {}", row.display_name()),
            created_at: row.created_at,
        }
    }
}

impl From<&FeedbackRow> for NotificationItem {
    fn from(row: &FeedbackRow) -> Self {
        Self::from_row(row)
    }
}

/// Ordered alerts, newest first, unique by id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationList {
    items: Vec<NotificationItem>,
}

impl NotificationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: FeedbackId) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    /// Prepend an item unless its id is already listed
    ///
    /// Returns `true` when the item was inserted.
    pub fn prepend_if_absent(&mut self, item: NotificationItem) -> bool {
        if self.contains(item.id) {
            return false;
        }
        self.items.insert(0, item);
        true
    }

    /// Merge rows given newest first; returns how many were inserted
    ///
    /// Rows are prepended oldest first so the newest row ends up at the front.
    pub fn merge_rows(&mut self, rows_newest_first: &[FeedbackRow]) -> usize {
        self.merge_rows_inserted(rows_newest_first).len()
    }

    /// Same as [`merge_rows`](Self::merge_rows) but returns the inserted ids
    pub fn merge_rows_inserted(&mut self, rows_newest_first: &[FeedbackRow]) -> Vec<FeedbackId> {
        let mut inserted = Vec::new();
        for row in rows_newest_first.iter().rev() {
            if self.prepend_if_absent(NotificationItem::from_row(row)) {
                inserted.push(row.id);
            }
        }
        inserted
    }

    /// Remove every item; returns how many were removed
    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        removed
    }

    /// Highest feedback id currently listed
    pub fn newest_known_id(&self) -> Option<FeedbackId> {
        self.items.iter().map(|item| item.id).max()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Unread badge value, always the list length
    pub fn badge(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[NotificationItem] {
        &self.items
    }

    pub fn ids(&self) -> Vec<FeedbackId> {
        self.items.iter().map(|item| item.id).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NotificationItem> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a NotificationList {
    type Item = &'a NotificationItem;
    type IntoIter = std::slice::Iter<'a, NotificationItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Immutable view handed to observers after every change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSnapshot {
    pub items: Vec<NotificationItem>,
    pub badge: usize,
    pub dropdown_open: bool,
}

impl NotificationSnapshot {
    pub fn capture(list: &NotificationList, dropdown_open: bool) -> Self {
        Self {
            items: list.items().to_vec(),
            badge: list.badge(),
            dropdown_open,
        }
    }

    pub fn ids(&self) -> Vec<FeedbackId> {
        self.items.iter().map(|item| item.id).collect()
    }
}
