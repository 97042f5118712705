//! # Feedback rows
//!
//! The subset of a feedback record the notification feed reads. Rows arrive
//! either from the push channel as JSON payloads or from the fallback query.
//!
//! Realtime payloads come in two shapes: the bare row, or an envelope with the
//! row under `record` (or `new`) as hosted realtime services emit them.
//!
//! ```rust
//! use jeepney_notify::feedback::FeedbackRow;
//!
//! let row = FeedbackRow::from_payload(r#"{"record": {"id": 7, "first_name": "Ana"}}"#).unwrap();
//! assert_eq!(row.id, 7);
//! assert_eq!(row.display_name(), "Ana");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{NotifyError, Result};

/// Identifier of a feedback record, owned by the data store
pub type FeedbackId = i64;

/// Shown when a row carries no name at all
pub const ANONYMOUS_SENDER: &str = "Anonymous";

/// Feedback columns used to build a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FeedbackRow {
    pub id: FeedbackId,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl FeedbackRow {
    pub fn new(id: FeedbackId) -> Self {
        Self {
            id,
            first_name: None,
            last_name: None,
            created_at: None,
        }
    }

    pub fn with_name<F: Into<String>, L: Into<String>>(mut self, first: F, last: L) -> Self {
        self.first_name = Some(first.into());
        self.last_name = Some(last.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Decode a push-channel payload
    ///
    /// Missing name or timestamp fields are tolerated. A payload that is not
    /// JSON, or has no integer `id`, is malformed.
    pub fn from_payload(payload: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| NotifyError::malformed(format!("payload is not JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Decode a row that was already parsed as JSON
    pub fn from_value(value: Value) -> Result<Self> {
        let row = match value {
            Value::Object(mut map) => {
                let inner = map.remove("record").or_else(|| map.remove("new"));
                match inner {
                    Some(row @ Value::Object(_)) => row,
                    Some(other) => {
                        return Err(NotifyError::malformed(format!(
                            "row envelope is not an object: {other}"
                        )))
                    }
                    None => Value::Object(map),
                }
            }
            other => {
                return Err(NotifyError::malformed(format!(
                    "payload is not an object: {other}"
                )))
            }
        };

        match row.get("id") {
            Some(id) if id.is_i64() => {}
            Some(id) => return Err(NotifyError::malformed(format!("id is not an integer: {id}"))),
            None => return Err(NotifyError::malformed("payload has no id")),
        }

        // Name fields that are present but not strings decode as absent
        let mut row = row;
        if let Value::Object(map) = &mut row {
            for key in ["first_name", "last_name"] {
                if map.get(key).is_some_and(|v| !v.is_string()) {
                    map.remove(key);
                }
            }
            if map
                .get("created_at")
                .is_some_and(|v| serde_json::from_value::<DateTime<Utc>>(v.clone()).is_err())
            {
                map.remove("created_at");
            }
        }

        Ok(serde_json::from_value(row)?)
    }

    /// "First Last", whichever parts exist, or [`ANONYMOUS_SENDER`]
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();

        if parts.is_empty() {
            ANONYMOUS_SENDER.to_string()
        } else {
            parts.join(" ")
        }
    }
}
