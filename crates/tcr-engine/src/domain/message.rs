//! User-facing progress messages carried by the report bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity/category of a report message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Normal,
    Info,
    Title,
    Warning,
    Error,
    Notification,
    Event,
}

/// Immutable progress message: created by a producer, fanned out to every
/// subscriber, never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Build a message stamped with the current time.
    pub fn new(kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}
