//! Notification payload model shared by the push codec and the renderer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle stage a document snapshot records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Document entered the system.
    Register,
    /// Document dispatched to another office.
    Send,
    /// Document accepted by the receiving office.
    Receive,
    /// Document lifecycle ended.
    Terminate,
}

/// Payload carried by one push notification.
///
/// Constructed per delivery and never persisted; the codec serializes it
/// into the encrypted message body and the renderer decodes it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Document title.
    pub title: String,
    /// When the snapshot was created.
    pub creation: DateTime<Utc>,
    /// Display name of the staff member who evaluated the document.
    pub evaluator: String,
    /// Office the evaluator acted on behalf of, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Snapshot status driving the message template.
    pub status: Status,
}
