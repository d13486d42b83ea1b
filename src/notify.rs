//! Inbound push rendering and the permission prompt loop.
//!
//! The renderer decodes a push payload and asks the host facility to
//! display it. An undetermined permission state is prompted again and
//! again until the user gives an explicit answer; an explicit denial
//! returns without displaying and without further prompts.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::model::{NotificationPayload, Status};

/// Host notification permission state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// User accepted notifications.
    Granted,
    /// User refused notifications.
    Denied,
    /// User has not answered yet.
    Undetermined,
}

/// Host notification facility.
#[async_trait]
pub trait NotificationHost: Send + Sync {
    /// Current permission state.
    async fn permission(&self) -> Permission;
    /// Prompt the user; may come back `Undetermined` when dismissed.
    async fn request_permission(&self) -> Permission;
    /// Display a notification.
    async fn show(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}

/// Decodes push payloads and displays them through the host facility.
pub struct NotificationRenderer {
    host: Arc<dyn NotificationHost>,
}

impl NotificationRenderer {
    /// Build a renderer over a host facility.
    pub fn new(host: Arc<dyn NotificationHost>) -> Self {
        Self { host }
    }

    /// Decode an inbound push payload and display it once permission is
    /// explicitly granted. Returns whether a notification was shown.
    pub async fn render(&self, payload: &[u8]) -> Result<bool, NotifyError> {
        let payload: NotificationPayload = serde_json::from_slice(payload)?;
        let body = message_body(&payload);

        let mut permission = self.host.permission().await;
        loop {
            match permission {
                Permission::Granted => {
                    self.host.show(&payload.title, &body).await?;
                    return Ok(true);
                }
                Permission::Denied => return Ok(false),
                Permission::Undetermined => {
                    permission = self.host.request_permission().await;
                }
            }
        }
    }
}

/// Notification body for a payload, keyed by snapshot status.
pub fn message_body(payload: &NotificationPayload) -> String {
    let NotificationPayload {
        title,
        evaluator,
        target,
        status,
        ..
    } = payload;
    match (status, target) {
        (Status::Register, _) => format!("{evaluator} has registered \"{title}\"."),
        (Status::Send, Some(target)) => {
            format!("{evaluator} has sent \"{title}\" to \"{target}\".")
        }
        (Status::Send, None) => format!("{evaluator} has sent \"{title}\"."),
        (Status::Receive, Some(target)) => {
            format!("{evaluator} has received \"{title}\" on behalf of \"{target}\".")
        }
        (Status::Receive, None) => format!("{evaluator} has received \"{title}\"."),
        (Status::Terminate, _) => format!("{evaluator} has terminated \"{title}\"."),
    }
}
