//! Error taxonomy for the sync engine.
//!
//! Each component has its own error enum; the agent-level [`AgentError`]
//! wraps them at the event dispatch boundary. Transport failures are the
//! only recoverable class: they trigger cache fallback or deferral and are
//! never surfaced to the caller as an application error.

use thiserror::Error;

/// The request never produced an HTTP response (DNS, connect, TLS, or a
/// mid-stream drop). An HTTP error status is *not* a transport failure.
#[derive(Debug, Clone, Error)]
#[error("transport failure: {reason}")]
pub struct TransportError {
    /// Backend-supplied failure description.
    pub reason: String,
}

impl TransportError {
    /// Wrap a backend failure description.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Cache lifecycle and storage failures.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Precaching is all-or-nothing: one unfetchable asset fails install.
    #[error("failed to precache {url}: {reason}")]
    Precache { url: String, reason: String },
    /// A stale generation survived the activation sweep. The agent must not
    /// become active with mixed cache generations.
    #[error("stale cache generation {generation} could not be deleted")]
    StaleGeneration { generation: String },
    /// Underlying storage failure.
    #[error("cache storage failure: {0}")]
    Storage(String),
}

/// Deferred-queue persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying key-value backend failure.
    #[error("storage backend failure: {0}")]
    Backend(String),
    /// A persisted record failed schema validation. This signals data
    /// corruption and aborts the whole read cycle.
    #[error("malformed deferred record under key {key}: {reason}")]
    MalformedRecord { key: String, reason: String },
}

/// Replay coordination failures.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The connectivity-restoration facility refused the tag. Without the
    /// tag there is no durable signal that a replay is owed.
    #[error("sync tag {tag} was not accepted by the scheduler")]
    TagRejected { tag: String },
    /// Deferred-queue access failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Request routing failures.
#[derive(Debug, Error)]
pub enum RouterError {
    /// A tracked mutation carried a body the key extractor does not
    /// recognize, so no deferral key could be derived.
    #[error("cannot derive a deferral key from {url}")]
    KeyExtraction { url: String },
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Push encoding and delivery failures.
#[derive(Debug, Error)]
pub enum PushError {
    /// The subscription lacks required key material. Rejected before any
    /// network call, never silently ignored.
    #[error("subscription is missing required key material: {0}")]
    CryptoPrecondition(String),
    /// VAPID key material could not be decoded or validated.
    #[error("invalid VAPID key material: {0}")]
    InvalidKey(String),
    /// Payload serialization failed.
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    /// AEAD or key-derivation failure.
    #[error("encryption failed: {0}")]
    Encrypt(String),
    /// Authorization token could not be signed.
    #[error("authorization token signing failed: {0}")]
    Sign(String),
    /// The subscriber endpoint is not a usable URL.
    #[error("invalid push endpoint {endpoint}: {reason}")]
    Endpoint { endpoint: String, reason: String },
    /// The relay answered with a non-success status other than 410 Gone.
    #[error("push relay refused the message (HTTP {status})")]
    Relay { status: u16 },
    /// The relay was unreachable.
    #[error("push delivery transport failure: {0}")]
    Transport(String),
}

/// Notification rendering failures.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The inbound push payload is not a valid notification.
    #[error("push payload is not a valid notification: {0}")]
    Payload(#[from] serde_json::Error),
    /// The host facility failed to display the notification.
    #[error("notification display failed: {0}")]
    Display(String),
}

/// Top-level error for the agent event dispatcher.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Router(#[from] RouterError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
}
