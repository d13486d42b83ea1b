//! Deferred-request replay on connectivity restoration.
//!
//! When the host signals that the network is back, [`SyncCoordinator`]
//! drains the deferred queue, fires every replay concurrently, waits for
//! all outcomes, and tells the UI contexts a cycle finished. Entries whose
//! replay never reached the server are re-queued for the next signal;
//! entries the server received stay cleared even when it rejected them,
//! since retrying a business rejection forever would loop.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio::sync::RwLock;

use crate::error::SyncError;
use crate::http::Network;
use crate::store::DeferredStore;

/// Message broadcast to UI contexts when a replay cycle finishes.
pub const SYNC_COMPLETE: &str = "sync";

/// Connectivity-restoration facility: a durable registry of tags marking
/// "a replay is owed for this key", surviving process restarts.
#[async_trait]
pub trait SyncScheduler: Send + Sync {
    /// Register a tag. Rejection must surface as an error, never be
    /// silently ignored.
    async fn register(&self, tag: &str) -> Result<(), SyncError>;
    /// List registered tags.
    async fn tags(&self) -> Result<Vec<String>, SyncError>;
}

/// In-memory scheduler for tests and single-process embedding.
#[derive(Debug, Default)]
pub struct MemoryScheduler {
    tags: RwLock<Vec<String>>,
}

impl MemoryScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncScheduler for MemoryScheduler {
    async fn register(&self, tag: &str) -> Result<(), SyncError> {
        let mut tags = self.tags.write().await;
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
        Ok(())
    }

    async fn tags(&self) -> Result<Vec<String>, SyncError> {
        Ok(self.tags.read().await.clone())
    }
}

/// Sink for messages broadcast to active UI contexts.
#[async_trait]
pub trait UiBroadcast: Send + Sync {
    /// Post one message to every listening context.
    async fn post(&self, message: &str);
}

/// Broadcast sink that records messages, for tests and single-process
/// embedding.
#[derive(Debug, Default)]
pub struct MemoryBroadcast {
    messages: RwLock<Vec<String>>,
}

impl MemoryBroadcast {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages posted so far.
    pub async fn messages(&self) -> Vec<String> {
        self.messages.read().await.clone()
    }
}

#[async_trait]
impl UiBroadcast for MemoryBroadcast {
    async fn post(&self, message: &str) {
        self.messages.write().await.push(message.to_string());
    }
}

/// Drives one replay cycle per connectivity-restoration signal.
pub struct SyncCoordinator {
    network: Arc<dyn Network>,
    store: DeferredStore,
    broadcast: Arc<dyn UiBroadcast>,
}

impl SyncCoordinator {
    /// Build a coordinator over the shared backends.
    pub fn new(
        network: Arc<dyn Network>,
        store: DeferredStore,
        broadcast: Arc<dyn UiBroadcast>,
    ) -> Self {
        Self {
            network,
            store,
            broadcast,
        }
    }

    /// Run one replay cycle.
    ///
    /// All pending entries are replayed concurrently and every outcome is
    /// awaited — a failure never short-circuits the rest. The store is then
    /// cleared and the transport-failed subset re-queued. Returns how many
    /// entries were handed to the server.
    pub async fn on_sync(&self) -> Result<usize, SyncError> {
        let entries = self.store.load_all().await?;
        if entries.is_empty() {
            self.broadcast.post(SYNC_COMPLETE).await;
            return Ok(0);
        }
        log::info!("replaying {} deferred requests", entries.len());

        let replays = entries.into_iter().map(|(key, record)| {
            let network = Arc::clone(&self.network);
            async move {
                let outcome = network.fetch(&record.to_request()).await;
                (key, record, outcome)
            }
        });
        let outcomes = join_all(replays).await;

        self.store.clear().await?;

        let mut delivered = 0;
        for (key, record, outcome) in outcomes {
            match outcome {
                Ok(response) => {
                    delivered += 1;
                    if !response.is_success() {
                        log::warn!(
                            "replay for {key} rejected by the server (HTTP {})",
                            response.status
                        );
                    }
                }
                Err(err) => {
                    log::warn!("replay for {key} never reached the server: {err}; re-queued");
                    self.store.upsert(&key, &record).await?;
                }
            }
        }

        self.broadcast.post(SYNC_COMPLETE).await;
        Ok(delivered)
    }
}
