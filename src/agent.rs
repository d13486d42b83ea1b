//! Agent lifecycle and event dispatch.
//!
//! [`SyncAgent`] is the single entry point the host drives: it receives
//! lifecycle, fetch, push, and sync events and hands each to the owning
//! component. Only fetch events produce a response.

use std::sync::Arc;

use crate::cache::CacheManager;
use crate::error::AgentError;
use crate::http::{HttpRequest, HttpResponse};
use crate::notify::NotificationRenderer;
use crate::router::RequestRouter;
use crate::sync::SyncCoordinator;

/// Events the host delivers to the agent.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A new agent version was installed; precache its assets.
    Install,
    /// The agent became the active version; drop stale cache generations.
    Activate,
    /// An outgoing request was intercepted.
    Fetch(HttpRequest),
    /// An encrypted push message arrived, already decrypted by the host.
    Push(Vec<u8>),
    /// Connectivity was restored for a registered tag.
    Sync { tag: String },
}

/// Drives the whole engine off the host's event stream.
pub struct SyncAgent {
    cache: Arc<CacheManager>,
    router: RequestRouter,
    coordinator: SyncCoordinator,
    renderer: NotificationRenderer,
}

impl SyncAgent {
    /// Assemble the agent from its components.
    pub fn new(
        cache: Arc<CacheManager>,
        router: RequestRouter,
        coordinator: SyncCoordinator,
        renderer: NotificationRenderer,
    ) -> Self {
        Self {
            cache,
            router,
            coordinator,
            renderer,
        }
    }

    /// Dispatch one host event. Returns a response only for fetch events.
    pub async fn handle(&self, event: WorkerEvent) -> Result<Option<HttpResponse>, AgentError> {
        match event {
            WorkerEvent::Install => {
                log::info!("installing cache generation {}", self.cache.version());
                self.cache.install().await?;
                Ok(None)
            }
            WorkerEvent::Activate => {
                log::info!("activating cache generation {}", self.cache.version());
                self.cache.activate().await?;
                Ok(None)
            }
            WorkerEvent::Fetch(request) => {
                let response = self.router.handle(request).await?;
                Ok(Some(response))
            }
            WorkerEvent::Push(payload) => {
                match self.renderer.render(&payload).await {
                    Ok(shown) => log::debug!("push rendered, displayed: {shown}"),
                    // a malformed push must not take the agent down
                    Err(err) => log::warn!("dropping undisplayable push: {err}"),
                }
                Ok(None)
            }
            WorkerEvent::Sync { tag } => {
                log::debug!("sync signal for tag {tag}");
                let delivered = self.coordinator.on_sync().await?;
                log::info!("sync cycle for {tag} delivered {delivered} requests");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStorage, MemoryCacheStorage};
    use crate::config::AgentConfig;
    use crate::error::TransportError;
    use crate::http::Network;
    use crate::notify::{NotificationHost, Permission};
    use crate::store::{DeferredStore, MemoryKv};
    use crate::sync::{MemoryBroadcast, MemoryScheduler, SyncScheduler, UiBroadcast};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct SwitchedNetwork {
        online: AtomicBool,
    }

    #[async_trait]
    impl Network for SwitchedNetwork {
        async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            if self.online.load(Ordering::SeqCst) {
                Ok(HttpResponse::ok(format!("net:{}", request.url)))
            } else {
                Err(TransportError::new("offline"))
            }
        }
    }

    struct SilentHost;

    #[async_trait]
    impl NotificationHost for SilentHost {
        async fn permission(&self) -> Permission {
            Permission::Denied
        }
        async fn request_permission(&self) -> Permission {
            Permission::Denied
        }
        async fn show(&self, _: &str, _: &str) -> Result<(), crate::error::NotifyError> {
            Ok(())
        }
    }

    fn agent(network: Arc<SwitchedNetwork>) -> (SyncAgent, DeferredStore) {
        let config = AgentConfig {
            cache_version: "v1".to_string(),
            precache_manifest: vec!["/index.html".to_string()],
            ..AgentConfig::default()
        };
        let storage = Arc::new(MemoryCacheStorage::new());
        let cache = Arc::new(CacheManager::new(
            storage as Arc<dyn CacheStorage>,
            Arc::clone(&network) as Arc<dyn Network>,
            &config,
        ));
        let store = DeferredStore::new(Arc::new(MemoryKv::new()));
        let router = RequestRouter::new(
            Arc::clone(&network) as Arc<dyn Network>,
            Arc::clone(&cache),
            store.clone(),
            Arc::new(MemoryScheduler::new()) as Arc<dyn SyncScheduler>,
            config,
        );
        let coordinator = SyncCoordinator::new(
            network as Arc<dyn Network>,
            store.clone(),
            Arc::new(MemoryBroadcast::new()) as Arc<dyn UiBroadcast>,
        );
        let renderer = NotificationRenderer::new(Arc::new(SilentHost));
        (SyncAgent::new(cache, router, coordinator, renderer), store)
    }

    #[tokio::test]
    async fn test_lifecycle_then_fetch_then_sync() {
        let network = Arc::new(SwitchedNetwork::default());
        network.online.store(true, Ordering::SeqCst);
        let (agent, store) = agent(Arc::clone(&network));

        assert!(agent.handle(WorkerEvent::Install).await.unwrap().is_none());
        assert!(agent.handle(WorkerEvent::Activate).await.unwrap().is_none());

        // offline tracked mutation queues and answers 503
        network.online.store(false, Ordering::SeqCst);
        let request = HttpRequest::post("/api/snapshot")
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"doc":"D1","status":"Send"}"#.to_string());
        let response = agent
            .handle(WorkerEvent::Fetch(request))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.status, 503);
        assert!(!store.is_empty().await.unwrap());

        // connectivity returns, the sync event drains the queue
        network.online.store(true, Ordering::SeqCst);
        agent
            .handle(WorkerEvent::Sync {
                tag: "D1".to_string(),
            })
            .await
            .unwrap();
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_push_is_swallowed() {
        let network = Arc::new(SwitchedNetwork::default());
        let (agent, _) = agent(network);
        let outcome = agent
            .handle(WorkerEvent::Push(b"garbage".to_vec()))
            .await
            .unwrap();
        assert!(outcome.is_none());
    }
}
