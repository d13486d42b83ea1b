//! Request interception and classification.
//!
//! Every outgoing request passes through [`RequestRouter::handle`], which
//! classifies it once and dispatches: tracked mutating endpoints go down
//! the document-post path (network first, deferred queue on transport
//! failure); everything else is network-first with cache fallback.
//! Classification is a pure function of method, path, and connectivity
//! outcome — identical inputs always route identically.

use std::sync::Arc;

use crate::cache::CacheManager;
use crate::config::AgentConfig;
use crate::error::RouterError;
use crate::http::{HttpRequest, HttpResponse, Network};
use crate::store::{DeferredRequest, DeferredStore};
use crate::sync::SyncScheduler;

/// Where a classified request is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Tracked mutating endpoint: network first, deferral on failure.
    DocumentPost,
    /// Everything else: network with cache fallback.
    NetworkFirst,
}

/// Intercepts and dispatches every outgoing request.
pub struct RequestRouter {
    network: Arc<dyn Network>,
    cache: Arc<CacheManager>,
    store: DeferredStore,
    scheduler: Arc<dyn SyncScheduler>,
    config: AgentConfig,
}

impl RequestRouter {
    /// Build a router over the shared backends.
    pub fn new(
        network: Arc<dyn Network>,
        cache: Arc<CacheManager>,
        store: DeferredStore,
        scheduler: Arc<dyn SyncScheduler>,
        config: AgentConfig,
    ) -> Self {
        Self {
            network,
            cache,
            store,
            scheduler,
            config,
        }
    }

    /// Classify a request without dispatching it.
    pub fn classify(&self, request: &HttpRequest) -> Route {
        let path = request.path();
        if request.is_mutation()
            && (path == self.config.document_endpoint || path == self.config.snapshot_endpoint)
        {
            Route::DocumentPost
        } else {
            Route::NetworkFirst
        }
    }

    /// Dispatch one intercepted request to a final response.
    ///
    /// Never produces an application error for connectivity problems: those
    /// resolve to a cached response or a synthetic 503.
    pub async fn handle(&self, request: HttpRequest) -> Result<HttpResponse, RouterError> {
        match self.classify(&request) {
            Route::DocumentPost => self.document_post(request).await,
            Route::NetworkFirst => self.network_first(request).await,
        }
    }

    async fn network_first(&self, request: HttpRequest) -> Result<HttpResponse, RouterError> {
        match self.network.fetch(&request).await {
            Ok(response) => {
                if self.should_cache(&request) {
                    self.cache.write(&request, response.clone()).await?;
                }
                Ok(response)
            }
            Err(err) => {
                log::debug!(
                    "network unreachable for {} {}: {err}",
                    request.method,
                    request.url
                );
                match self.cache.read(&request).await? {
                    Some(cached) => Ok(cached),
                    None => Ok(HttpResponse::unavailable()),
                }
            }
        }
    }

    /// Tracked-mutation entry point: deliver if possible, otherwise
    /// persist for replay.
    async fn document_post(&self, request: HttpRequest) -> Result<HttpResponse, RouterError> {
        match self.network.fetch(&request).await {
            Ok(response) => Ok(response),
            Err(err) => {
                log::debug!(
                    "deferring {} {} after transport failure: {err}",
                    request.method,
                    request.url
                );

                let key = self.extract_key(&request)?;
                self.scheduler.register(&key).await?;
                self.store
                    .upsert(&key, &DeferredRequest::capture(&request))
                    .await?;
                log::info!("queued {} {} under key {key}", request.method, request.url);

                // Synthetic 503 tells the caller "queued", distinct from a
                // delivered response.
                Ok(HttpResponse::unavailable())
            }
        }
    }

    /// Whether a delivered response is written through to the cache:
    /// API GET traffic and allow-listed image hosts, minus download paths.
    fn should_cache(&self, request: &HttpRequest) -> bool {
        if request.method != "GET" {
            return false;
        }
        let path = request.path();
        if self
            .config
            .download_prefixes
            .iter()
            .any(|p| path.starts_with(p))
        {
            return false;
        }
        if path.starts_with(&self.config.api_prefix) {
            return true;
        }
        request
            .host()
            .is_some_and(|host| self.config.image_hosts.iter().any(|h| h == host))
    }

    /// Stable deferral key for a tracked mutation: the document identifier
    /// declared in its body.
    fn extract_key(&self, request: &HttpRequest) -> Result<String, RouterError> {
        let key = if request.path() == self.config.snapshot_endpoint {
            snapshot_key(&request.body)
        } else {
            multipart_key(request)
        };
        key.ok_or_else(|| RouterError::KeyExtraction {
            url: request.url.clone(),
        })
    }
}

/// Document identifier from a snapshot-insertion JSON body (`doc` field).
fn snapshot_key(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    match value.get("doc")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Declared identifier from a document-creation multipart body
/// (form field named `id`).
fn multipart_key(request: &HttpRequest) -> Option<String> {
    let content_type = request.header("content-type")?;
    let boundary = content_type
        .split("boundary=")
        .nth(1)?
        .split(';')
        .next()?
        .trim()
        .trim_matches('"');
    if boundary.is_empty() {
        return None;
    }

    let text = String::from_utf8_lossy(&request.body);
    let delimiter = format!("--{boundary}");
    for part in text.split(delimiter.as_str()) {
        let part = part.strip_prefix("\r\n").unwrap_or(part);
        if part.is_empty() || part.starts_with("--") {
            continue;
        }
        let Some((head, value)) = part
            .split_once("\r\n\r\n")
            .or_else(|| part.split_once("\n\n"))
        else {
            continue;
        };
        let declares_id = head.lines().any(|line| {
            line.to_ascii_lowercase().starts_with("content-disposition:")
                && (line.contains("name=\"id\"") || line.contains("name=id"))
        });
        if declares_id {
            return Some(value.trim_end_matches(['\r', '\n']).to_string());
        }
    }
    None
}
