//! Versioned content caches for static assets and API reads.
//!
//! Each deploy ships a new version token; `install` precaches the asset
//! manifest into the generation named by that token and `activate` deletes
//! every other generation. Exactly one generation is current at any time.
//! API GET responses are written through the same generation cache-aside,
//! last write wins per URL.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio::sync::RwLock;

use crate::config::AgentConfig;
use crate::error::CacheError;
use crate::http::{HttpRequest, HttpResponse, Network};

/// Backing storage for versioned caches.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Insert or overwrite an entry in a generation, creating the
    /// generation if needed.
    async fn put(
        &self,
        generation: &str,
        url: &str,
        response: HttpResponse,
    ) -> Result<(), CacheError>;

    /// Look up an entry in a generation.
    async fn get(&self, generation: &str, url: &str) -> Result<Option<HttpResponse>, CacheError>;

    /// List all generation keys.
    async fn generations(&self) -> Result<Vec<String>, CacheError>;

    /// Delete a whole generation. Returns whether it existed.
    async fn delete_generation(&self, generation: &str) -> Result<bool, CacheError>;
}

/// In-memory cache storage for tests and single-process embedding.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    caches: RwLock<HashMap<String, HashMap<String, HttpResponse>>>,
}

impl MemoryCacheStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn put(
        &self,
        generation: &str,
        url: &str,
        response: HttpResponse,
    ) -> Result<(), CacheError> {
        let mut caches = self.caches.write().await;
        caches
            .entry(generation.to_string())
            .or_default()
            .insert(url.to_string(), response);
        Ok(())
    }

    async fn get(&self, generation: &str, url: &str) -> Result<Option<HttpResponse>, CacheError> {
        let caches = self.caches.read().await;
        Ok(caches
            .get(generation)
            .and_then(|entries| entries.get(url))
            .cloned())
    }

    async fn generations(&self) -> Result<Vec<String>, CacheError> {
        let caches = self.caches.read().await;
        Ok(caches.keys().cloned().collect())
    }

    async fn delete_generation(&self, generation: &str) -> Result<bool, CacheError> {
        let mut caches = self.caches.write().await;
        Ok(caches.remove(generation).is_some())
    }
}

/// Owns the current cache generation and its lifecycle.
pub struct CacheManager {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    version: String,
    manifest: Vec<String>,
    download_prefixes: Vec<String>,
    default_document: String,
}

impl CacheManager {
    /// Build a manager over the given storage and network backends.
    pub fn new(storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>, config: &AgentConfig) -> Self {
        Self {
            storage,
            network,
            version: config.cache_version.clone(),
            manifest: config.precache_manifest.clone(),
            download_prefixes: config.download_prefixes.clone(),
            default_document: config.default_document.clone(),
        }
    }

    /// The version token naming the current generation.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Precache every manifest asset into the current generation.
    ///
    /// All-or-nothing: the first asset that cannot be fetched (transport
    /// failure or non-success status) fails the whole install. A path
    /// ending in the default-document filename is also inserted under its
    /// parent directory root, so directory-root requests hit the cache.
    pub async fn install(&self) -> Result<(), CacheError> {
        let fetches = self.manifest.iter().map(|url| {
            let network = Arc::clone(&self.network);
            async move { (url.as_str(), network.fetch(&HttpRequest::get(url)).await) }
        });

        // every asset must be fetchable before anything is inserted, so a
        // failed install never leaves a partial generation behind
        let mut assets = Vec::with_capacity(self.manifest.len());
        for (url, outcome) in join_all(fetches).await {
            let response = outcome.map_err(|e| CacheError::Precache {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            if !response.is_success() {
                return Err(CacheError::Precache {
                    url: url.to_string(),
                    reason: format!("HTTP {}", response.status),
                });
            }
            assets.push((url, response));
        }

        for (url, response) in assets {
            if let Some(root) = self.directory_root(url) {
                self.storage
                    .put(&self.version, &root, response.clone())
                    .await?;
            }
            self.storage.put(&self.version, url, response).await?;
        }

        log::info!(
            "precached {} assets into generation {}",
            self.manifest.len(),
            self.version
        );
        Ok(())
    }

    /// Delete every generation other than the current one.
    ///
    /// Deletions are materialized eagerly and run concurrently; any
    /// deletion that reports failure is fatal, since the agent must not
    /// become active over mixed cache generations.
    pub async fn activate(&self) -> Result<(), CacheError> {
        let generations = self.storage.generations().await?;
        let stale: Vec<String> = generations
            .into_iter()
            .filter(|generation| generation != &self.version)
            .collect();

        let deletions = stale.iter().map(|generation| {
            let storage = Arc::clone(&self.storage);
            async move { (generation.as_str(), storage.delete_generation(generation).await) }
        });

        for (generation, outcome) in join_all(deletions).await {
            if !outcome? {
                return Err(CacheError::StaleGeneration {
                    generation: generation.to_string(),
                });
            }
            log::debug!("deleted stale cache generation {generation}");
        }
        Ok(())
    }

    /// Cache-aside read from the current generation.
    pub async fn read(&self, request: &HttpRequest) -> Result<Option<HttpResponse>, CacheError> {
        self.storage.get(&self.version, &request.url).await
    }

    /// Cache-aside write into the current generation.
    ///
    /// Download-class paths are never cached; the write is silently
    /// skipped for them. Any prior entry for the same URL is overwritten.
    pub async fn write(
        &self,
        request: &HttpRequest,
        response: HttpResponse,
    ) -> Result<(), CacheError> {
        let path = request.path();
        if self.download_prefixes.iter().any(|p| path.starts_with(p)) {
            log::debug!("not caching download-class path {path}");
            return Ok(());
        }
        self.storage.put(&self.version, &request.url, response).await
    }

    /// Parent directory root for manifest paths ending in the
    /// default-document filename.
    fn directory_root(&self, url: &str) -> Option<String> {
        let suffix = format!("/{}", self.default_document);
        url.strip_suffix(&suffix)
            .map(|parent| format!("{parent}/"))
    }
}
