//! Engine configuration.
//!
//! [`AgentConfig`] mirrors the build-time constants of the client agent
//! (cache version token, asset manifest, routing tables); [`PushConfig`]
//! holds the server-side push identity. Both persist as JSON files.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::push::VapidKeys;

/// Relay retention for undeliverable messages, in seconds.
const DEFAULT_TTL_SECS: u32 = 10;

/// Client-agent configuration: cache identity and routing tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Version token naming the current cache generation.
    pub cache_version: String,
    /// Asset URLs precached on install.
    pub precache_manifest: Vec<String>,
    /// Path prefix identifying API traffic eligible for write-through caching.
    pub api_prefix: String,
    /// Allow-listed external image hosts whose responses are cached
    /// (OAuth avatar CDN).
    pub image_hosts: Vec<String>,
    /// Download-class path prefixes excluded from caching.
    pub download_prefixes: Vec<String>,
    /// Tracked mutation endpoint: document creation (multipart body).
    pub document_endpoint: String,
    /// Tracked mutation endpoint: snapshot insertion (JSON body).
    pub snapshot_endpoint: String,
    /// Filename served for directory-root requests.
    pub default_document: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            cache_version: "dev".to_string(),
            precache_manifest: Vec::new(),
            api_prefix: "/api/".to_string(),
            image_hosts: vec!["lh3.googleusercontent.com".to_string()],
            download_prefixes: vec!["/api/document/download".to_string()],
            document_endpoint: "/api/document".to_string(),
            snapshot_endpoint: "/api/snapshot".to_string(),
            default_document: "index.html".to_string(),
        }
    }
}

impl AgentConfig {
    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid agent config in {}", path.display()))
    }

    /// Persist to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self).context("failed to serialize agent config")?;
        fs::write(path, raw).with_context(|| format!("failed to write {}", path.display()))
    }
}

/// Server-side push configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Operator contact for the authorization token's `sub` claim
    /// (a `mailto:` URL).
    pub contact: String,
    /// Relay retention in seconds for undeliverable messages.
    pub ttl_seconds: u32,
    /// VAPID key material.
    pub vapid: VapidKeys,
}

impl PushConfig {
    /// Build a configuration around existing key material.
    pub fn new(contact: impl Into<String>, vapid: VapidKeys) -> Self {
        Self {
            contact: contact.into(),
            ttl_seconds: DEFAULT_TTL_SECS,
            vapid,
        }
    }

    /// Build a configuration with freshly generated keys.
    pub fn generate(contact: impl Into<String>) -> Self {
        Self::new(contact, VapidKeys::generate())
    }

    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid push config in {}", path.display()))
    }

    /// Persist to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self).context("failed to serialize push config")?;
        fs::write(path, raw).with_context(|| format!("failed to write {}", path.display()))
    }
}
