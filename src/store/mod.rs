//! Durable persistence for deferred mutating requests.
//!
//! The backing store is any key-value collaborator implementing
//! [`KeyValue`]; [`DeferredStore`] layers the record schema on top. At most
//! one record exists per document/operation key — a later write for the
//! same key replaces the earlier one, which keeps superseded mutations from
//! ever being replayed.

pub mod fs;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

pub use fs::FileKv;

use crate::error::StoreError;
use crate::http::{CredentialsMode, HttpRequest};

/// Asynchronous key-value collaborator (the durable storage facility of
/// the host environment).
#[async_trait]
pub trait KeyValue: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    /// Write a value, replacing any existing one.
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
    /// Delete a key; deleting a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
    /// List all keys.
    async fn keys(&self) -> Result<Vec<String>, StoreError>;
    /// Delete every entry.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// In-memory key-value store for tests and single-process embedding.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryKv {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValue for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.entries.write().await.clear();
        Ok(())
    }
}

/// One persisted mutating request awaiting replay.
///
/// The schema matches what the original client queued: credentials mode,
/// URL, method, ordered headers, and the body captured as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferredRequest {
    /// Credentials mode of the original request.
    pub credentials: CredentialsMode,
    /// Target URL.
    pub url: String,
    /// Method verb.
    pub method: String,
    /// Ordered header pairs.
    pub headers: Vec<(String, String)>,
    /// Body as text.
    pub body: String,
}

impl DeferredRequest {
    /// Capture a live request for persistence.
    pub fn capture(request: &HttpRequest) -> Self {
        Self {
            credentials: request.credentials,
            url: request.url.clone(),
            method: request.method.clone(),
            headers: request.headers.clone(),
            body: String::from_utf8_lossy(&request.body).into_owned(),
        }
    }

    /// Reconstruct a live request for replay.
    pub fn to_request(&self) -> HttpRequest {
        HttpRequest {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: self.body.clone().into_bytes().into(),
            credentials: self.credentials,
        }
    }
}

/// The deferred-request queue: schema-validated records over a [`KeyValue`]
/// backend, keyed by document/operation identifier.
#[derive(Clone)]
pub struct DeferredStore {
    kv: Arc<dyn KeyValue>,
}

impl DeferredStore {
    /// Wrap a key-value backend.
    pub fn new(kv: Arc<dyn KeyValue>) -> Self {
        Self { kv }
    }

    /// Insert or replace the record for a key.
    pub async fn upsert(&self, key: &str, record: &DeferredRequest) -> Result<(), StoreError> {
        let value = serde_json::to_string(record).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.kv.set(key, value).await
    }

    /// Read one record, validating its schema.
    pub async fn get(&self, key: &str) -> Result<Option<DeferredRequest>, StoreError> {
        match self.kv.get(key).await? {
            Some(raw) => Ok(Some(Self::parse(key, &raw)?)),
            None => Ok(None),
        }
    }

    /// Read every record.
    ///
    /// A record failing schema validation aborts the whole cycle with
    /// [`StoreError::MalformedRecord`] — corruption is surfaced, never
    /// silently skipped.
    pub async fn load_all(&self) -> Result<Vec<(String, DeferredRequest)>, StoreError> {
        let mut records = Vec::new();
        for key in self.kv.keys().await? {
            if let Some(raw) = self.kv.get(&key).await? {
                let record = Self::parse(&key, &raw)?;
                records.push((key, record));
            }
        }
        Ok(records)
    }

    /// Delete every record.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.kv.clear().await
    }

    /// Number of pending records.
    pub async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.kv.keys().await?.len())
    }

    /// Whether the queue is empty.
    pub async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }

    fn parse(key: &str, raw: &str) -> Result<DeferredRequest, StoreError> {
        serde_json::from_str(raw).map_err(|e| StoreError::MalformedRecord {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(body: &str) -> DeferredRequest {
        DeferredRequest {
            credentials: CredentialsMode::SameOrigin,
            url: "/api/snapshot?office=1".to_string(),
            method: "POST".to_string(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_record_for_same_key() {
        let store = DeferredStore::new(Arc::new(MemoryKv::new()));

        store.upsert("D1", &record(r#"{"doc":"D1","rev":1}"#)).await.unwrap();
        store.upsert("D1", &record(r#"{"doc":"D1","rev":2}"#)).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 1);
        let stored = store.get("D1").await.unwrap().unwrap();
        assert_eq!(stored.body, r#"{"doc":"D1","rev":2}"#);
    }

    #[tokio::test]
    async fn test_independent_keys_coexist() {
        let store = DeferredStore::new(Arc::new(MemoryKv::new()));

        store.upsert("D1", &record("one")).await.unwrap();
        store.upsert("D2", &record("two")).await.unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 2);

        store.clear().await.unwrap();
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_record_aborts_read_cycle() {
        let kv = Arc::new(MemoryKv::new());
        let store = DeferredStore::new(Arc::clone(&kv) as Arc<dyn KeyValue>);

        store.upsert("D1", &record("fine")).await.unwrap();
        kv.set("D2", "{not json".to_string()).await.unwrap();

        let err = store.load_all().await.unwrap_err();
        assert!(matches!(err, StoreError::MalformedRecord { ref key, .. } if key == "D2"));
    }

    #[tokio::test]
    async fn test_capture_and_replay_roundtrip() {
        let original = HttpRequest::post("/api/snapshot?office=1")
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"doc":"D1"}"#)
            .with_credentials(CredentialsMode::Include);

        let captured = DeferredRequest::capture(&original);
        let replayed = captured.to_request();
        assert_eq!(replayed, original);
    }
}
