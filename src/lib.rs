//! Doctrack Sync - offline-tolerant client agent for document tracking.
//!
//! This crate implements the client-side sync engine that sits between a
//! document-tracking UI and its server: it intercepts outgoing requests,
//! serves cached content while offline, persists tracked mutations for
//! later replay, and carries the server-side web push pipeline that tells
//! evaluators about document movement.
//!
//! # Architecture
//!
//! The engine is event-driven around a single dispatcher:
//!
//! - **SyncAgent** - Entry point, dispatches host events to components
//! - **CacheManager** - Versioned asset/API caches (install/activate lifecycle)
//! - **RequestRouter** - Classifies and dispatches every intercepted request
//! - **DeferredStore** - Durable queue of mutations awaiting replay
//! - **SyncCoordinator** - Replays the queue when connectivity returns
//! - **PushCodec** - Encrypts and authorizes outbound push messages
//! - **NotificationRenderer** - Displays inbound push payloads
//!
//! # Modules
//!
//! - [`agent`] - Event dispatch and agent lifecycle
//! - [`router`] - Request interception and routing
//! - [`cache`] - Versioned content caches
//! - [`store`] - Deferred-request persistence
//! - [`sync`] - Replay coordination
//! - [`push`] - Web push encryption, VAPID, delivery
//! - [`notify`] - Notification rendering
//! - [`config`] - Agent and push configuration

pub mod agent;
pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod notify;
pub mod push;
pub mod router;
pub mod store;
pub mod sync;

// Re-export commonly used types
pub use agent::{SyncAgent, WorkerEvent};
pub use cache::{CacheManager, CacheStorage, MemoryCacheStorage};
pub use config::{AgentConfig, PushConfig};
pub use error::AgentError;
pub use http::{HttpRequest, HttpResponse, Network, ReqwestNetwork};
pub use model::{NotificationPayload, Status};
pub use notify::{NotificationHost, NotificationRenderer, Permission};
pub use push::{deliver, Delivery, PushCodec, PushSubscriptionJson, PushSubscriptionRecord, VapidKeys};
pub use router::RequestRouter;
pub use store::{DeferredRequest, DeferredStore, FileKv, KeyValue, MemoryKv};
pub use sync::{SyncCoordinator, SyncScheduler, UiBroadcast};
