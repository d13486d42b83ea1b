//! End-to-end offline cycle: an intercepted mutation is queued while the
//! server is unreachable, then replayed with its original body once a sync
//! signal arrives, against a real HTTP server.

use std::sync::Arc;

use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctrack_sync::cache::{CacheManager, CacheStorage, MemoryCacheStorage};
use doctrack_sync::config::AgentConfig;
use doctrack_sync::http::{HttpRequest, Network, ReqwestNetwork};
use doctrack_sync::router::RequestRouter;
use doctrack_sync::store::{DeferredStore, MemoryKv};
use doctrack_sync::sync::{MemoryBroadcast, MemoryScheduler, SyncCoordinator, SyncScheduler, UiBroadcast, SYNC_COMPLETE};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct Harness {
    router: RequestRouter,
    coordinator: SyncCoordinator,
    store: DeferredStore,
    scheduler: Arc<MemoryScheduler>,
    broadcast: Arc<MemoryBroadcast>,
}

/// Engine wired to the real reqwest backend.
fn harness() -> Harness {
    let config = AgentConfig {
        cache_version: "v1".to_string(),
        document_endpoint: "/api/document".to_string(),
        snapshot_endpoint: "/api/snapshot".to_string(),
        ..AgentConfig::default()
    };
    let network: Arc<dyn Network> = Arc::new(ReqwestNetwork::new());
    let storage = Arc::new(MemoryCacheStorage::new());
    let cache = Arc::new(CacheManager::new(
        storage as Arc<dyn CacheStorage>,
        Arc::clone(&network),
        &config,
    ));
    let store = DeferredStore::new(Arc::new(MemoryKv::new()));
    let scheduler = Arc::new(MemoryScheduler::new());
    let broadcast = Arc::new(MemoryBroadcast::new());

    let router = RequestRouter::new(
        Arc::clone(&network),
        cache,
        store.clone(),
        Arc::clone(&scheduler) as Arc<dyn SyncScheduler>,
        config,
    );
    let coordinator = SyncCoordinator::new(
        network,
        store.clone(),
        Arc::clone(&broadcast) as Arc<dyn UiBroadcast>,
    );

    Harness {
        router,
        coordinator,
        store,
        scheduler,
        broadcast,
    }
}

fn snapshot_post(server_uri: &str, body: &str) -> HttpRequest {
    HttpRequest::post(format!("{server_uri}/api/snapshot"))
        .with_header("Content-Type", "application/json")
        .with_body(body.to_string())
}

#[tokio::test]
async fn test_offline_mutation_is_queued_then_replayed_verbatim() {
    init_logging();

    // reserve an address, then release it to simulate offline
    // (a pooled `MockServer::start()` server keeps listening after drop,
    // so bind a plain listener instead and close it)
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let uri = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let hx = harness();
    let body = r#"{"doc":"D1","status":"Send","evaluator":"Alice"}"#;

    let response = hx.router.handle(snapshot_post(&uri, body)).await.unwrap();
    assert_eq!(response.status, 503);

    let queued = hx.store.load_all().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].0, "D1");
    assert_eq!(hx.scheduler.tags().await.unwrap(), vec!["D1"]);

    // the server comes back on the same address
    let server = MockServer::builder()
        .listener(std::net::TcpListener::bind(uri.trim_start_matches("http://")).unwrap())
        .start()
        .await;
    Mock::given(method("POST"))
        .and(path("/api/snapshot"))
        .and(header("Content-Type", "application/json"))
        .and(body_string(body))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let delivered = hx.coordinator.on_sync().await.unwrap();
    assert_eq!(delivered, 1);
    assert!(hx.store.is_empty().await.unwrap());
    assert_eq!(hx.broadcast.messages().await, vec![SYNC_COMPLETE.to_string()]);
}

#[tokio::test]
async fn test_online_mutation_passes_straight_through() {
    init_logging();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/snapshot"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let hx = harness();
    let response = hx
        .router
        .handle(snapshot_post(&server.uri(), r#"{"doc":"D1"}"#))
        .await
        .unwrap();

    assert_eq!(response.status, 201);
    assert!(hx.store.is_empty().await.unwrap());
    assert!(hx.scheduler.tags().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cached_api_read_survives_outage() {
    init_logging();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/offices"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"id":1}]"#))
        .mount(&server)
        .await;

    let uri = server.uri();
    let hx = harness();

    let online = hx
        .router
        .handle(HttpRequest::get(format!("{uri}/api/offices")))
        .await
        .unwrap();
    assert_eq!(online.status, 200);

    drop(server);

    let offline = hx
        .router
        .handle(HttpRequest::get(format!("{uri}/api/offices")))
        .await
        .unwrap();
    assert_eq!(offline.status, 200);
    assert_eq!(offline.body, online.body);
}
