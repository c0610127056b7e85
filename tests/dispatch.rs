//! End-to-end dispatch scenarios, exercising the full
//! `Received -> Resolving -> Authorizing -> Running -> Reported` pipeline
//! against in-memory stand-ins for persistence, the sandbox, and the
//! originating adapter.

use std::sync::Arc;

use gort::adapter::mock::MockAdapter;
use gort::adapter::AdapterManager;
use gort::bundle::parse_bundle;
use gort::dataaccess::memory::MemoryDataAccess;
use gort::dataaccess::{DataAccess, Group, User};
use gort::dispatch::{Engine, RawCommandRequest};
use gort::worker::mock::MockWorkerFactory;

const ECHO_BUNDLE: &str = r#"
name: gort
version: "1.0.0"
docker:
  image: gort/gort
  tag: latest
commands:
  echo:
    description: echo arguments back
    executable: ["echo"]
    rules:
      - allow
  destroy:
    description: tear something down
    executable: ["destroy"]
    rules:
      - "with option['delete'] == true must have gort:destroy"
"#;

async fn raw_request(text: &str) -> RawCommandRequest {
    RawCommandRequest {
        adapter: "mock".to_owned(),
        channel_id: "general".to_owned(),
        user_id: "U1".to_owned(),
        user_name: "alice".to_owned(),
        user_email: None,
        text: text.to_owned(),
        timestamp: chrono::Utc::now(),
        trace_context: String::new(),
    }
}

#[tokio::test]
async fn full_dispatch_echo_succeeds() {
    let _ = env_logger::try_init();
    let store = Arc::new(MemoryDataAccess::new());
    store
        .bundle_install(parse_bundle(ECHO_BUNDLE.as_bytes()).unwrap(), ECHO_BUNDLE.to_owned())
        .await
        .unwrap();
    store
        .user_create(User {
            name: "alice".to_owned(),
            email: None,
            full_name: None,
        })
        .await
        .unwrap();

    let adapters = AdapterManager::new();
    let adapter = Arc::new(MockAdapter::new("mock"));
    adapters.install(adapter.clone());

    let worker_factory = Arc::new(MockWorkerFactory::new(vec!["hello".to_owned()], 0));
    let engine = Engine::new(store, adapters, worker_factory);

    let response = engine.dispatch_request(raw_request("gort:echo hello").await).await;

    assert_eq!(response.status, 0);
    assert_eq!(response.output, vec!["hello".to_owned()]);
    assert!(response.duration.as_nanos() > 0 || response.duration.is_zero());
    assert!(response.request_id >= 0);

    let sent = adapter.sent();
    assert_eq!(sent.len(), 1);
}

#[tokio::test]
async fn unknown_user_without_self_registration_is_denied() {
    let store = Arc::new(MemoryDataAccess::new());
    store
        .bundle_install(parse_bundle(ECHO_BUNDLE.as_bytes()).unwrap(), ECHO_BUNDLE.to_owned())
        .await
        .unwrap();

    let adapters = AdapterManager::new();
    let adapter = Arc::new(MockAdapter::new("mock"));
    adapters.install(adapter.clone());

    let worker_factory = Arc::new(MockWorkerFactory::new(vec!["hello".to_owned()], 0));
    let engine = Engine::new(store, adapters, worker_factory);

    let response = engine.dispatch_request(raw_request("gort:echo hello").await).await;

    assert_eq!(response.status, 67);
    assert!(response.error.is_some());
    // denied requests still open an audit row before failing
    assert!(response.request_id > 0);
}

#[tokio::test]
async fn destroy_requires_permission_when_delete_flag_set() {
    let store = Arc::new(MemoryDataAccess::new());
    store
        .bundle_install(parse_bundle(ECHO_BUNDLE.as_bytes()).unwrap(), ECHO_BUNDLE.to_owned())
        .await
        .unwrap();
    store
        .user_create(User {
            name: "alice".to_owned(),
            email: None,
            full_name: None,
        })
        .await
        .unwrap();

    let adapters = AdapterManager::new();
    let adapter = Arc::new(MockAdapter::new("mock"));
    adapters.install(adapter.clone());

    let worker_factory = Arc::new(MockWorkerFactory::new(vec![], 0));
    let engine = Engine::new(store, adapters, worker_factory);

    let response = engine
        .dispatch_request(raw_request("gort:destroy --delete true").await)
        .await;

    assert_eq!(response.status, 77);
    // authorization-denied requests still open an audit row before failing
    assert!(response.request_id > 0);
}

#[tokio::test]
async fn destroy_succeeds_once_permission_is_granted() {
    let store = Arc::new(MemoryDataAccess::new());
    store
        .bundle_install(parse_bundle(ECHO_BUNDLE.as_bytes()).unwrap(), ECHO_BUNDLE.to_owned())
        .await
        .unwrap();
    store
        .user_create(User {
            name: "alice".to_owned(),
            email: None,
            full_name: None,
        })
        .await
        .unwrap();
    store
        .group_create(Group {
            name: "admins".to_owned(),
        })
        .await
        .unwrap();
    store.group_add_user("admins", "alice").await.unwrap();
    store.group_grant_permission("admins", "gort:destroy").await.unwrap();

    let adapters = AdapterManager::new();
    let adapter = Arc::new(MockAdapter::new("mock"));
    adapters.install(adapter.clone());

    let worker_factory = Arc::new(MockWorkerFactory::new(vec!["destroyed".to_owned()], 0));
    let engine = Engine::new(store, adapters, worker_factory);

    let response = engine
        .dispatch_request(raw_request("gort:destroy --delete true").await)
        .await;

    assert_eq!(response.status, 0);
    assert_eq!(response.output, vec!["destroyed".to_owned()]);
}
