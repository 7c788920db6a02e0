//! End-to-end tests: envelopes through the dispatcher, router, and real
//! backend implementations (file bridge over a temp directory, key-value
//! stores on disk, scripted remote transport).

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use tagmark_core::backend::{FileBookmarkStore, KvBookmarkStore, RemoteBookmarkBackend};
use tagmark_core::bridge::{FileBridgeHost, LoopbackTransport, MessageFileBridge};
use tagmark_core::dispatch::{MessageDispatcher, SenderContext};
use tagmark_core::index::StorageIndex;
use tagmark_core::remote::{HttpResponse, HttpTransport, RemoteClient, RemoteConfig};
use tagmark_core::router::StorageRouter;
use tagmark_core::store::{JsonFileStore, KeyValueStore, MemoryKeyValueStore};
use tagmark_core::{BackendId, BoxFuture};

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures_lite::future::block_on(f)
}

/// Scripted HTTP transport recording every requested URL.
#[derive(Clone, Default)]
struct ScriptedTransport {
    responses: Arc<Mutex<Vec<HttpResponse>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransport {
    fn push(&self, status: u16, body: &str) {
        self.responses.lock().unwrap().push(HttpResponse {
            status,
            body: body.to_string(),
        });
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl HttpTransport for ScriptedTransport {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<HttpResponse, String>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(url.to_string());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Err("no scripted response".to_string())
            } else {
                Ok(responses.remove(0))
            }
        })
    }
}

struct Harness {
    dispatcher: MessageDispatcher,
    transport: ScriptedTransport,
    _dir: tempfile::TempDir,
}

fn harness(default_backend: BackendId) -> Harness {
    let dir = tempfile::tempdir().unwrap();

    let device_store: Arc<dyn KeyValueStore> =
        Arc::new(JsonFileStore::new(dir.path().join("device-store.json")));
    let synced_store: Arc<dyn KeyValueStore> =
        Arc::new(JsonFileStore::new(dir.path().join("synced-store.json")));

    let host = Arc::new(FileBridgeHost::new(Some(dir.path().join("bookmarks"))));
    std::fs::create_dir_all(dir.path().join("bookmarks")).unwrap();
    let bridge = MessageFileBridge::new(LoopbackTransport::new(host));

    let transport = ScriptedTransport::default();
    let remote_config = RemoteConfig {
        auth_token: Some("user:TOKEN".to_string()),
        retry_unit: std::time::Duration::ZERO,
        ..RemoteConfig::default()
    };
    let remote = RemoteBookmarkBackend::new(RemoteClient::new(remote_config, transport.clone()));

    let router = StorageRouter::new(
        Box::new(remote),
        Box::new(KvBookmarkStore::local(device_store.clone())),
        Box::new(KvBookmarkStore::synced(synced_store)),
        Box::new(FileBookmarkStore::new(bridge)),
        StorageIndex::new(device_store),
        default_backend,
    );

    Harness {
        dispatcher: MessageDispatcher::new(router),
        transport,
        _dir: dir,
    }
}

fn send(harness: &Harness, raw: Value) -> Value {
    block_on(harness.dispatcher.dispatch(raw, &SenderContext::default()))
}

#[test]
fn save_to_local_then_move_to_file_preserves_tags() {
    let h = harness(BackendId::Local);

    let saved = send(
        &h,
        json!({ "type": "saveBookmark", "data": {
            "url": "https://a.example/",
            "tags": ["x", "y"]
        }}),
    );
    assert_eq!(saved["success"], true);

    let moved = send(
        &h,
        json!({ "type": "moveBookmarkToStorage", "data": {
            "url": "https://a.example", "targetBackend": "file"
        }}),
    );
    assert_eq!(moved["success"], true);

    let backend = send(
        &h,
        json!({ "type": "getStorageBackendForUrl", "data": { "url": "https://a.example" } }),
    );
    assert_eq!(backend["backend"], "file");

    let tags = send(
        &h,
        json!({ "type": "getTagsForUrl", "data": { "url": "https://a.example" } }),
    );
    assert_eq!(tags["tags"], json!(["x", "y"]));

    // The moved record actually lives in the on-disk document.
    let doc_path = h._dir.path().join("bookmarks").join("tagmark-bookmarks.json");
    let text = std::fs::read_to_string(doc_path).unwrap();
    assert!(text.contains("https://a.example"));
    assert!(text.contains("\"x\""));
}

#[test]
fn save_tag_against_remote_backed_record_replaces_full_tag_set() {
    let h = harness(BackendId::Remote);
    h.transport.push(
        200,
        r#"{"posts":[{"href":"https://a.example","description":"A",
            "time":"2024-01-01T00:00:00Z","shared":"yes","toread":"no","tags":"a b"}]}"#,
    );
    h.transport.push(200, r#"{"result_code":"done"}"#);

    let response = send(
        &h,
        json!({ "type": "saveTag", "data": { "url": "https://a.example", "value": "new" } }),
    );
    assert_eq!(response["success"], true);

    let requests = h.transport.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].contains("posts/get"));
    // Replace semantics: the write carries exactly a, b, new - no duplicates,
    // original order preserved.
    assert!(requests[1].contains("posts/add"));
    assert!(requests[1].contains("tags=a%20b%20new"));
    assert!(requests[1].contains("replace=yes"));
}

#[test]
fn round_trip_on_every_writable_backend() {
    for backend in [BackendId::Local, BackendId::Synced, BackendId::File] {
        let h = harness(backend);
        send(
            &h,
            json!({ "type": "saveBookmark", "data": {
                "url": "https://round.example",
                "tags": "t1 t2",
                "description": "Round trip"
            }}),
        );
        let current = send(
            &h,
            json!({ "type": "getCurrentBookmark", "data": { "url": "https://round.example" } }),
        );
        assert_eq!(current["url"], "https://round.example", "backend {backend}");
        assert_eq!(current["description"], "Round trip");
        assert_eq!(current["tags"], json!(["t1", "t2"]));
        assert_eq!(current["storage"], backend.as_str());
    }
}

#[test]
fn validation_failure_makes_no_remote_request() {
    let h = harness(BackendId::Remote);
    let response = send(&h, json!({ "type": "saveBookmark", "data": {} }));
    assert_eq!(response["error"], "Invalid message");
    assert!(h.transport.requests().is_empty());
}

#[test]
fn remote_rate_limit_surfaces_too_many_retries() {
    let h = harness(BackendId::Remote);
    for _ in 0..3 {
        h.transport.push(429, "");
    }
    let response = send(
        &h,
        json!({ "type": "getTagsForUrl", "data": { "url": "https://a.example" } }),
    );
    assert_eq!(response["error"], "too many retries");
    assert_eq!(h.transport.requests().len(), 3);
}

#[test]
fn file_backend_without_handle_surfaces_no_handle() {
    let device_store: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
    let host = Arc::new(FileBridgeHost::new(None));
    let router = StorageRouter::new(
        Box::new(KvBookmarkStore::local(Arc::new(MemoryKeyValueStore::new()))),
        Box::new(KvBookmarkStore::local(device_store.clone())),
        Box::new(KvBookmarkStore::synced(device_store.clone())),
        Box::new(FileBookmarkStore::new(MessageFileBridge::new(
            LoopbackTransport::new(host),
        ))),
        StorageIndex::new(device_store),
        BackendId::File,
    );
    let dispatcher = MessageDispatcher::new(router);

    let response = block_on(dispatcher.dispatch(
        json!({ "type": "saveBookmark", "data": { "url": "https://a.example" } }),
        &SenderContext::default(),
    ));
    assert_eq!(response["error"], "NO_HANDLE");
}

#[test]
fn index_survives_process_restart_via_disk_store() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("device-store.json");

    // First "process": save a bookmark to the synced backend by default.
    {
        let device_store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(&store_path));
        let synced = KvBookmarkStore::synced(device_store.clone());
        let router = StorageRouter::new(
            Box::new(KvBookmarkStore::local(Arc::new(MemoryKeyValueStore::new()))),
            Box::new(KvBookmarkStore::local(device_store.clone())),
            Box::new(synced),
            Box::new(FileBookmarkStore::new(MessageFileBridge::new(
                LoopbackTransport::new(Arc::new(FileBridgeHost::new(None))),
            ))),
            StorageIndex::new(device_store),
            BackendId::Synced,
        );
        block_on(async {
            router
                .save_bookmark(&tagmark_core::BookmarkRecord::empty(
                    "https://a.example",
                    "",
                ))
                .await
                .unwrap();
        });
    }

    // Second "process": a fresh router over the same disk store resolves the
    // same backend even with a different default.
    {
        let device_store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(&store_path));
        let router = StorageRouter::new(
            Box::new(KvBookmarkStore::local(Arc::new(MemoryKeyValueStore::new()))),
            Box::new(KvBookmarkStore::local(device_store.clone())),
            Box::new(KvBookmarkStore::synced(device_store.clone())),
            Box::new(FileBookmarkStore::new(MessageFileBridge::new(
                LoopbackTransport::new(Arc::new(FileBridgeHost::new(None))),
            ))),
            StorageIndex::new(device_store),
            BackendId::Local,
        );
        block_on(async {
            assert_eq!(
                router.resolve_backend("https://a.example").await,
                BackendId::Synced
            );
            let record = router
                .get_bookmark_for_url("https://a.example", "")
                .await
                .unwrap();
            assert!(record.is_stored());
        });
    }
}
