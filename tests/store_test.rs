//! ストア層の統合テスト
//!
//! インプロセスのバックエンドを止めたり拒否させたりして、
//! ローカルへのフォールバックとアウトボックスの再送を検証する。

use async_trait::async_trait;
use roofdesk::error::{Result, RoofDeskError};
use roofdesk::repo::Portal;
use roofdesk::store::{Backend, FallbackStore, Filter, LocalStore, ObjectStore, OutboxOp, TableStore};
use roofdesk_common::Client;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

/// Backend kept in a second local directory. `fail_with` makes every call
/// return that HTTP status (0 = healthy).
struct FlakyBackend {
    inner: LocalStore,
    fail_with: AtomicU16,
}

impl FlakyBackend {
    fn new(root: &std::path::Path) -> Self {
        Self {
            inner: LocalStore::open(root).unwrap(),
            fail_with: AtomicU16::new(0),
        }
    }

    fn set_status(&self, status: u16) {
        self.fail_with.store(status, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        match self.fail_with.load(Ordering::SeqCst) {
            0 => Ok(()),
            status => Err(RoofDeskError::Api { status, message: "test backend".into() }),
        }
    }
}

#[async_trait]
impl TableStore for FlakyBackend {
    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        self.check()?;
        self.inner.insert(table, row).await
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value> {
        self.check()?;
        self.inner.update(table, id, patch).await
    }

    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Value>> {
        self.check()?;
        self.inner.select(table, filter).await
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        self.check()?;
        self.inner.delete(table, id).await
    }
}

#[async_trait]
impl ObjectStore for FlakyBackend {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        self.check()?;
        self.inner.upload(path, bytes, content_type).await
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        self.check()?;
        ObjectStore::download(&self.inner, path).await
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        self.check()?;
        self.inner.remove(paths).await
    }

    fn public_url(&self, path: &str) -> String {
        format!("memory://{}", path)
    }
}

struct Harness {
    _local_dir: TempDir,
    _remote_dir: TempDir,
    remote: Arc<FlakyBackend>,
    portal: Portal,
}

fn harness() -> Harness {
    let local_dir = tempdir().unwrap();
    let remote_dir = tempdir().unwrap();
    let remote = Arc::new(FlakyBackend::new(remote_dir.path()));
    let local = Arc::new(LocalStore::open(local_dir.path()).unwrap());
    let store = FallbackStore::new(Some(remote.clone() as Arc<dyn Backend>), local);
    Harness {
        _local_dir: local_dir,
        _remote_dir: remote_dir,
        remote,
        portal: Portal::new(store),
    }
}

async fn remote_clients(h: &Harness) -> Vec<Value> {
    h.remote.inner.select("clients", &Filter::all()).await.unwrap()
}

#[tokio::test]
async fn test_healthy_backend_writes_remote_only() {
    let h = harness();
    let client = h.portal.create(&Client::new("John Smith")).await.unwrap();

    assert_eq!(remote_clients(&h).await.len(), 1);
    assert_eq!(h.portal.store().pending().unwrap(), 0);

    // 読み込んだ行はローカルにもミラーされる
    let mirrored = h.portal.store().local().select("clients", &Filter::all()).await.unwrap();
    assert_eq!(mirrored[0]["id"], json!(client.id));
}

#[tokio::test]
async fn test_unavailable_backend_queues_and_sync_drains() {
    let h = harness();
    h.remote.set_status(503);

    let client = h.portal.create(&Client::new("Maria Lopez")).await.unwrap();
    let mut edited = client.clone();
    edited.phone = "555-0100".into();
    h.portal.save(&edited).await.unwrap();
    h.portal
        .objects()
        .upload("clients/x/captures/a.jpg", b"jpeg".to_vec(), "image/jpeg")
        .await
        .unwrap();

    assert!(remote_clients(&h).await.is_empty());
    let outbox = h.portal.store().local().outbox().unwrap();
    assert_eq!(outbox.len(), 3);
    assert!(matches!(outbox[0].op, OutboxOp::Insert { .. }));
    assert!(matches!(outbox[1].op, OutboxOp::Update { .. }));
    assert!(matches!(outbox[2].op, OutboxOp::Upload { .. }));

    // オフライン中もローカルから読める
    let found: Client = h.portal.get(&client.id).await.unwrap();
    assert_eq!(found.phone, "555-0100");

    h.remote.set_status(0);
    let report = h.portal.store().sync().await.unwrap();
    assert_eq!(report.applied, 3);
    assert!(report.failed.is_none());
    assert_eq!(report.remaining, 0);
    assert_eq!(h.portal.store().pending().unwrap(), 0);

    let rows = remote_clients(&h).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["phone"], json!("555-0100"));
    let bytes = ObjectStore::download(&h.remote.inner, "clients/x/captures/a.jpg").await.unwrap();
    assert_eq!(bytes, b"jpeg");
}

#[tokio::test]
async fn test_client_errors_do_not_fall_back() {
    let h = harness();
    h.remote.set_status(409);

    let err = h.portal.create(&Client::new("Rejected")).await.unwrap_err();
    assert!(matches!(err, RoofDeskError::Api { status: 409, .. }));
    assert_eq!(h.portal.store().pending().unwrap(), 0);
    let local = h.portal.store().local().select("clients", &Filter::all()).await.unwrap();
    assert!(local.is_empty());
}

#[tokio::test]
async fn test_sync_keeps_queue_while_backend_is_down() {
    let h = harness();
    h.remote.set_status(502);
    h.portal.create(&Client::new("A")).await.unwrap();
    h.portal.create(&Client::new("B")).await.unwrap();

    let report = h.portal.store().sync().await.unwrap();
    assert_eq!(report.applied, 0);
    assert_eq!(report.remaining, 2);
    assert_eq!(h.portal.store().pending().unwrap(), 2);
}

#[tokio::test]
async fn test_sync_stops_at_rejected_write() {
    let h = harness();
    h.remote.set_status(503);
    let first = h.portal.create(&Client::new("Twice")).await.unwrap();
    h.portal.create(&Client::new("After")).await.unwrap();

    // 同じ行がすでにリモートにある → 最初の挿入が拒否される
    h.remote.inner.insert("clients", serde_json::to_value(&first).unwrap()).await.unwrap();
    h.remote.set_status(0);

    let report = h.portal.store().sync().await.unwrap();
    assert_eq!(report.applied, 0);
    assert_eq!(report.remaining, 2);
    assert!(report.failed.as_deref().unwrap().starts_with("insert clients/"));
    assert_eq!(h.portal.store().pending().unwrap(), 2);

    // 後続の書き込みは再送されていない
    assert_eq!(remote_clients(&h).await.len(), 1);
    let outbox = h.portal.store().local().outbox().unwrap();
    assert!(matches!(&outbox[0].op, OutboxOp::Insert { row, .. } if row["id"] == json!(first.id)));
}

#[tokio::test]
async fn test_sync_keeps_entries_after_partial_replay() {
    let h = harness();
    h.remote.set_status(503);
    h.portal.create(&Client::new("Applied")).await.unwrap();
    let blocked = h.portal.create(&Client::new("Blocked")).await.unwrap();
    h.portal.create(&Client::new("Waiting")).await.unwrap();

    h.remote.inner.insert("clients", serde_json::to_value(&blocked).unwrap()).await.unwrap();
    h.remote.set_status(0);

    let report = h.portal.store().sync().await.unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(report.remaining, 2);
    assert_eq!(h.portal.store().pending().unwrap(), 2);
}

#[tokio::test]
async fn test_sync_without_backend() {
    let dir = tempdir().unwrap();
    let store = FallbackStore::local_only(Arc::new(LocalStore::open(dir.path()).unwrap()));
    assert!(!store.has_remote());
    assert!(matches!(store.sync().await, Err(RoofDeskError::MissingBackend)));
}

#[tokio::test]
async fn test_find_by_id_prefix() {
    let h = harness();
    let client = h.portal.create(&Client::new("Prefix")).await.unwrap();
    let found: Client = h.portal.find(&client.id[..8]).await.unwrap();
    assert_eq!(found.id, client.id);

    let missing = h.portal.find::<Client>("zzzzzzzz").await;
    assert!(matches!(missing, Err(RoofDeskError::NotFound { .. })));
}
