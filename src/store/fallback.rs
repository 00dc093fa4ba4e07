//! Remote-first store with a local fallback
//!
//! リモートが到達不能（通信エラー・5xx）の場合のみローカルへ書き込み、
//! その書き込みをアウトボックスに積む。`sync` で後からリモートへ反映する。

use super::local::{LocalStore, OutboxEntry, OutboxOp};
use super::{Backend, Filter, ObjectStore, TableStore};
use crate::error::{Result, RoofDeskError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

pub struct FallbackStore {
    remote: Option<Arc<dyn Backend>>,
    local: Arc<LocalStore>,
}

/// Outcome of an outbox replay
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SyncReport {
    pub applied: usize,
    /// The entry that stopped the replay and why
    pub failed: Option<String>,
    /// Entries left for the next sync, the failed one included
    pub remaining: usize,
}

impl FallbackStore {
    pub fn new(remote: Option<Arc<dyn Backend>>, local: Arc<LocalStore>) -> Self {
        Self { remote, local }
    }

    pub fn local_only(local: Arc<LocalStore>) -> Self {
        Self { remote: None, local }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    pub fn pending(&self) -> Result<usize> {
        Ok(self.local.outbox()?.len())
    }

    /// Log and decide whether a remote error should fall back
    fn should_fall_back(op: &str, err: &RoofDeskError) -> bool {
        if err.is_unavailable() {
            warn!(op, error = %err, "backend unavailable, using local mirror");
            true
        } else {
            false
        }
    }

    async fn mirror(&self, table: &str, rows: &[Value]) {
        if let Err(e) = self.local.mirror(table, rows).await {
            warn!(table, error = %e, "failed to refresh local mirror");
        }
    }

    /// Replay queued local writes against the backend, oldest first.
    /// Stops at the first failure; that entry and everything after it stay queued.
    pub async fn sync(&self) -> Result<SyncReport> {
        let remote = self.remote.as_ref().ok_or(RoofDeskError::MissingBackend)?;
        let entries = self.local.outbox()?;
        let mut report = SyncReport::default();

        for entry in &entries {
            match replay(remote.as_ref(), &self.local, &entry.op).await {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    if e.is_unavailable() {
                        warn!(error = %e, "backend unavailable during sync, stopping");
                    } else {
                        warn!(error = %e, op = ?entry.op, "backend rejected queued write, stopping");
                    }
                    report.failed = Some(format!("{}: {}", describe(&entry.op), e));
                    break;
                }
            }
        }

        let remaining = &entries[report.applied..];
        report.remaining = remaining.len();
        self.local.replace_outbox(remaining).await?;
        info!(applied = report.applied, remaining = report.remaining, "sync finished");
        Ok(report)
    }
}

fn describe(op: &OutboxOp) -> String {
    match op {
        OutboxOp::Insert { table, row } => format!(
            "insert {}/{}",
            table,
            row.get("id").and_then(Value::as_str).unwrap_or("?")
        ),
        OutboxOp::Update { table, id, .. } => format!("update {}/{}", table, id),
        OutboxOp::Delete { table, id } => format!("delete {}/{}", table, id),
        OutboxOp::Upload { path, .. } => format!("upload {}", path),
        OutboxOp::Remove { paths } => format!("remove {} object(s)", paths.len()),
    }
}

async fn replay(remote: &dyn Backend, local: &LocalStore, op: &OutboxOp) -> Result<()> {
    match op {
        OutboxOp::Insert { table, row } => {
            remote.insert(table, row.clone()).await?;
        }
        OutboxOp::Update { table, id, patch } => {
            remote.update(table, id, patch.clone()).await?;
        }
        OutboxOp::Delete { table, id } => match remote.delete(table, id).await {
            Ok(()) | Err(RoofDeskError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        },
        OutboxOp::Upload { path, content_type } => {
            let bytes = ObjectStore::download(local, path).await?;
            remote.upload(path, bytes, content_type).await?;
        }
        OutboxOp::Remove { paths } => {
            remote.remove(paths).await?;
        }
    }
    Ok(())
}

#[async_trait]
impl TableStore for FallbackStore {
    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        if let Some(remote) = &self.remote {
            match remote.insert(table, row.clone()).await {
                Ok(stored) => {
                    self.mirror(table, std::slice::from_ref(&stored)).await;
                    return Ok(stored);
                }
                Err(e) if Self::should_fall_back("insert", &e) => {}
                Err(e) => return Err(e),
            }
            let stored = self.local.insert(table, row.clone()).await?;
            self.local.push_outbox(OutboxOp::Insert { table: table.into(), row }).await?;
            return Ok(stored);
        }
        self.local.insert(table, row).await
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value> {
        if let Some(remote) = &self.remote {
            match remote.update(table, id, patch.clone()).await {
                Ok(stored) => {
                    self.mirror(table, std::slice::from_ref(&stored)).await;
                    return Ok(stored);
                }
                Err(e) if Self::should_fall_back("update", &e) => {}
                Err(e) => return Err(e),
            }
            let stored = self.local.update(table, id, patch.clone()).await?;
            self.local
                .push_outbox(OutboxOp::Update { table: table.into(), id: id.into(), patch })
                .await?;
            return Ok(stored);
        }
        self.local.update(table, id, patch).await
    }

    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Value>> {
        if let Some(remote) = &self.remote {
            match remote.select(table, filter).await {
                Ok(rows) => {
                    self.mirror(table, &rows).await;
                    return Ok(rows);
                }
                Err(e) if Self::should_fall_back("select", &e) => {}
                Err(e) => return Err(e),
            }
        }
        self.local.select(table, filter).await
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        if let Some(remote) = &self.remote {
            match remote.delete(table, id).await {
                Ok(()) => {
                    match self.local.delete(table, id).await {
                        Ok(()) | Err(RoofDeskError::NotFound { .. }) => {}
                        Err(e) => warn!(table, id, error = %e, "failed to drop local copy"),
                    }
                    return Ok(());
                }
                Err(e) if Self::should_fall_back("delete", &e) => {}
                Err(e) => return Err(e),
            }
            self.local.delete(table, id).await?;
            self.local
                .push_outbox(OutboxOp::Delete { table: table.into(), id: id.into() })
                .await?;
            return Ok(());
        }
        self.local.delete(table, id).await
    }
}

#[async_trait]
impl ObjectStore for FallbackStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        if let Some(remote) = &self.remote {
            match remote.upload(path, bytes.clone(), content_type).await {
                Ok(stored) => return Ok(stored),
                Err(e) if Self::should_fall_back("upload", &e) => {}
                Err(e) => return Err(e),
            }
            let stored = self.local.upload(path, bytes, content_type).await?;
            self.local
                .push_outbox(OutboxOp::Upload { path: path.into(), content_type: content_type.into() })
                .await?;
            return Ok(stored);
        }
        self.local.upload(path, bytes, content_type).await
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        if let Some(remote) = &self.remote {
            match remote.download(path).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if Self::should_fall_back("download", &e) => {}
                // 未同期のファイルはローカルにしかない
                Err(RoofDeskError::Api { status: 400 | 404, .. }) => {}
                Err(e) => return Err(e),
            }
        }
        ObjectStore::download(self.local.as_ref(), path).await
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        if let Some(remote) = &self.remote {
            match remote.remove(paths).await {
                Ok(()) => return self.local.remove(paths).await,
                Err(e) if Self::should_fall_back("remove", &e) => {}
                Err(e) => return Err(e),
            }
            self.local.remove(paths).await?;
            self.local.push_outbox(OutboxOp::Remove { paths: paths.to_vec() }).await?;
            return Ok(());
        }
        self.local.remove(paths).await
    }

    fn public_url(&self, path: &str) -> String {
        match &self.remote {
            Some(remote) => remote.public_url(path),
            None => self.local.public_url(path),
        }
    }
}
