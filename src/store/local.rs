//! Local mirror
//!
//! テーブルごとに JSON 配列ファイルを保持する:
//! - `{root}/tables/{table}.json`
//! - `{root}/objects/{path}`
//! - `{root}/outbox.json` (リモートへ未反映の書き込み)

use super::{Filter, ObjectStore, TableStore};
use crate::error::{Result, RoofDeskError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

const OUTBOX_FILE_NAME: &str = "outbox.json";

/// A write that reached only the local mirror
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OutboxOp {
    Insert { table: String, row: Value },
    Update { table: String, id: String, patch: Value },
    Delete { table: String, id: String },
    Upload { path: String, content_type: String },
    Remove { paths: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    #[serde(flatten)]
    pub op: OutboxOp,
    pub queued_at: DateTime<Utc>,
}

pub struct LocalStore {
    root: PathBuf,
    /// ファイル書き込みを直列化する
    lock: Mutex<()>,
}

impl LocalStore {
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root.join("tables"))?;
        std::fs::create_dir_all(root.join("objects"))?;
        Ok(Self {
            root: root.to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.root.join("tables").join(format!("{}.json", sanitize_name(table)))
    }

    pub fn object_file(&self, path: &str) -> PathBuf {
        let mut file = self.root.join("objects");
        for part in path.split('/').filter(|p| !p.is_empty() && *p != "." && *p != "..") {
            file.push(part);
        }
        file
    }

    fn read_rows(&self, table: &str) -> Result<Vec<Value>> {
        read_json_array(&self.table_path(table))
    }

    fn write_rows(&self, table: &str, rows: &[Value]) -> Result<()> {
        write_json(&self.table_path(table), rows)
    }

    /// Pending writes in the order they were queued
    pub fn outbox(&self) -> Result<Vec<OutboxEntry>> {
        let path = self.root.join(OUTBOX_FILE_NAME);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub async fn push_outbox(&self, op: OutboxOp) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.outbox()?;
        entries.push(OutboxEntry { op, queued_at: Utc::now() });
        write_json(&self.root.join(OUTBOX_FILE_NAME), &entries)
    }

    /// Replace the outbox (after a sync drained part of it)
    pub async fn replace_outbox(&self, entries: &[OutboxEntry]) -> Result<()> {
        let _guard = self.lock.lock().await;
        write_json(&self.root.join(OUTBOX_FILE_NAME), entries)
    }

    /// Overwrite rows that were read from the remote so offline reads stay warm
    pub async fn mirror(&self, table: &str, fresh: &[Value]) -> Result<()> {
        if fresh.is_empty() {
            return Ok(());
        }
        let _guard = self.lock.lock().await;
        let mut rows = self.read_rows(table)?;
        for row in fresh {
            let Some(id) = row_id(row) else {
                continue;
            };
            match rows.iter_mut().find(|r| row_id(r) == Some(id)) {
                Some(existing) => *existing = row.clone(),
                None => rows.push(row.clone()),
            }
        }
        self.write_rows(table, &rows)
    }
}

fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

fn sanitize_name(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

fn read_json_array(path: &Path) -> Result<Vec<Value>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    // 空として扱うのはファイルが無い場合のみ
    match serde_json::from_reader(reader) {
        Ok(Value::Array(rows)) => Ok(rows),
        Ok(_) => Err(RoofDeskError::Validation(format!(
            "local table {} is not a JSON array",
            path.display()
        ))),
        Err(e) => Err(RoofDeskError::Validation(format!(
            "local table {} is corrupt: {}",
            path.display(),
            e
        ))),
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // 一時ファイルに書いてから置き換える
    let tmp = path.with_extension("json.tmp");
    {
        let writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer_pretty(writer, value)?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn merge_patch(target: &mut Value, patch: &Value) {
    if let (Value::Object(target), Value::Object(patch)) = (target, patch) {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[async_trait]
impl TableStore for LocalStore {
    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let id = row_id(&row)
            .ok_or_else(|| RoofDeskError::Validation(format!("{} row has no id", table)))?
            .to_string();
        let _guard = self.lock.lock().await;
        let mut rows = self.read_rows(table)?;
        if rows.iter().any(|r| row_id(r) == Some(id.as_str())) {
            return Err(RoofDeskError::Validation(format!("{}/{} already exists", table, id)));
        }
        rows.push(row.clone());
        self.write_rows(table, &rows)?;
        debug!(table, id = %id, "local insert");
        Ok(row)
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value> {
        let _guard = self.lock.lock().await;
        let mut rows = self.read_rows(table)?;
        let row = rows
            .iter_mut()
            .find(|r| row_id(r) == Some(id))
            .ok_or_else(|| RoofDeskError::NotFound { table: table.into(), id: id.into() })?;
        merge_patch(row, &patch);
        let updated = row.clone();
        self.write_rows(table, &rows)?;
        debug!(table, id, "local update");
        Ok(updated)
    }

    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Value>> {
        let rows = self.read_rows(table)?;
        Ok(filter.finish(rows.into_iter().filter(|r| filter.matches(r)).collect()))
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut rows = self.read_rows(table)?;
        let before = rows.len();
        rows.retain(|r| row_id(r) != Some(id));
        if rows.len() == before {
            return Err(RoofDeskError::NotFound { table: table.into(), id: id.into() });
        }
        self.write_rows(table, &rows)?;
        debug!(table, id, "local delete");
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        let file = self.object_file(path);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&file, bytes)?;
        Ok(path.to_string())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let file = self.object_file(path);
        if !file.exists() {
            return Err(RoofDeskError::FileNotFound(path.to_string()));
        }
        Ok(std::fs::read(file)?)
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        for path in paths {
            let file = self.object_file(path);
            if file.is_file() {
                std::fs::remove_file(file)?;
            }
        }
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("file://{}", self.object_file(path).display())
    }
}
