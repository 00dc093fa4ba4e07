//! Backend access
//!
//! 2つの境界（テーブルとオブジェクトストレージ）を非同期トレイトで定義する。
//! - `RestBackend`: ホスト型バックエンド（REST）
//! - `LocalStore`: ローカルミラー（JSONファイル）
//! - `FallbackStore`: リモートを試し、失敗時はローカルへ

pub mod fallback;
pub mod local;
pub mod remote;

pub use fallback::FallbackStore;
pub use local::{LocalStore, OutboxEntry, OutboxOp};
pub use remote::RestBackend;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Row query: equality predicates, optional ordering and limit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub eq: Vec<(String, String)>,
    /// (column, ascending)
    pub order: Option<(String, bool)>,
    pub limit: Option<usize>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<String>) -> Self {
        self.eq.push((column.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some((column.to_string(), ascending));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluate against a JSON row (used by the local mirror)
    pub fn matches(&self, row: &Value) -> bool {
        self.eq.iter().all(|(column, expected)| match row.get(column) {
            Some(Value::String(s)) => s == expected,
            Some(Value::Null) | None => expected == "null",
            Some(other) => other.to_string() == *expected,
        })
    }

    /// Apply ordering and limit to rows that already passed `matches`
    pub fn finish(&self, mut rows: Vec<Value>) -> Vec<Value> {
        if let Some((column, ascending)) = &self.order {
            rows.sort_by(|a, b| {
                let ord = compare_json(a.get(column), b.get(column));
                if *ascending { ord } else { ord.reverse() }
            });
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}

fn compare_json(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

/// Table CRUD. Rows are JSON objects with a string `id`.
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn insert(&self, table: &str, row: Value) -> Result<Value>;

    /// Merge `patch` into the row with `id` and return the stored row
    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value>;

    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Value>>;

    async fn delete(&self, table: &str, id: &str) -> Result<()>;
}

/// Bucket object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes at `path` (overwriting) and return the path
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;

    async fn download(&self, path: &str) -> Result<Vec<u8>>;

    async fn remove(&self, paths: &[String]) -> Result<()>;

    fn public_url(&self, path: &str) -> String;
}

/// Something that serves both tables and objects
pub trait Backend: TableStore + ObjectStore {}

impl<T: TableStore + ObjectStore> Backend for T {}

/// Content type from a file extension
pub fn content_type_for(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Normalize an object path: forward slashes, no leading slash, no `..`
pub fn object_path(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|p| p.split(['/', '\\']))
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect::<Vec<_>>()
        .join("/")
}
