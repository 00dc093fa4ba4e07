//! Hosted backend client
//!
//! PostgREST-style table endpoints (`/rest/v1/{table}`) and a storage API
//! (`/storage/v1/object/{bucket}/{path}`).

use super::{Filter, ObjectStore, TableStore};
use crate::config::Config;
use crate::error::{Result, RoofDeskError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub struct RestBackend {
    base_url: String,
    api_key: String,
    bucket: String,
    client: Client,
}

impl RestBackend {
    pub fn new(base_url: &str, api_key: &str, bucket: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("roofdesk/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            bucket: bucket.to_string(),
            client,
        })
    }

    /// Build from config; `None` when no backend URL is configured
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        let Some(url) = config.backend_url() else {
            return Ok(None);
        };
        let key = config.get_api_key()?;
        Ok(Some(Self::new(
            &url,
            &key,
            &config.bucket,
            Duration::from_secs(config.timeout_seconds),
        )?))
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    pub fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = self.authed(builder).send().await?;
        check_status(response).await
    }
}

/// PostgREST query pairs for a filter
pub fn query_pairs(filter: &Filter) -> Vec<(String, String)> {
    let mut pairs = vec![("select".to_string(), "*".to_string())];
    for (column, value) in &filter.eq {
        let op = if value == "null" { "is.null".to_string() } else { format!("eq.{}", value) };
        pairs.push((column.clone(), op));
    }
    if let Some((column, ascending)) = &filter.order {
        pairs.push(("order".into(), format!("{}.{}", column, if *ascending { "asc" } else { "desc" })));
    }
    if let Some(limit) = filter.limit {
        pairs.push(("limit".into(), limit.to_string()));
    }
    pairs
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RoofDeskError::Api {
        status: status.as_u16(),
        message: api_message(&body),
    })
}

/// Pull a readable message out of an error body
fn api_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => ["message", "error", "msg", "details"]
            .iter()
            .find_map(|k| value.get(*k).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| body.trim().to_string()),
        Err(_) => body.trim().to_string(),
    }
}

/// Representation responses are arrays; take the first row
fn first_row(value: Value, table: &str, id: &str) -> Result<Value> {
    match value {
        Value::Array(mut rows) if !rows.is_empty() => Ok(rows.swap_remove(0)),
        Value::Array(_) => Err(RoofDeskError::NotFound { table: table.into(), id: id.into() }),
        other => Ok(other),
    }
}

#[async_trait]
impl TableStore for RestBackend {
    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        debug!(table, "remote insert");
        let id = row.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
        let response = self
            .send(
                self.client
                    .post(self.table_url(table))
                    .header("Prefer", "return=representation,resolution=merge-duplicates")
                    .json(&row),
            )
            .await?;
        first_row(response.json().await?, table, &id)
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value> {
        debug!(table, id, "remote update");
        let response = self
            .send(
                self.client
                    .patch(self.table_url(table))
                    .query(&[("id", format!("eq.{}", id))])
                    .header("Prefer", "return=representation")
                    .json(&patch),
            )
            .await?;
        first_row(response.json().await?, table, id)
    }

    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Value>> {
        debug!(table, ?filter, "remote select");
        let response = self
            .send(self.client.get(self.table_url(table)).query(&query_pairs(filter)))
            .await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        debug!(table, id, "remote delete");
        self.send(
            self.client
                .delete(self.table_url(table))
                .query(&[("id", format!("eq.{}", id))]),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for RestBackend {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        debug!(path, size = bytes.len(), "remote upload");
        self.send(
            self.client
                .post(self.object_url(path))
                .header("content-type", content_type)
                .header("x-upsert", "true")
                .body(bytes),
        )
        .await?;
        Ok(path.to_string())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let response = self.send(self.client.get(self.object_url(path))).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        debug!(count = paths.len(), "remote remove");
        self.send(
            self.client
                .delete(format!("{}/storage/v1/object/{}", self.base_url, self.bucket))
                .json(&json!({ "prefixes": paths })),
        )
        .await?;
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, self.bucket, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> RestBackend {
        RestBackend::new("https://db.example.com/", "key", "portal", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_urls() {
        let b = backend();
        assert_eq!(b.table_url("jobs"), "https://db.example.com/rest/v1/jobs");
        assert_eq!(
            b.object_url("clients/c1/a.jpg"),
            "https://db.example.com/storage/v1/object/portal/clients/c1/a.jpg"
        );
        assert_eq!(
            b.public_url("x.png"),
            "https://db.example.com/storage/v1/object/public/portal/x.png"
        );
    }

    #[test]
    fn test_query_pairs() {
        let filter = Filter::all()
            .eq("client_id", "c1")
            .eq("packet_id", "null")
            .order_by("scheduled_on", false)
            .limit(10);
        let pairs = query_pairs(&filter);
        assert_eq!(pairs[0], ("select".into(), "*".into()));
        assert!(pairs.contains(&("client_id".into(), "eq.c1".into())));
        assert!(pairs.contains(&("packet_id".into(), "is.null".into())));
        assert!(pairs.contains(&("order".into(), "scheduled_on.desc".into())));
        assert!(pairs.contains(&("limit".into(), "10".into())));
    }

    #[test]
    fn test_api_message() {
        assert_eq!(api_message(r#"{"message": "duplicate key"}"#), "duplicate key");
        assert_eq!(api_message(r#"{"error": "Bucket not found"}"#), "Bucket not found");
        assert_eq!(api_message("Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn test_first_row() {
        let row = first_row(json!([{"id": "a"}, {"id": "b"}]), "jobs", "a").unwrap();
        assert_eq!(row["id"], "a");
        assert!(matches!(
            first_row(json!([]), "jobs", "zzz"),
            Err(RoofDeskError::NotFound { .. })
        ));
    }

    #[test]
    fn test_from_config_without_url() {
        let config = Config::default();
        assert!(RestBackend::from_config(&config).unwrap().is_none());
    }
}
