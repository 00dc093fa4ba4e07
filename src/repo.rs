//! Typed repository over the store layer

use crate::config::Config;
use crate::error::{Result, RoofDeskError};
use crate::store::{Backend, FallbackStore, Filter, LocalStore, ObjectStore, RestBackend, TableStore};
use roofdesk_common::Record;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Entry point for every operation: typed CRUD plus object storage
pub struct Portal {
    store: FallbackStore,
}

impl Portal {
    pub fn new(store: FallbackStore) -> Self {
        Self { store }
    }

    /// Open using the configured backend (if any) and local data dir
    pub fn open(config: &Config) -> Result<Self> {
        let local = Arc::new(LocalStore::open(&config.data_dir()?)?);
        let remote = RestBackend::from_config(config)?.map(|r| Arc::new(r) as Arc<dyn Backend>);
        Ok(Self::new(FallbackStore::new(remote, local)))
    }

    pub fn store(&self) -> &FallbackStore {
        &self.store
    }

    pub fn objects(&self) -> &dyn ObjectStore {
        &self.store
    }

    pub async fn create<T: Record>(&self, record: &T) -> Result<T> {
        let row = serde_json::to_value(record)?;
        let stored = self.store.insert(T::TABLE, row).await?;
        decode(stored)
    }

    pub async fn get<T: Record>(&self, id: &str) -> Result<T> {
        let rows = self.store.select(T::TABLE, &Filter::all().eq("id", id).limit(1)).await?;
        match rows.into_iter().next() {
            Some(row) => decode(row),
            None => Err(RoofDeskError::NotFound { table: T::TABLE.into(), id: id.into() }),
        }
    }

    /// Resolve an id or a unique id prefix (as printed by the list commands)
    pub async fn find<T: Record>(&self, id_or_prefix: &str) -> Result<T> {
        let needle = id_or_prefix.trim();
        if needle.is_empty() {
            return Err(RoofDeskError::Validation(format!("empty {} id", T::TABLE)));
        }
        if let Ok(record) = self.get::<T>(needle).await {
            return Ok(record);
        }
        let mut matches: Vec<T> = self
            .list::<T>(&Filter::all())
            .await?
            .into_iter()
            .filter(|r| r.id().starts_with(needle))
            .collect();
        match matches.len() {
            0 => Err(RoofDeskError::NotFound { table: T::TABLE.into(), id: needle.into() }),
            1 => Ok(matches.remove(0)),
            n => Err(RoofDeskError::Validation(format!(
                "id prefix '{}' matches {} {}",
                needle,
                n,
                T::TABLE
            ))),
        }
    }

    pub async fn list<T: Record>(&self, filter: &Filter) -> Result<Vec<T>> {
        let rows = self.store.select(T::TABLE, filter).await?;
        debug!(table = T::TABLE, count = rows.len(), "list");
        rows.into_iter().map(decode).collect()
    }

    /// Write the whole record back
    pub async fn save<T: Record>(&self, record: &T) -> Result<T> {
        let mut row = serde_json::to_value(record)?;
        if let Value::Object(map) = &mut row {
            map.remove("id");
        }
        let stored = self.store.update(T::TABLE, record.id(), row).await?;
        decode(stored)
    }

    pub async fn delete<T: Record>(&self, id: &str) -> Result<()> {
        self.store.delete(T::TABLE, id).await
    }
}

fn decode<T: Record>(row: Value) -> Result<T> {
    Ok(serde_json::from_value(row)?)
}

/// Short id for listings
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
