use super::{matches_all, new_id, Document, Filter, PersistenceService, ID_FIELD};
use crate::error::{CrewtrackError, Result};
use crate::types::Collection;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// In-process document store.
///
/// Records live in a `BTreeMap` per collection, so `find` returns them in id
/// order. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, BTreeMap<String, Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held in `collection`.
    pub async fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .await
            .get(&collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl PersistenceService for MemoryStore {
    async fn find(&self, collection: Collection, filters: &[Filter]) -> Result<Vec<Document>> {
        let guard = self.collections.read().await;
        let Some(records) = guard.get(&collection) else {
            return Ok(Vec::new());
        };
        Ok(records
            .values()
            .filter(|doc| matches_all(filters, doc))
            .cloned()
            .collect())
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Document> {
        self.collections
            .read()
            .await
            .get(&collection)
            .and_then(|records| records.get(id))
            .cloned()
            .ok_or_else(|| CrewtrackError::not_found(collection, id))
    }

    async fn create(&self, collection: Collection, mut record: Document) -> Result<String> {
        let id = new_id();
        record.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        self.collections
            .write()
            .await
            .entry(collection)
            .or_default()
            .insert(id.clone(), record);
        Ok(id)
    }

    async fn update(&self, collection: Collection, id: &str, fields: Document) -> Result<()> {
        let mut guard = self.collections.write().await;
        let record = guard
            .get_mut(&collection)
            .and_then(|records| records.get_mut(id))
            .ok_or_else(|| CrewtrackError::not_found(collection, id))?;
        for (key, value) in fields {
            if key != ID_FIELD {
                record.insert(key, value);
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        self.collections
            .write()
            .await
            .get_mut(&collection)
            .and_then(|records| records.remove(id))
            .map(|_| ())
            .ok_or_else(|| CrewtrackError::not_found(collection, id))
    }

    async fn purge(&self, collection: Collection) -> Result<usize> {
        Ok(self
            .collections
            .write()
            .await
            .remove(&collection)
            .map(|records| records.len())
            .unwrap_or(0))
    }
}
