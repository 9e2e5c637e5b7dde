use super::{matches_all, new_id, Document, Filter, PersistenceService, ID_FIELD};
use crate::error::{CrewtrackError, Result};
use crate::{io, paths};
use crate::types::Collection;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

type Records = BTreeMap<String, Document>;

/// File-backed document store.
///
/// Each collection is a single YAML map of `id -> record` under
/// `<root>/.crewtrack/data/`. Every mutation rewrites the whole file through
/// [`crate::io::atomic_write`]. Writers inside one process are serialized by
/// a mutex; separate processes race with last-write-wins.
#[derive(Debug)]
pub struct YamlStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl YamlStore {
    pub fn open(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read(&self, collection: Collection) -> Result<Records> {
        let path = paths::collection_path(&self.root, collection);
        let raw: BTreeMap<String, Value> = io::read_yaml(&path)
            .map_err(|e| {
                CrewtrackError::Persistence(format!("failed to read {}: {e}", path.display()))
            })?
            .unwrap_or_default();
        raw.into_iter()
            .map(|(id, value)| match value {
                Value::Object(doc) => Ok((id, doc)),
                _ => Err(CrewtrackError::Persistence(format!(
                    "{collection} record {id} is not a mapping"
                ))),
            })
            .collect()
    }

    fn write(&self, collection: Collection, records: &Records) -> Result<()> {
        let path = paths::collection_path(&self.root, collection);
        io::write_yaml(&path, records).map_err(|e| {
            CrewtrackError::Persistence(format!("failed to write {}: {e}", path.display()))
        })
    }
}

#[async_trait]
impl PersistenceService for YamlStore {
    async fn find(&self, collection: Collection, filters: &[Filter]) -> Result<Vec<Document>> {
        let _guard = self.lock.lock().await;
        Ok(self
            .read(collection)?
            .into_values()
            .filter(|doc| matches_all(filters, doc))
            .collect())
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Document> {
        let _guard = self.lock.lock().await;
        self.read(collection)?
            .remove(id)
            .ok_or_else(|| CrewtrackError::not_found(collection, id))
    }

    async fn create(&self, collection: Collection, mut record: Document) -> Result<String> {
        let _guard = self.lock.lock().await;
        let mut records = self.read(collection)?;
        let id = new_id();
        record.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        records.insert(id.clone(), record);
        self.write(collection, &records)?;
        Ok(id)
    }

    async fn update(&self, collection: Collection, id: &str, fields: Document) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.read(collection)?;
        let record = records
            .get_mut(id)
            .ok_or_else(|| CrewtrackError::not_found(collection, id))?;
        for (key, value) in fields {
            if key != ID_FIELD {
                record.insert(key, value);
            }
        }
        self.write(collection, &records)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.read(collection)?;
        if records.remove(id).is_none() {
            return Err(CrewtrackError::not_found(collection, id));
        }
        self.write(collection, &records)
    }

    async fn purge(&self, collection: Collection) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let records = self.read(collection)?;
        let count = records.len();
        if count > 0 {
            self.write(collection, &Records::new())?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::patch;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let id = {
            let store = YamlStore::open(dir.path());
            store
                .create(
                    Collection::Projects,
                    patch(json!({ "name": "Launch", "members": ["u1"] })),
                )
                .await
                .unwrap()
        };

        let reopened = YamlStore::open(dir.path());
        let doc = reopened.get(Collection::Projects, &id).await.unwrap();
        assert_eq!(doc.get("name"), Some(&json!("Launch")));
        assert_eq!(doc.get("members"), Some(&json!(["u1"])));
        assert!(dir.path().join(".crewtrack/data/projects.yaml").exists());
    }

    #[tokio::test]
    async fn update_and_delete_rewrite_file() {
        let dir = TempDir::new().unwrap();
        let store = YamlStore::open(dir.path());
        let id = store
            .create(Collection::Tasks, patch(json!({ "progress": 0 })))
            .await
            .unwrap();
        store
            .update(Collection::Tasks, &id, patch(json!({ "progress": 75 })))
            .await
            .unwrap();
        let found = store
            .find(Collection::Tasks, &[Filter::eq("progress", 75)])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        store.delete(Collection::Tasks, &id).await.unwrap();
        assert!(matches!(
            store.get(Collection::Tasks, &id).await,
            Err(CrewtrackError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = YamlStore::open(dir.path());
        assert!(store.find(Collection::Users, &[]).await.unwrap().is_empty());
        assert_eq!(store.purge(Collection::AuditLog).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn garbage_file_is_a_persistence_error() {
        let dir = TempDir::new().unwrap();
        let path = paths::collection_path(dir.path(), Collection::Tasks);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "- just\n- a list\n").unwrap();

        let store = YamlStore::open(dir.path());
        assert!(matches!(
            store.find(Collection::Tasks, &[]).await,
            Err(CrewtrackError::Persistence(_))
        ));
    }
}
