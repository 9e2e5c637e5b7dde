//! Abstract document persistence.
//!
//! The core never talks to a concrete database. Everything goes through
//! [`PersistenceService`], which models a schemaless document store: named
//! collections of JSON-object records addressed by an opaque string id.
//! Two backends ship with the crate:
//!
//! - [`MemoryStore`] keeps everything in process memory.
//! - [`YamlStore`] keeps one YAML file per collection on disk.
//!
//! Typed access goes through [`load`], [`find_as`] and [`insert`], which
//! convert between documents and the structs in [`crate::model`].

mod memory;
mod yaml;

pub use memory::MemoryStore;
pub use yaml::YamlStore;

use crate::error::{CrewtrackError, Result};
use crate::types::Collection;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// One stored record.
pub type Document = serde_json::Map<String, Value>;

/// Field under which every backend stores the record id.
pub const ID_FIELD: &str = "id";

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// A predicate applied by [`PersistenceService::find`]. All filters passed in
/// one call must match.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `field == value`
    Eq(String, Value),
    /// `field` is an array containing `value`
    Contains(String, Value),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Contains(field.into(), value.into())
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Eq(field, value) => doc.get(field) == Some(value),
            Filter::Contains(field, value) => doc
                .get(field)
                .and_then(Value::as_array)
                .map(|items| items.contains(value))
                .unwrap_or(false),
        }
    }
}

pub(crate) fn matches_all(filters: &[Filter], doc: &Document) -> bool {
    filters.iter().all(|f| f.matches(doc))
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ---------------------------------------------------------------------------
// PersistenceService
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PersistenceService: Send + Sync {
    /// All records in `collection` matching every filter.
    async fn find(&self, collection: Collection, filters: &[Filter]) -> Result<Vec<Document>>;

    /// A single record, or `NotFound`.
    async fn get(&self, collection: Collection, id: &str) -> Result<Document>;

    /// Store a new record under a freshly generated id and return the id.
    async fn create(&self, collection: Collection, record: Document) -> Result<String>;

    /// Merge `fields` into an existing record. Last write wins per field.
    async fn update(&self, collection: Collection, id: &str, fields: Document) -> Result<()>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<()>;

    /// Remove every record in `collection`, returning how many were removed.
    async fn purge(&self, collection: Collection) -> Result<usize>;
}

// ---------------------------------------------------------------------------
// Typed helpers
// ---------------------------------------------------------------------------

/// Serialize a model struct into a document.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value).map_err(CrewtrackError::persistence)? {
        Value::Object(map) => Ok(map),
        other => Err(CrewtrackError::Persistence(format!(
            "expected an object record, got {other}"
        ))),
    }
}

/// Deserialize a stored document into a model struct.
pub fn from_document<T: DeserializeOwned>(collection: Collection, doc: Document) -> Result<T> {
    let id = doc
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .unwrap_or("?")
        .to_string();
    serde_json::from_value(Value::Object(doc)).map_err(|e| {
        CrewtrackError::Persistence(format!("corrupt {collection} record {id}: {e}"))
    })
}

/// Build a partial-update document from a `json!({...})` object literal.
pub fn patch(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

pub async fn load<T, S>(store: &S, collection: Collection, id: &str) -> Result<T>
where
    T: DeserializeOwned,
    S: PersistenceService + ?Sized,
{
    let doc = store.get(collection, id).await?;
    from_document(collection, doc)
}

pub async fn find_as<T, S>(store: &S, collection: Collection, filters: &[Filter]) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    S: PersistenceService + ?Sized,
{
    store
        .find(collection, filters)
        .await?
        .into_iter()
        .map(|doc| from_document(collection, doc))
        .collect()
}

/// Create a record from a model struct. Any `id` already on the struct is
/// discarded in favour of the one the store assigns.
pub async fn insert<T, S>(store: &S, collection: Collection, value: &T) -> Result<String>
where
    T: Serialize,
    S: PersistenceService + ?Sized,
{
    let mut doc = to_document(value)?;
    doc.remove(ID_FIELD);
    store.create(collection, doc).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
