//! Ordered store boundary.
//!
//! The relay never orders or numbers records itself. It hands documents to an
//! [`OrderedStore`], which assigns each one a [`Version`] at insertion time and
//! answers "everything for key K after version V" range queries.

use serde_json::{Map, Value};

use crate::version::{Version, VersionError};

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// A JSON object, stored and returned without interpretation.
pub type JsonObject = Map<String, Value>;

/// Error types for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Insert rejected: {0}")]
    Rejected(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Stored record is corrupt: {0}")]
    Corrupt(String),

    #[error("Store returned an invalid version: {0}")]
    InvalidVersion(#[from] VersionError),
}

/// What gets written for every append.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub key: String,
    pub value: JsonObject,
}

impl Document {
    pub fn new(key: impl Into<String>, value: JsonObject) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// A document as read back, with the version the store assigned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub version: Version,
    pub key: String,
    pub value: JsonObject,
}

/// Range query over one key of a namespace.
#[derive(Debug, Clone, Copy)]
pub struct RecordFilter<'a> {
    pub key: &'a str,
    /// Only records with a version strictly greater than this one. `None`
    /// matches the whole history.
    pub after: Option<Version>,
}

impl<'a> RecordFilter<'a> {
    pub fn new(key: &'a str, after: Option<Version>) -> Self {
        Self { key, after }
    }

    pub fn matches(&self, record: &StoredRecord) -> bool {
        record.key == self.key && self.after.is_none_or(|after| record.version > after)
    }
}

/// An append-only collection per namespace with store-assigned versions.
///
/// Implementations must assign versions atomically: under concurrent inserts
/// every version is unique and later inserts get greater versions.
pub trait OrderedStore: Send + Sync {
    /// Insert a document and return the version assigned to it.
    fn insert(&self, namespace: &str, document: Document) -> Result<Version, StoreError>;

    /// Records matching `filter`, in ascending version order.
    fn find(
        &self,
        namespace: &str,
        filter: &RecordFilter<'_>,
    ) -> Result<Vec<StoredRecord>, StoreError>;

    /// Cheap liveness probe.
    fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

impl<S: OrderedStore + ?Sized> OrderedStore for std::sync::Arc<S> {
    fn insert(&self, namespace: &str, document: Document) -> Result<Version, StoreError> {
        (**self).insert(namespace, document)
    }

    fn find(
        &self,
        namespace: &str,
        filter: &RecordFilter<'_>,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        (**self).find(namespace, filter)
    }

    fn ping(&self) -> Result<(), StoreError> {
        (**self).ping()
    }
}
