//! In-memory ordered store.
//!
//! Each namespace is a vector kept in version order. Versions are generated
//! while the write lock is held, so the insertion order and the version order
//! are the same thing.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::{
    store::{Document, OrderedStore, RecordFilter, StoreError, StoredRecord},
    version::{Version, VersionGenerator},
};

/// Process-local, non-durable [`OrderedStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Records indexed by namespace
    collections: RwLock<HashMap<String, Vec<StoredRecord>>>,
    generator: VersionGenerator,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrderedStore for MemoryStore {
    fn insert(&self, namespace: &str, document: Document) -> Result<Version, StoreError> {
        let mut collections = self.collections.write();
        let version = self.generator.generate()?;

        collections
            .entry(namespace.to_string())
            .or_default()
            .push(StoredRecord {
                version,
                key: document.key,
                value: document.value,
            });

        debug!(namespace = %namespace, "Inserted record");
        Ok(version)
    }

    fn find(
        &self,
        namespace: &str,
        filter: &RecordFilter<'_>,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let collections = self.collections.read();
        let Some(records) = collections.get(namespace) else {
            return Ok(Vec::new());
        };

        let start = match filter.after {
            Some(after) => records.partition_point(|r| r.version <= after),
            None => 0,
        };

        Ok(records[start..]
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use serde_json::json;

    use super::*;
    use crate::store::JsonObject;

    fn object(value: serde_json::Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_insert_and_find_in_order() {
        let store = MemoryStore::new();

        let v1 = store
            .insert("orders", Document::new("o1", object(json!({"n": 1}))))
            .unwrap();
        let v2 = store
            .insert("orders", Document::new("o1", object(json!({"n": 2}))))
            .unwrap();
        assert!(v2 > v1);

        let records = store
            .find("orders", &RecordFilter::new("o1", None))
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].version, v1);
        assert_eq!(records[1].value, object(json!({"n": 2})));
    }

    #[test]
    fn test_find_after_version() {
        let store = MemoryStore::new();

        let v1 = store
            .insert("orders", Document::new("o1", object(json!({"n": 1}))))
            .unwrap();
        store
            .insert("orders", Document::new("o2", object(json!({"n": 2}))))
            .unwrap();
        let v3 = store
            .insert("orders", Document::new("o1", object(json!({"n": 3}))))
            .unwrap();

        let records = store
            .find("orders", &RecordFilter::new("o1", Some(v1)))
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].version, v3);

        let records = store
            .find("orders", &RecordFilter::new("o1", Some(v3)))
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let store = MemoryStore::new();

        store
            .insert("a", Document::new("k", object(json!({"ns": "a"}))))
            .unwrap();

        assert!(store.find("b", &RecordFilter::new("k", None)).unwrap().is_empty());
        let records = store.find("a", &RecordFilter::new("k", None)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, object(json!({"ns": "a"})));
    }

    #[test]
    fn test_concurrent_inserts_get_unique_increasing_versions() {
        let store = Arc::new(MemoryStore::new());

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = store.clone();
                thread::spawn(move || {
                    for n in 0..250 {
                        store
                            .insert(
                                "load",
                                Document::new("k", object(json!({"w": worker, "n": n}))),
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let records = store.find("load", &RecordFilter::new("k", None)).unwrap();
        assert_eq!(records.len(), 2_000);
        assert!(records.windows(2).all(|w| w[0].version < w[1].version));
    }
}
