//! Versioned append/read over an [`OrderedStore`].
//!
//! Appends wrap `(key, value)` into a [`Document`] and let the store pick the
//! version. Reads ask for everything after a cursor and unwrap the values.
//! The relay keeps no state of its own: ordering, uniqueness and concurrency
//! control all come from the store.

use serde_json::Value;
use tracing::debug;

use crate::{
    cursor::{self, Cursor},
    error::{RelayError, Result},
    json,
    store::{Document, OrderedStore, RecordFilter},
};

/// Values read for one key, plus the cursor to resume from.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult {
    /// Values in append order
    pub values: Vec<Value>,
    /// Cursor of the last value returned, or the input cursor if nothing new
    pub next: Cursor,
}

impl ReadResult {
    /// Whether the reader has caught up with the key's history.
    pub fn is_caught_up(&self) -> bool {
        self.values.is_empty()
    }
}

/// The relay core. Owns a single long-lived store handle.
#[derive(Debug)]
pub struct Relay<S> {
    store: S,
}

impl<S: OrderedStore> Relay<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Release the store handle.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Append `value` under `(namespace, key)`.
    ///
    /// Returns the cursor of the new record. It is greater than the cursor of
    /// every record already in the namespace.
    pub fn append(&self, namespace: &str, key: &str, value: Value) -> Result<Cursor> {
        validate_identifiers(namespace, key)?;
        let value = match value {
            Value::Object(map) => map,
            other => return Err(RelayError::NotAnObject(json_type_name(&other))),
        };

        let version = self.store.insert(namespace, Document::new(key, value))?;
        debug!(namespace = %namespace, key = %key, "Appended value");
        Ok(cursor::encode(&version))
    }

    /// Append a raw JSON body under `(namespace, key)`.
    pub fn append_json(&self, namespace: &str, key: &str, body: &[u8]) -> Result<Cursor> {
        validate_identifiers(namespace, key)?;
        let value: Value = json::from_slice(body)?;
        self.append(namespace, key, value)
    }

    /// Read every value of `(namespace, key)` appended after `cursor`.
    ///
    /// Without a cursor the whole history is returned. An empty result is not
    /// an error; `next` then echoes the input cursor, or the zero cursor.
    pub fn read(&self, namespace: &str, key: &str, cursor: Option<&str>) -> Result<ReadResult> {
        validate_identifiers(namespace, key)?;
        let after = cursor.map(cursor::decode).transpose()?;

        let records = self
            .store
            .find(namespace, &RecordFilter::new(key, after))?;

        let next = records
            .last()
            .map(|r| cursor::encode(&r.version))
            .or_else(|| after.map(|v| cursor::encode(&v)))
            .unwrap_or_else(Cursor::zero);

        debug!(namespace = %namespace, key = %key, count = records.len(), "Read values");

        Ok(ReadResult {
            values: records
                .into_iter()
                .map(|r| Value::Object(r.value))
                .collect(),
            next,
        })
    }
}

fn validate_identifiers(namespace: &str, key: &str) -> Result<()> {
    if namespace.is_empty() || key.is_empty() {
        return Err(RelayError::MissingIdentifier);
    }
    Ok(())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
