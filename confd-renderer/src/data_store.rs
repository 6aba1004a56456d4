//! Data sets decoded from data namespaces.
//!
//! Every data namespace contributes one top-level entry to the rendering
//! context: `config.json` with `{"name":"x"}` is reachable as `{{ config.name }}`.
//! Values are untyped [`serde_json::Value`] trees.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::RenderError;

/// Mutable store of data sets, owned by the reconciler.
///
/// Backed by a copy-on-write map so snapshots handed to in-flight renders
/// never observe later upserts.
#[derive(Debug, Clone, Default)]
pub struct DataStore {
    sets: Arc<Map<String, Value>>,
}

/// Immutable view of every data set at one point in time.
#[derive(Debug, Clone, Default)]
pub struct DataSnapshot {
    sets: Arc<Map<String, Value>>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `json` and store it under `name`, replacing any prior value.
    ///
    /// The root must be a JSON object. The store is untouched when decoding
    /// fails.
    pub fn upsert(&mut self, name: &str, json: &str) -> Result<(), RenderError> {
        let object: Map<String, Value> =
            serde_json::from_str(json).map_err(|e| RenderError::DataParse {
                name: name.to_string(),
                source: e,
            })?;
        Arc::make_mut(&mut self.sets).insert(name.to_string(), Value::Object(object));
        Ok(())
    }

    /// Delete `name`; returns whether it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        if !self.sets.contains_key(name) {
            return false;
        }
        Arc::make_mut(&mut self.sets).remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sets.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn snapshot(&self) -> DataSnapshot {
        DataSnapshot {
            sets: Arc::clone(&self.sets),
        }
    }
}

impl DataSnapshot {
    /// All data sets as one mapping of top-level names.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.sets
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.sets.get(name)
    }
}
