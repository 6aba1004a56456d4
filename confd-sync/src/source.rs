//! Boundary with the remote configuration center.
//!
//! The reconciler only needs two capabilities from a source: fetch the full
//! content of a namespace, and deliver change batches to a subscribed
//! [`ChangeListener`]. [`MemorySource`] is an in-process implementation that
//! delivers synchronously on the caller's thread.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use confd_core::{ChangeBatch, KeyChange, NamespaceContent};

use crate::error::SourceError;

/// Receives change batches from a [`ConfigSource`].
pub trait ChangeListener: Send + Sync {
    fn on_batch(&self, batch: &ChangeBatch);
}

/// A remote configuration center.
pub trait ConfigSource: Send + Sync {
    /// Full current content of `namespace`.
    fn fetch_namespace(&self, namespace: &str) -> Result<NamespaceContent, SourceError>;

    /// Register `listener` for every future change batch.
    fn subscribe(&self, listener: Arc<dyn ChangeListener>);
}

/// In-memory [`ConfigSource`] for tests and embedding.
///
/// Mutations update the stored namespace first, then deliver one batch to
/// every listener. No lock is held during delivery, so listeners may call
/// [`ConfigSource::fetch_namespace`] from `on_batch`.
#[derive(Default)]
pub struct MemorySource {
    namespaces: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
    listeners: Mutex<Vec<Arc<dyn ChangeListener>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a key without notifying listeners.
    pub fn seed(&self, namespace: &str, key: &str, value: &str) {
        self.lock_namespaces()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    /// Set `namespace/key` and deliver an added/modified batch.
    pub fn put(&self, namespace: &str, key: &str, value: &str) {
        let previous = self
            .lock_namespaces()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        let change = match previous {
            Some(old) => KeyChange::modified(key, old, value),
            None => KeyChange::added(key, value),
        };
        self.publish(&ChangeBatch::new(namespace, vec![change]));
    }

    /// Remove `namespace/key` and deliver a deleted batch.
    pub fn delete(&self, namespace: &str, key: &str) {
        let previous = self
            .lock_namespaces()
            .get_mut(namespace)
            .and_then(|entries| entries.remove(key));
        self.publish(&ChangeBatch::new(
            namespace,
            vec![KeyChange::deleted(key, previous)],
        ));
    }

    /// Deliver `batch` as-is, without touching stored content.
    pub fn publish(&self, batch: &ChangeBatch) {
        let listeners: Vec<Arc<dyn ChangeListener>> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener.on_batch(batch);
        }
    }

    fn lock_namespaces(
        &self,
    ) -> std::sync::MutexGuard<'_, BTreeMap<String, BTreeMap<String, String>>> {
        self.namespaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConfigSource for MemorySource {
    fn fetch_namespace(&self, namespace: &str) -> Result<NamespaceContent, SourceError> {
        let entries = self
            .lock_namespaces()
            .get(namespace)
            .cloned()
            .ok_or_else(|| SourceError::NamespaceNotFound {
                namespace: namespace.to_string(),
            })?;
        NamespaceContent::from_entries(namespace, entries).ok_or_else(|| {
            SourceError::MissingContent {
                namespace: namespace.to_string(),
            }
        })
    }

    fn subscribe(&self, listener: Arc<dyn ChangeListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }
}
