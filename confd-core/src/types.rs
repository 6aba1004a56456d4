//! Domain types shared by the renderer, reconciler and remote source.
//!
//! All path fields use `PathBuf`; serialized addresses are plain `String`s
//! produced by [`crate::address::join`].

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::address::{self, DATA_CONTENT_KEY};

// ---------------------------------------------------------------------------
// Watch groups
// ---------------------------------------------------------------------------

/// A target directory plus the command to start when any file in it changes.
///
/// Identified by its index in the watch index; immutable after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchGroup {
    pub path: PathBuf,
    /// Program started with no arguments; empty means "no hook".
    pub on_change: String,
}

impl WatchGroup {
    pub fn new(path: impl Into<PathBuf>, on_change: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            on_change: on_change.into(),
        }
    }

    pub fn has_hook(&self) -> bool {
        !self.on_change.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Change batches
// ---------------------------------------------------------------------------

/// Kind of a single remote mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "added"),
            ChangeKind::Modified => write!(f, "modified"),
            ChangeKind::Deleted => write!(f, "deleted"),
        }
    }
}

/// One key's change inside a [`ChangeBatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyChange {
    pub key: String,
    pub kind: ChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
}

impl KeyChange {
    pub fn added(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: ChangeKind::Added,
            old_value: None,
            new_value: Some(value.into()),
        }
    }

    pub fn modified(
        key: impl Into<String>,
        old: impl Into<String>,
        new: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            kind: ChangeKind::Modified,
            old_value: Some(old.into()),
            new_value: Some(new.into()),
        }
    }

    pub fn deleted(key: impl Into<String>, old: Option<String>) -> Self {
        Self {
            key: key.into(),
            kind: ChangeKind::Deleted,
            old_value: old,
            new_value: None,
        }
    }
}

/// A set of mutations to one namespace, delivered together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatch {
    pub namespace: String,
    /// Changes in delivery order.
    #[serde(default)]
    pub changes: Vec<KeyChange>,
}

impl ChangeBatch {
    pub fn new(namespace: impl Into<String>, changes: Vec<KeyChange>) -> Self {
        Self {
            namespace: namespace.into(),
            changes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Namespace content
// ---------------------------------------------------------------------------

/// Full content of one remote namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceContent {
    /// Data namespace: the raw JSON blob.
    Data { content: String },
    /// Template namespace: key → template text, in source order.
    Entries(Vec<(String, String)>),
}

impl NamespaceContent {
    /// Classify raw key/value entries by the namespace's kind.
    ///
    /// Returns `None` for a data namespace without a `content` entry.
    pub fn from_entries<I>(namespace: &str, entries: I) -> Option<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        if address::is_data_namespace(namespace) {
            entries
                .into_iter()
                .find(|(key, _)| key == DATA_CONTENT_KEY)
                .map(|(_, content)| NamespaceContent::Data { content })
        } else {
            Some(NamespaceContent::Entries(entries.into_iter().collect()))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
