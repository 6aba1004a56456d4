//! confd core library — key addressing, domain types, config loading, errors.
//!
//! Public API surface:
//! - [`address`] — `namespace:key` split / join and namespace kinds
//! - [`types`] — watch groups, change batches, namespace content
//! - [`config`] — YAML config load + validation
//! - [`error`] — [`ConfigError`]

pub mod address;
pub mod config;
pub mod error;
pub mod types;

pub use error::ConfigError;
pub use types::{ChangeBatch, ChangeKind, KeyChange, NamespaceContent, WatchGroup};
