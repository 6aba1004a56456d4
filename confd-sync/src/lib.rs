//! # confd-sync
//!
//! Turns remote configuration changes into rendered files and on-change hooks.
//!
//! Build a [`Reconciler`] from a [`ConfigSource`], a [`WatchIndex`] and a
//! [`HookRunner`], call [`Reconciler::initial_load`] once, then subscribe it
//! to the source so every [`confd_core::ChangeBatch`] is applied as it arrives.

pub mod diff;
pub mod error;
pub mod hooks;
pub mod reconciler;
pub mod source;
pub mod watch_index;
pub mod writer;

pub use diff::{diff_all, DiffReport, FileDiff};
pub use error::{SourceError, SyncError};
pub use hooks::{HookRunner, ProcessHookRunner};
pub use reconciler::{BatchOutcome, LoadSummary, PreviewEntry, Reconciler};
pub use source::{ChangeListener, ConfigSource, MemorySource};
pub use watch_index::WatchIndex;
