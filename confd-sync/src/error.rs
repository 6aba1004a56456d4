//! Error types for confd-sync.

use std::path::PathBuf;

use thiserror::Error;

use confd_renderer::RenderError;

/// Failures of the remote configuration source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source does not know this namespace.
    #[error("namespace {namespace} not found")]
    NamespaceNotFound { namespace: String },

    /// A data namespace has no `content` entry.
    #[error("data namespace {namespace} has no content entry")]
    MissingContent { namespace: String },

    /// The source could not be reached or answered garbage.
    #[error("failed to fetch namespace {namespace}: {message}")]
    Transport { namespace: String, message: String },
}

/// All errors that can arise from reconciliation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from the template / data layer.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// An error from the remote source.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// The target directory could not be created.
    #[error("cannot create directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An on-change command could not be started.
    #[error("failed to start on-change command {command}: {source}")]
    Hook {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
