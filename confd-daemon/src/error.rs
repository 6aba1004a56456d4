use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the daemon runtime and the Apollo client.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] confd_core::ConfigError),

    #[error("sync error: {0}")]
    Sync(#[from] confd_sync::SyncError),

    #[error("source error: {0}")]
    Source(#[from] confd_sync::SourceError),

    #[error("runtime error: {0}")]
    Runtime(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
