use std::io;

use peersync_core::sync::{StorageClientError, SyncError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] peersync_core::Error),
    #[error(transparent)]
    LibSql(#[from] libsql::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageClientError),
    #[error("{collection} sync failed: {source}")]
    Sync {
        collection: &'static str,
        source: SyncError,
    },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("No device matches '{0}'. Run `peersync sync` then `peersync clients`.")]
    DeviceNotFound(String),
    #[error("{0}")]
    AmbiguousDevice(String),
    #[error("Invalid URL '{0}': must be an absolute URL")]
    InvalidUrl(String),
    #[error("Refusing to delete server data without --yes")]
    ConfirmationRequired,
}
