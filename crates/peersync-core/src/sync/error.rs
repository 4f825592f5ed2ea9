//! Pass-level sync errors

use thiserror::Error;

use super::client::StorageClientError;

pub type SyncResult<T> = Result<T, SyncError>;

/// Why a single-collection pass failed.
///
/// A failed pass never advances the collection's watermark, so any of these
/// can be followed by a retry of the whole pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Fetching from collection storage failed
    #[error("Transient network failure: {0}")]
    TransientNetwork(#[from] StorageClientError),
    /// Keys or other configuration needed for the pass are missing
    #[error("Fatal configuration failure: {0}")]
    FatalConfiguration(String),
    /// Wipe, merge, or watermark persistence failed
    #[error("Local store failure: {0}")]
    LocalStore(#[from] crate::Error),
}

impl SyncError {
    /// Whether an outer scheduler should retry the pass automatically.
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::FatalConfiguration(_))
    }
}
