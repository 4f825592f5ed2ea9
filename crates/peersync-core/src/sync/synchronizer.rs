//! Single-collection synchronization pass.
//!
//! One pass runs strictly in order:
//! `CheckingChanges -> Fetching -> Wiping? -> Merging -> ProcessingOwnCommands
//! -> UpdatingWatermark`. Any error stops the pass before the watermark is
//! touched, so a failed pass can always be retried from the same point.

use std::fmt;

use serde::Serialize;

use super::client::{CollectionClient, CollectionStorage};
use super::codec::{make_factory, DecodeFn, KeyProvider};
use super::commands::CommandReport;
use super::error::{SyncError, SyncResult};
use super::info::{has_remote_changes, InfoCollections};
use super::record::{Changes, Record};
use super::watermark::Watermarks;
use crate::db::PrefsStore;
use crate::error::Result;

/// Everything a pass needs besides its collection-specific parts.
pub struct SyncContext<'a, S, P, K: ?Sized> {
    /// GUID of the local device
    pub own_guid: &'a str,
    pub storage: &'a S,
    /// Preference store holding the watermarks
    pub prefs: &'a P,
    pub keys: &'a K,
}

impl<S, P, K: ?Sized> Clone for SyncContext<'_, S, P, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, P, K: ?Sized> Copy for SyncContext<'_, S, P, K> {}

/// Local destination of a collection's records.
#[allow(async_fn_in_trait)]
pub trait MergeTarget<T> {
    /// Delete all local peer records for the collection.
    ///
    /// Must not touch the outbound command queue.
    async fn wipe(&self) -> Result<()>;

    /// Upsert peer records in one all-or-nothing batch; returns rows written.
    async fn merge(&self, records: Vec<Record<T>>) -> Result<usize>;

    /// Remove peer records deleted on the server, all or nothing.
    async fn delete(&self, ids: &[String]) -> Result<usize>;

    /// Handle the local device's own record. Never fails the pass.
    async fn process_own(&self, _record: Record<T>) -> CommandReport {
        CommandReport::default()
    }
}

/// Step of a pass, used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    CheckingChanges,
    Fetching,
    Wiping,
    Merging,
    ProcessingOwnCommands,
    UpdatingWatermark,
}

impl fmt::Display for PassState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CheckingChanges => "checking-changes",
            Self::Fetching => "fetching",
            Self::Wiping => "wiping",
            Self::Merging => "merging",
            Self::ProcessingOwnCommands => "processing-own-commands",
            Self::UpdatingWatermark => "updating-watermark",
        };
        f.write_str(name)
    }
}

/// Result of a successful pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Server had nothing newer than the watermark; nothing was touched
    NoChanges { watermark: u64 },
    /// Records were fetched and applied
    Applied {
        /// Records decoded from the fetch
        fetched: usize,
        /// Rows written to the local store
        merged: usize,
        /// Tombstones applied to the local store
        deleted: usize,
        /// Whether the local collection was wiped first
        wiped: bool,
        /// Whether the fetch contained this device's own record
        own_record: bool,
        commands: CommandReport,
        /// Watermark after the pass
        watermark: u64,
    },
}

impl SyncOutcome {
    pub const fn watermark(&self) -> u64 {
        match self {
            Self::NoChanges { watermark } | Self::Applied { watermark, .. } => *watermark,
        }
    }
}

fn enter(collection: &str, state: PassState) {
    tracing::debug!(collection, %state, "Sync pass state");
}

/// Run one pass for `collection`.
///
/// The watermark is advanced to the server's reported last-modified time only
/// after wipe, merge, and own-command processing have all completed. A reset
/// command in the own record that names `collection` clears it instead.
pub async fn synchronize<T, S, P, K, M>(
    ctx: SyncContext<'_, S, P, K>,
    info: &InfoCollections,
    collection: &str,
    decode: DecodeFn<T>,
    target: &M,
) -> SyncResult<SyncOutcome>
where
    S: CollectionStorage,
    P: PrefsStore,
    K: KeyProvider + ?Sized,
    M: MergeTarget<T>,
{
    let watermarks = Watermarks::new(ctx.prefs);

    enter(collection, PassState::CheckingChanges);
    let watermark = watermarks.get(collection).await?;
    if !has_remote_changes(info, collection, watermark) {
        tracing::info!(collection, watermark, "No remote changes");
        return Ok(SyncOutcome::NoChanges { watermark });
    }

    let factory = make_factory(ctx.keys, collection, decode).ok_or_else(|| {
        SyncError::FatalConfiguration(format!("keys for collection '{collection}' are unavailable"))
    })?;

    enter(collection, PassState::Fetching);
    let response = CollectionClient::new(ctx.storage, factory)
        .get_since(watermark)
        .await?;
    let last_modified = response.metadata.last_modified;
    let Changes { records, deleted } = response.value;
    let fetched = records.len();

    let wiped = watermark == 0;
    if wiped {
        enter(collection, PassState::Wiping);
        target.wipe().await?;
        tracing::info!(collection, "Wiped local records before first sync");
    }

    enter(collection, PassState::Merging);
    let (own, others): (Vec<_>, Vec<_>) = records
        .into_iter()
        .partition(|record| record.id == ctx.own_guid);
    let merged = target.merge(others).await?;

    let deleted: Vec<String> = deleted
        .into_iter()
        .filter(|id| id != ctx.own_guid)
        .collect();
    let deleted = if deleted.is_empty() {
        0
    } else {
        target.delete(&deleted).await?
    };

    let mut own = own.into_iter();
    let own_record = own.next();
    if own.next().is_some() {
        tracing::warn!(collection, "Fetch contained more than one own record; using the first");
    }

    let has_own_record = own_record.is_some();
    let commands = match own_record {
        Some(record) => {
            enter(collection, PassState::ProcessingOwnCommands);
            target.process_own(record).await
        }
        None => CommandReport::default(),
    };

    enter(collection, PassState::UpdatingWatermark);
    let watermark = if commands.resets(collection) {
        watermarks.clear(collection).await?;
        tracing::info!(collection, "Own record requested a reset; next pass refetches everything");
        0
    } else if last_modified > watermark {
        watermarks.set(collection, last_modified).await?;
        last_modified
    } else {
        tracing::warn!(
            collection,
            watermark,
            last_modified,
            "Server last-modified is not newer than the watermark; keeping watermark"
        );
        watermark
    };

    tracing::info!(collection, fetched, merged, deleted, wiped, watermark, "Sync pass completed");
    Ok(SyncOutcome::Applied {
        fetched,
        merged,
        deleted,
        wiped,
        own_record: has_own_record,
        commands,
        watermark,
    })
}
