//! `clients` collection: the registry of devices on the account.

use super::codec::KeyProvider;
use super::client::CollectionStorage;
use super::commands::{process_commands, CommandReport, CommandSink};
use super::error::SyncResult;
use super::info::InfoCollections;
use super::record::Record;
use super::synchronizer::{synchronize, MergeTarget, SyncContext, SyncOutcome};
use crate::db::{LocalClientStore, PrefsStore};
use crate::error::Result;
use crate::models::{ClientPayload, RemoteClient};

pub const CLIENTS_COLLECTION: &str = "clients";

/// Syncs peer devices into a local client store and runs commands sent to
/// this device.
pub struct ClientsSynchronizer<'a, L, C> {
    store: &'a L,
    sink: &'a C,
}

impl<'a, L, C> ClientsSynchronizer<'a, L, C>
where
    L: LocalClientStore,
    C: CommandSink,
{
    pub const fn new(store: &'a L, sink: &'a C) -> Self {
        Self { store, sink }
    }

    /// Run one `clients` pass.
    pub async fn synchronize<S, P, K>(
        &self,
        ctx: SyncContext<'_, S, P, K>,
        info: &InfoCollections,
    ) -> SyncResult<SyncOutcome>
    where
        S: CollectionStorage,
        P: PrefsStore,
        K: KeyProvider + ?Sized,
    {
        synchronize(ctx, info, CLIENTS_COLLECTION, ClientPayload::from_json, self).await
    }
}

impl<L, C> MergeTarget<ClientPayload> for ClientsSynchronizer<'_, L, C>
where
    L: LocalClientStore,
    C: CommandSink,
{
    async fn wipe(&self) -> Result<()> {
        self.store.wipe_remote_clients().await
    }

    async fn merge(&self, records: Vec<Record<ClientPayload>>) -> Result<usize> {
        let clients: Vec<RemoteClient> = records.into_iter().map(RemoteClient::from).collect();
        self.store.upsert_remote_clients(&clients).await
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        self.store.delete_remote_clients(ids).await
    }

    async fn process_own(&self, record: Record<ClientPayload>) -> CommandReport {
        let report = process_commands(&record.payload.commands, self.sink).await;
        if !report.is_empty() {
            tracing::info!(
                executed = report.executed.len(),
                failed = report.failed.len(),
                dropped = report.dropped,
                "Processed commands from own client record"
            );
        }
        report
    }
}
