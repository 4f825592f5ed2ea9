//! `tabs` collection: open tabs of other devices.

use super::codec::KeyProvider;
use super::client::CollectionStorage;
use super::error::SyncResult;
use super::info::InfoCollections;
use super::record::Record;
use super::synchronizer::{synchronize, MergeTarget, SyncContext, SyncOutcome};
use crate::db::{LocalTabStore, PrefsStore};
use crate::error::Result;
use crate::models::{ClientTabs, TabsPayload};

pub const TABS_COLLECTION: &str = "tabs";

/// Syncs peer tab lists into a local tab store.
///
/// The local device's own tabs record is skipped.
pub struct TabsSynchronizer<'a, L> {
    store: &'a L,
}

impl<'a, L: LocalTabStore> TabsSynchronizer<'a, L> {
    pub const fn new(store: &'a L) -> Self {
        Self { store }
    }

    /// Run one `tabs` pass.
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
        synchronize(ctx, info, TABS_COLLECTION, TabsPayload::from_json, self).await
    }
}

impl<L: LocalTabStore> MergeTarget<TabsPayload> for TabsSynchronizer<'_, L> {
    async fn wipe(&self) -> Result<()> {
        self.store.wipe_remote_tabs().await
    }

    async fn merge(&self, records: Vec<Record<TabsPayload>>) -> Result<usize> {
        let clients: Vec<ClientTabs> = records.into_iter().map(ClientTabs::from).collect();
        self.store.upsert_tabs_for_clients(&clients).await
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        self.store.delete_tabs_for_clients(ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, LibSqlPrefs, LibSqlTabStore};
    use crate::sync::codec::{Cleartext, StaticKeys};
    use crate::sync::synchronizer::tests::FakeStorage;
    use crate::sync::watermark::Watermarks;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn storage() -> FakeStorage {
        FakeStorage::with_records(
            3_000,
            &[
                (
                    "A",
                    3_000,
                    json!({
                        "id": "A",
                        "clientName": "This device",
                        "tabs": [{ "title": "Mine", "urlHistory": ["https://mine.example"], "lastUsed": 1 }]
                    }),
                ),
                (
                    "B",
                    2_500,
                    json!({
                        "id": "B",
                        "clientName": "Laptop",
                        "tabs": [
                            { "title": "Docs", "urlHistory": ["https://docs.example", "https://start.example"], "lastUsed": 1700000000 },
                            { "title": "Blank", "urlHistory": [] }
                        ]
                    }),
                ),
            ],
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stores_peer_tabs_but_not_own() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlTabStore::new(db.connection());
        let prefs = LibSqlPrefs::new(db.connection());
        let keys = StaticKeys::with_default(Cleartext);
        let storage = storage();
        let info = InfoCollections::new([(TABS_COLLECTION, 3_000)]);

        let outcome = TabsSynchronizer::new(&store)
            .synchronize(
                SyncContext {
                    own_guid: "A",
                    storage: &storage,
                    prefs: &prefs,
                    keys: &keys,
                },
                &info,
            )
            .await
            .unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].client_guid, "B");
        assert_eq!(listed[0].client_name, "Laptop");
        let urls: Vec<&str> = listed[0].tabs.iter().map(|tab| tab.url.as_str()).collect();
        assert_eq!(urls, vec!["https://docs.example"]);
        assert_eq!(listed[0].tabs[0].last_used, 1_700_000_000_000);

        match outcome {
            SyncOutcome::Applied {
                own_record,
                commands,
                watermark,
                ..
            } => {
                assert!(own_record);
                assert!(commands.is_empty());
                assert_eq!(watermark, 3_000);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn incremental_pass_keeps_untouched_peers() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlTabStore::new(db.connection());
        let prefs = LibSqlPrefs::new(db.connection());
        let keys = StaticKeys::with_default(Cleartext);
        let storage = storage();
        let info = InfoCollections::new([(TABS_COLLECTION, 3_000)]);

        store
            .upsert_tabs_for_clients(&[ClientTabs {
                client_guid: "C".to_string(),
                client_name: "Tablet".to_string(),
                modified: 1_000,
                tabs: Vec::new(),
            }])
            .await
            .unwrap();
        Watermarks::new(&prefs)
            .set(TABS_COLLECTION, 2_000)
            .await
            .unwrap();

        TabsSynchronizer::new(&store)
            .synchronize(
                SyncContext {
                    own_guid: "A",
                    storage: &storage,
                    prefs: &prefs,
                    keys: &keys,
                },
                &info,
            )
            .await
            .unwrap();

        let guids: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|client| client.client_guid)
            .collect();
        assert_eq!(guids, vec!["B", "C"]);
        assert_eq!(*storage.since.lock().unwrap(), vec![2_000]);
    }
}
