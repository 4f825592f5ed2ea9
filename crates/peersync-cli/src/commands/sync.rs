use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use peersync_core::db::{LibSqlClientStore, LibSqlPrefs, LibSqlTabStore};
use peersync_core::sync::{
    Cleartext, ClientsSynchronizer, CollectionStorage, CommandError, CommandSink,
    HttpStorageClient, StaticKeys, SyncContext, SyncError, SyncOutcome, TabsSynchronizer,
    Watermarks, CLIENTS_COLLECTION, TABS_COLLECTION,
};
use serde::Serialize;
use url::Url;

use crate::commands::common::{load_sync_settings, open_database, own_guid};
use crate::error::CliError;

/// A tab another device sent to this one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivedTab {
    pub uri: String,
    pub sender: String,
    pub title: Option<String>,
}

/// Command sink for CLI runs: collects received tabs and reset requests.
///
/// Resets are applied by `apply_resets` once every pass has committed, so a
/// running pass cannot overwrite a cleared watermark.
#[derive(Default)]
pub struct CliCommandSink {
    received: Mutex<Vec<ReceivedTab>>,
    resets: Mutex<BTreeSet<String>>,
}

impl CliCommandSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the watermark of every collection a reset command named.
    pub async fn apply_resets(&self, prefs: &LibSqlPrefs<'_>) -> Result<Vec<String>, CliError> {
        let collections: Vec<String> = self
            .resets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        let watermarks = Watermarks::new(prefs);
        for collection in &collections {
            watermarks.clear(collection).await?;
            tracing::info!(collection = collection.as_str(), "Reset watermark on remote request");
        }
        Ok(collections)
    }

    pub fn into_received(self) -> Vec<ReceivedTab> {
        self.received.into_inner().unwrap_or_default()
    }
}

impl CommandSink for CliCommandSink {
    async fn display_uri(
        &self,
        uri: &Url,
        sender: &str,
        title: Option<&str>,
    ) -> Result<(), CommandError> {
        tracing::info!(%uri, sender, "Received tab");
        self.received
            .lock()
            .map_err(|_| CommandError::Sink("received tab list poisoned".to_string()))?
            .push(ReceivedTab {
                uri: uri.to_string(),
                sender: sender.to_string(),
                title: title.map(ToString::to_string),
            });
        Ok(())
    }

    async fn reset_engine(&self, engine: Option<&str>) -> Result<(), CommandError> {
        let mut resets = self
            .resets
            .lock()
            .map_err(|_| CommandError::Sink("reset list poisoned".to_string()))?;
        match engine {
            Some(engine) => {
                resets.insert(engine.to_string());
            }
            None => {
                resets.insert(CLIENTS_COLLECTION.to_string());
                resets.insert(TABS_COLLECTION.to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct CollectionReport {
    pub collection: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<SyncOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl CollectionReport {
    pub fn new(collection: &'static str, result: &Result<SyncOutcome, SyncError>) -> Self {
        match result {
            Ok(outcome) => Self {
                collection,
                outcome: Some(outcome.clone()),
                error: None,
                retryable: None,
            },
            Err(error) => Self {
                collection,
                outcome: None,
                error: Some(error.to_string()),
                retryable: Some(error.is_retryable()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub client_guid: String,
    pub collections: Vec<CollectionReport>,
    pub received_tabs: Vec<ReceivedTab>,
}

pub async fn run_sync(db_path: &Path, profile: Option<&str>, as_json: bool) -> Result<(), CliError> {
    let settings = load_sync_settings(profile)?;
    let db = open_database(db_path).await?;
    let own_guid = own_guid(&db, profile).await?;

    let storage = HttpStorageClient::new(&settings.storage_url, &settings.auth_token)?;
    let keys = StaticKeys::with_default(Cleartext);
    let info = storage.info_collections().await?.value;

    // One connection per pass so the two merge transactions never interleave
    let clients_conn = db.connect().await?;
    let tabs_conn = db.connect().await?;
    let clients_prefs = LibSqlPrefs::new(&clients_conn);
    let tabs_prefs = LibSqlPrefs::new(&tabs_conn);
    let client_store = LibSqlClientStore::new(&clients_conn);
    let tab_store = LibSqlTabStore::new(&tabs_conn);
    let sink = CliCommandSink::new();

    let clients = ClientsSynchronizer::new(&client_store, &sink);
    let tabs = TabsSynchronizer::new(&tab_store);
    let (clients_result, tabs_result) = tokio::join!(
        clients.synchronize(
            SyncContext {
                own_guid: &own_guid,
                storage: &storage,
                prefs: &clients_prefs,
                keys: &keys,
            },
            &info,
        ),
        tabs.synchronize(
            SyncContext {
                own_guid: &own_guid,
                storage: &storage,
                prefs: &tabs_prefs,
                keys: &keys,
            },
            &info,
        ),
    );

    sink.apply_resets(&LibSqlPrefs::new(db.connection())).await?;

    let report = SyncReport {
        client_guid: own_guid.clone(),
        collections: vec![
            CollectionReport::new(CLIENTS_COLLECTION, &clients_result),
            CollectionReport::new(TABS_COLLECTION, &tabs_result),
        ],
        received_tabs: sink.into_received(),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_sync_report(&report) {
            println!("{line}");
        }
    }

    clients_result.map_err(|source| CliError::Sync {
        collection: CLIENTS_COLLECTION,
        source,
    })?;
    tabs_result.map_err(|source| CliError::Sync {
        collection: TABS_COLLECTION,
        source,
    })?;
    Ok(())
}

pub fn format_sync_report(report: &SyncReport) -> Vec<String> {
    let mut lines = Vec::new();
    for collection in &report.collections {
        let line = match (&collection.outcome, &collection.error) {
            (Some(SyncOutcome::NoChanges { .. }), _) => {
                format!("{}: up to date", collection.collection)
            }
            (
                Some(SyncOutcome::Applied {
                    fetched,
                    merged,
                    deleted,
                    wiped,
                    commands,
                    ..
                }),
                _,
            ) => {
                let mut line = format!(
                    "{}: fetched {fetched}, stored {merged}",
                    collection.collection
                );
                if *deleted > 0 {
                    line.push_str(&format!(", removed {deleted}"));
                }
                if *wiped {
                    line.push_str(" (full refresh)");
                }
                if !commands.executed.is_empty() {
                    line.push_str(&format!(", ran {} command(s)", commands.executed.len()));
                }
                if !commands.failed.is_empty() {
                    line.push_str(&format!(", {} command(s) failed", commands.failed.len()));
                }
                line
            }
            (None, Some(error)) => format!("{}: failed: {error}", collection.collection),
            (None, None) => format!("{}: skipped", collection.collection),
        };
        lines.push(line);
    }

    for tab in &report.received_tabs {
        let title = tab.title.as_deref().unwrap_or(&tab.uri);
        lines.push(format!("Tab from {}: {title} <{}>", tab.sender, tab.uri));
    }
    lines
}
