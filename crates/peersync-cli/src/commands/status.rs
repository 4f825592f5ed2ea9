use std::path::Path;

use peersync_core::db::{Database, LibSqlClientStore, LibSqlPrefs, LibSqlTabStore};
use peersync_core::sync::Watermarks;
use serde::Serialize;

use crate::cli::Collection;
use crate::commands::common::{format_sync_timestamp, open_database, own_guid};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct CollectionStatus {
    pub collection: &'static str,
    /// Last-fetched watermark (Unix ms); 0 when never synced
    pub watermark: u64,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub client_guid: String,
    pub collections: Vec<CollectionStatus>,
    pub remote_clients: usize,
    pub remote_tabs: usize,
    pub queued_commands: usize,
}

pub async fn collect_status(db: &Database, client_guid: String) -> Result<StatusReport, CliError> {
    let prefs = LibSqlPrefs::new(db.connection());
    let watermarks = Watermarks::new(&prefs);
    let mut collections = Vec::new();
    for collection in Collection::ALL {
        collections.push(CollectionStatus {
            collection: collection.name(),
            watermark: watermarks.get(collection.name()).await?,
        });
    }

    let client_store = LibSqlClientStore::new(db.connection());
    let tabs = LibSqlTabStore::new(db.connection()).list().await?;

    Ok(StatusReport {
        client_guid,
        collections,
        remote_clients: client_store.list().await?.len(),
        remote_tabs: tabs.iter().map(|client| client.tabs.len()).sum(),
        queued_commands: client_store.outgoing_commands().await?.len(),
    })
}

pub fn format_status_lines(report: &StatusReport) -> Vec<String> {
    let mut lines = vec![format!("Device GUID: {}", report.client_guid)];
    for status in &report.collections {
        let synced = if status.watermark == 0 {
            "never synced".to_string()
        } else {
            format_sync_timestamp(i64::try_from(status.watermark).unwrap_or(i64::MAX))
        };
        lines.push(format!("{}: {synced}", status.collection));
    }
    lines.push(format!("Known devices: {}", report.remote_clients));
    lines.push(format!("Remote tabs: {}", report.remote_tabs));
    lines.push(format!("Queued commands: {}", report.queued_commands));
    lines
}

pub async fn run_status(db_path: &Path, profile: Option<&str>, as_json: bool) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let client_guid = own_guid(&db, profile).await?;
    let report = collect_status(&db, client_guid).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_status_lines(&report) {
            println!("{line}");
        }
    }
    Ok(())
}
