use std::path::Path;

use peersync_core::db::LibSqlClientStore;
use peersync_core::models::RemoteClient;
use serde::Serialize;

use crate::commands::common::{open_database, relative_to_now};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ClientListItem {
    pub guid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub client_type: String,
    pub version: Option<String>,
    pub os: Option<String>,
    pub modified: u64,
    pub relative_time: String,
}

pub fn client_to_list_item(client: &RemoteClient) -> ClientListItem {
    ClientListItem {
        guid: client.guid.clone(),
        name: client.name.clone(),
        client_type: client.client_type.clone(),
        version: client.version.clone(),
        os: client.os.clone(),
        modified: client.modified,
        relative_time: relative_to_now(client.modified),
    }
}

pub fn format_client_lines(clients: &[RemoteClient]) -> Vec<String> {
    clients
        .iter()
        .map(|client| {
            let mut line = format!("{}  {} [{}]", client.guid, client.name, client.client_type);
            if let Some(os) = client.os.as_deref() {
                line.push_str(" on ");
                line.push_str(os);
            }
            line.push_str("  ");
            line.push_str(&relative_to_now(client.modified));
            line
        })
        .collect()
}

pub async fn run_clients(db_path: &Path, as_json: bool) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let clients = LibSqlClientStore::new(db.connection()).list().await?;

    if as_json {
        let json_items = clients
            .iter()
            .map(client_to_list_item)
            .collect::<Vec<ClientListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if clients.is_empty() {
        println!("No other devices known. Run `peersync sync` first.");
        return Ok(());
    }

    for line in format_client_lines(&clients) {
        println!("{line}");
    }
    Ok(())
}
