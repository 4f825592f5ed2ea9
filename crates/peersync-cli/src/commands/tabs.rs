use std::path::Path;

use peersync_core::db::LibSqlTabStore;
use peersync_core::models::ClientTabs;

use crate::commands::common::{open_database, relative_to_now};
use crate::error::CliError;

pub fn filter_by_device(clients: Vec<ClientTabs>, device: Option<&str>) -> Vec<ClientTabs> {
    let Some(device) = device.map(str::trim).filter(|device| !device.is_empty()) else {
        return clients;
    };
    clients
        .into_iter()
        .filter(|client| {
            client.client_guid == device || client.client_name.eq_ignore_ascii_case(device)
        })
        .collect()
}

pub fn format_tab_lines(clients: &[ClientTabs]) -> Vec<String> {
    let mut lines = Vec::new();
    for client in clients {
        lines.push(format!(
            "{} ({}), {} tab(s)",
            client.client_name,
            client.client_guid,
            client.tabs.len()
        ));
        for tab in &client.tabs {
            let title = if tab.title.trim().is_empty() {
                tab.url.as_str()
            } else {
                tab.title.as_str()
            };
            lines.push(format!(
                "  {title}  <{}>  {}",
                tab.url,
                relative_to_now(tab.last_used)
            ));
        }
    }
    lines
}

pub async fn run_tabs(db_path: &Path, device: Option<&str>, as_json: bool) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let clients = filter_by_device(LibSqlTabStore::new(db.connection()).list().await?, device);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&clients)?);
        return Ok(());
    }

    if clients.is_empty() {
        println!("No remote tabs. Run `peersync sync` first.");
        return Ok(());
    }

    for line in format_tab_lines(&clients) {
        println!("{line}");
    }
    Ok(())
}
