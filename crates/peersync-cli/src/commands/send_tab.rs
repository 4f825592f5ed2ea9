use std::path::Path;

use peersync_core::db::LibSqlClientStore;
use peersync_core::models::OutgoingCommand;
use peersync_core::sync::Command;
use peersync_core::util::normalize_text_option;
use url::Url;

use crate::commands::common::{find_device, open_database, own_guid};
use crate::error::CliError;

/// Build the `displayURI` command sent to another device.
pub fn display_uri_command(url: &str, sender: &str, title: Option<String>) -> Result<Command, CliError> {
    let uri = Url::parse(url.trim()).map_err(|_| CliError::InvalidUrl(url.to_string()))?;
    Ok(Command::DisplayUri {
        uri,
        sender: sender.to_string(),
        title: normalize_text_option(title),
    })
}

pub async fn run_send_tab(
    db_path: &Path,
    profile: Option<&str>,
    device: &str,
    url: &str,
    title: Option<String>,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let sender = own_guid(&db, profile).await?;
    let store = LibSqlClientStore::new(db.connection());

    let clients = store.list().await?;
    let target = find_device(&clients, device)?;
    let command = display_uri_command(url, &sender, title)?;

    let queued: OutgoingCommand = store
        .queue_command(&target.guid, command.name(), &command.args())
        .await?;
    tracing::debug!(id = queued.id, "Queued outgoing command");
    println!(
        "Queued {} for {} ({})",
        queued.command, target.name, target.guid
    );
    Ok(())
}
