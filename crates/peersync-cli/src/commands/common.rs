use std::env;
use std::path::{Path, PathBuf};

use chrono::Utc;
use peersync_core::config::{local_client_guid, ClientConfig, SyncSettings};
use peersync_core::db::{Database, LibSqlPrefs};
use peersync_core::models::RemoteClient;

use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("PEERSYNC_DB_PATH").map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("peersync").join("peersync.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub async fn open_database(path: &Path) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Database::open(path).await?)
}

/// Profile settings with environment overrides applied, before validation.
pub fn load_client_config(profile: Option<&str>) -> Result<ClientConfig, CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile);
    let stored = config.profile(&profile_name).cloned().unwrap_or_default();
    tracing::debug!("Using profile '{}'", profile_name);
    Ok(stored.with_env_overrides(|name| env::var(name).ok()))
}

pub fn load_sync_settings(profile: Option<&str>) -> Result<SyncSettings, CliError> {
    load_client_config(profile)?
        .resolve()
        .map_err(|error| CliError::Config(error.to_string()))
}

/// GUID of this device, honouring a configured id.
pub async fn own_guid(db: &Database, profile: Option<&str>) -> Result<String, CliError> {
    let configured = load_client_config(profile)?.client_id;
    let prefs = LibSqlPrefs::new(db.connection());
    Ok(local_client_guid(&prefs, configured.as_deref()).await?)
}

/// Find a peer by exact GUID, then by case-insensitive name.
pub fn find_device<'a>(clients: &'a [RemoteClient], query: &str) -> Result<&'a RemoteClient, CliError> {
    let query = query.trim();
    if let Some(client) = clients.iter().find(|client| client.guid == query) {
        return Ok(client);
    }

    let matches: Vec<&RemoteClient> = clients
        .iter()
        .filter(|client| client.name.eq_ignore_ascii_case(query))
        .collect();
    match matches.as_slice() {
        [] => Err(CliError::DeviceNotFound(query.to_string())),
        [client] => Ok(client),
        many => Err(CliError::AmbiguousDevice(format!(
            "'{query}' matches several devices: {}",
            many.iter()
                .map(|client| client.guid.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}

pub fn relative_to_now(timestamp_ms: u64) -> String {
    let timestamp_ms = i64::try_from(timestamp_ms).unwrap_or(i64::MAX);
    format_relative_time(timestamp_ms, Utc::now().timestamp_millis())
}
