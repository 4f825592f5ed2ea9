//! Client configuration.
//!
//! Settings come from a stored profile and are overridden by environment
//! variables. Resolution validates them into `SyncSettings`, which is what the
//! sync passes consume.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::LibSqlPrefs;
use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const STORAGE_URL_ENV: &str = "PEERSYNC_STORAGE_URL";
pub const AUTH_TOKEN_ENV: &str = "PEERSYNC_AUTH_TOKEN";
pub const CLIENT_ID_ENV: &str = "PEERSYNC_CLIENT_ID";
pub const CLIENT_NAME_ENV: &str = "PEERSYNC_CLIENT_NAME";

/// Pref key holding the generated local device GUID
pub const CLIENT_GUID_PREF: &str = "client.guid";

const DEFAULT_CLIENT_NAME: &str = "peersync";

/// Unvalidated client configuration, as stored in a profile.
///
/// Every field is optional so partial profiles can be completed from the
/// environment.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// User's storage endpoint, e.g. `https://sync.example.com/1.5/12345`
    #[serde(default)]
    pub storage_url: Option<String>,
    /// Bearer token for the storage endpoint
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Fixed local device GUID; generated and persisted when absent
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ClientConfig")
            .field("storage_url", &self.storage_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("client_id", &self.client_id)
            .field("client_name", &self.client_name)
            .finish()
    }
}

impl ClientConfig {
    /// Apply environment overrides read through `lookup`.
    ///
    /// Blank values are ignored so an empty variable never erases a profile
    /// setting.
    #[must_use]
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| normalize_text_option(lookup(name));
        if let Some(value) = read(STORAGE_URL_ENV) {
            self.storage_url = Some(value);
        }
        if let Some(value) = read(AUTH_TOKEN_ENV) {
            self.auth_token = Some(value);
        }
        if let Some(value) = read(CLIENT_ID_ENV) {
            self.client_id = Some(value);
        }
        if let Some(value) = read(CLIENT_NAME_ENV) {
            self.client_name = Some(value);
        }
        self
    }

    /// Trim every field and drop empty ones.
    pub fn normalize(&mut self) {
        self.storage_url = normalize_text_option(self.storage_url.take());
        self.auth_token = normalize_text_option(self.auth_token.take());
        self.client_id = normalize_text_option(self.client_id.take());
        self.client_name = normalize_text_option(self.client_name.take());
    }

    /// Validate into settings usable for a sync.
    pub fn resolve(&self) -> Result<SyncSettings> {
        let storage_url = normalize_text_option(self.storage_url.clone()).ok_or_else(|| {
            Error::InvalidInput(format!("storage URL is not configured (set {STORAGE_URL_ENV})"))
        })?;
        if !is_http_url(&storage_url) {
            return Err(Error::InvalidInput(
                "storage URL must include http:// or https://".to_string(),
            ));
        }
        let auth_token = normalize_text_option(self.auth_token.clone()).ok_or_else(|| {
            Error::InvalidInput(format!("auth token is not configured (set {AUTH_TOKEN_ENV})"))
        })?;

        Ok(SyncSettings {
            storage_url: storage_url.trim_end_matches('/').to_string(),
            auth_token,
            client_id: normalize_text_option(self.client_id.clone()),
            client_name: normalize_text_option(self.client_name.clone())
                .unwrap_or_else(|| DEFAULT_CLIENT_NAME.to_string()),
        })
    }
}

/// Validated settings for talking to collection storage.
#[derive(Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub storage_url: String,
    pub auth_token: String,
    pub client_id: Option<String>,
    pub client_name: String,
}

impl std::fmt::Debug for SyncSettings {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncSettings")
            .field("storage_url", &self.storage_url)
            .field("auth_token", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .field("client_name", &self.client_name)
            .finish()
    }
}

/// GUID of the local device.
///
/// A configured id wins; otherwise the id stored in prefs is used, and a new
/// one is generated and stored on first use.
pub async fn local_client_guid(prefs: &LibSqlPrefs<'_>, configured: Option<&str>) -> Result<String> {
    if let Some(guid) = configured.map(str::trim).filter(|guid| !guid.is_empty()) {
        return Ok(guid.to_string());
    }
    if let Some(guid) = normalize_text_option(prefs.get_string(CLIENT_GUID_PREF).await?) {
        return Ok(guid);
    }

    let guid = Uuid::now_v7().simple().to_string();
    prefs.set_string(CLIENT_GUID_PREF, &guid).await?;
    tracing::info!(guid = %guid, "Generated local client GUID");
    Ok(guid)
}
