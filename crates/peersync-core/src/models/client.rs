//! Device registry models

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sync::Record;

/// Device type assumed when a record omits `type`
pub const DEFAULT_CLIENT_TYPE: &str = "mobile";

fn default_client_type() -> String {
    DEFAULT_CLIENT_TYPE.to_string()
}

/// Decrypted payload of a `clients` collection record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPayload {
    /// Device GUID; matches the record id
    pub id: String,
    /// Human readable device name
    pub name: String,
    /// Device class, e.g. `desktop` or `mobile`
    #[serde(rename = "type", default = "default_client_type")]
    pub client_type: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub protocols: Vec<String>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub app_package: Option<String>,
    #[serde(default)]
    pub application: Option<String>,
    #[serde(default)]
    pub formfactor: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub fxa_device_id: Option<String>,
    /// Raw `{ "command": ..., "args": [...] }` entries addressed to this device
    #[serde(default)]
    pub commands: Vec<Value>,
}

impl ClientPayload {
    /// Decode a payload from decrypted JSON.
    ///
    /// Tombstones and records without an id or name decode to `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        if value.get("deleted").and_then(Value::as_bool) == Some(true) {
            return None;
        }
        let payload: Self = serde_json::from_value(value.clone()).ok()?;
        if payload.id.trim().is_empty() || payload.name.trim().is_empty() {
            return None;
        }
        Some(payload)
    }
}

/// A peer device as stored locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteClient {
    pub guid: String,
    pub name: String,
    pub client_type: String,
    pub version: Option<String>,
    pub protocols: Vec<String>,
    pub os: Option<String>,
    pub form_factor: Option<String>,
    pub device: Option<String>,
    pub fxa_device_id: Option<String>,
    /// Server modification time of the record (Unix ms)
    pub modified: u64,
}

impl From<Record<ClientPayload>> for RemoteClient {
    fn from(record: Record<ClientPayload>) -> Self {
        let payload = record.payload;
        Self {
            guid: record.id,
            name: payload.name,
            client_type: payload.client_type,
            version: payload.version,
            protocols: payload.protocols,
            os: payload.os,
            form_factor: payload.formfactor,
            device: payload.device,
            fxa_device_id: payload.fxa_device_id,
            modified: record.modified,
        }
    }
}
