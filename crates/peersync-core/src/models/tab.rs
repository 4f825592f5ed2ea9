//! Open-tab list models

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::sync::Record;
use crate::util::seconds_to_millis;

/// A single tab as sent by a peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabPayload {
    #[serde(default)]
    pub title: String,
    /// Back history, most recent first
    #[serde(default)]
    pub url_history: Vec<String>,
    #[serde(default)]
    pub icon: Option<String>,
    /// Last use time in Unix ms; the wire carries seconds as number or string
    #[serde(default, deserialize_with = "deserialize_last_used")]
    pub last_used: u64,
}

fn deserialize_last_used<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let seconds = match &value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(seconds.and_then(seconds_to_millis).unwrap_or(0))
}

/// Decrypted payload of a `tabs` collection record: one per device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabsPayload {
    /// GUID of the device owning these tabs
    pub id: String,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub tabs: Vec<TabPayload>,
}

impl TabsPayload {
    /// Decode a payload from decrypted JSON.
    ///
    /// Tombstones decode to `None`; tabs without any URL are dropped.
    pub fn from_json(value: &Value) -> Option<Self> {
        if value.get("deleted").and_then(Value::as_bool) == Some(true) {
            return None;
        }
        let mut payload: Self = serde_json::from_value(value.clone()).ok()?;
        if payload.id.trim().is_empty() {
            return None;
        }
        payload.tabs.retain(|tab| {
            tab.url_history
                .first()
                .is_some_and(|url| !url.trim().is_empty())
        });
        Some(payload)
    }
}

/// A peer's tab as stored locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTab {
    pub client_guid: String,
    pub title: String,
    /// Current URL (head of `url_history`)
    pub url: String,
    pub url_history: Vec<String>,
    pub icon: Option<String>,
    pub last_used: u64,
}

/// All tabs for one peer, replaced as a unit on merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientTabs {
    pub client_guid: String,
    pub client_name: String,
    /// Server modification time of the record (Unix ms)
    pub modified: u64,
    pub tabs: Vec<RemoteTab>,
}

impl From<Record<TabsPayload>> for ClientTabs {
    fn from(record: Record<TabsPayload>) -> Self {
        let client_guid = record.id;
        let tabs = record
            .payload
            .tabs
            .into_iter()
            .filter_map(|tab| {
                let url = tab.url_history.first()?.clone();
                Some(RemoteTab {
                    client_guid: client_guid.clone(),
                    title: tab.title,
                    url,
                    url_history: tab.url_history,
                    icon: tab.icon,
                    last_used: tab.last_used,
                })
            })
            .collect();

        Self {
            client_name: record.payload.client_name,
            modified: record.modified,
            client_guid,
            tabs,
        }
    }
}
