//! `info/collections` snapshot and change detection

use std::collections::HashMap;

use serde_json::Value;

use crate::util::seconds_to_millis;

/// Server last-modified time per collection, fetched once per sync round
/// and shared read-only by every synchronizer in that round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoCollections {
    modified: HashMap<String, u64>,
}

impl InfoCollections {
    /// Build a snapshot from millisecond timestamps.
    pub fn new<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, u64)>,
        K: Into<String>,
    {
        Self {
            modified: entries
                .into_iter()
                .map(|(name, modified)| (name.into(), modified))
                .collect(),
        }
    }

    /// Parse the server's JSON body, where values are decimal seconds.
    pub fn from_json(value: &Value) -> Result<Self, String> {
        let object = value
            .as_object()
            .ok_or_else(|| "info/collections body must be a JSON object".to_string())?;

        let mut modified = HashMap::with_capacity(object.len());
        for (name, timestamp) in object {
            let millis = timestamp
                .as_f64()
                .and_then(seconds_to_millis)
                .ok_or_else(|| format!("invalid timestamp for collection '{name}'"))?;
            modified.insert(name.clone(), millis);
        }
        Ok(Self { modified })
    }

    /// Server last-modified time for `collection`, if the server knows it.
    pub fn modified(&self, collection: &str) -> Option<u64> {
        self.modified.get(collection).copied()
    }

    /// Names of all collections present on the server.
    pub fn collections(&self) -> impl Iterator<Item = &str> {
        self.modified.keys().map(String::as_str)
    }
}

/// Whether the server holds anything newer than `watermark` for `collection`.
///
/// A collection absent from the snapshot has no changes.
pub fn has_remote_changes(info: &InfoCollections, collection: &str, watermark: u64) -> bool {
    info.modified(collection)
        .is_some_and(|modified| modified > watermark)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn changes_only_when_server_is_newer() {
        let info = InfoCollections::new([("clients", 1_000)]);
        assert!(has_remote_changes(&info, "clients", 0));
        assert!(has_remote_changes(&info, "clients", 999));
        assert!(!has_remote_changes(&info, "clients", 1_000));
        assert!(!has_remote_changes(&info, "clients", 2_000));
    }

    #[test]
    fn missing_collection_has_no_changes() {
        let info = InfoCollections::new([("clients", 1_000)]);
        assert!(!has_remote_changes(&info, "tabs", 0));
    }

    #[test]
    fn from_json_converts_seconds() {
        let info = InfoCollections::from_json(&json!({ "clients": 1.5, "tabs": 2 })).unwrap();
        assert_eq!(info.modified("clients"), Some(1_500));
        assert_eq!(info.modified("tabs"), Some(2_000));
        let mut names: Vec<&str> = info.collections().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["clients", "tabs"]);
    }

    #[test]
    fn from_json_rejects_invalid_bodies() {
        assert!(InfoCollections::from_json(&json!([1, 2])).is_err());
        assert!(InfoCollections::from_json(&json!({ "clients": "soon" })).is_err());
        assert!(InfoCollections::from_json(&json!({ "clients": -3 })).is_err());
    }
}
