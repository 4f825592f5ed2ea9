//! Remote record types

use serde::{Deserialize, Deserializer};

use crate::util::seconds_to_millis;

/// A decoded remote record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<T> {
    /// Record GUID; for `clients` and `tabs` this is the device GUID
    pub id: String,
    /// Server modification time (Unix ms)
    pub modified: u64,
    pub payload: T,
}

/// Decoded result of one incremental fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changes<T> {
    pub records: Vec<Record<T>>,
    /// Ids of records deleted on the server
    pub deleted: Vec<String>,
}

impl<T> Default for Changes<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            deleted: Vec::new(),
        }
    }
}

/// A record as returned by collection storage, before decryption
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Envelope {
    pub id: String,
    /// Server modification time (Unix ms); decimal seconds on the wire
    #[serde(deserialize_with = "deserialize_modified")]
    pub modified: u64,
    /// Encrypted (or cleartext) payload string
    pub payload: String,
}

fn deserialize_modified<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds = f64::deserialize(deserializer)?;
    seconds_to_millis(seconds)
        .ok_or_else(|| serde::de::Error::custom("modified must be a non-negative number"))
}
