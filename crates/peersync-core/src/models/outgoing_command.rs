//! Outbound command queue model

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A command queued locally for delivery to a peer device
///
/// Queued commands are never touched by a collection wipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingCommand {
    /// Queue row identifier
    pub id: i64,
    /// Target device GUID
    pub client_guid: String,
    /// Command name, e.g. `displayURI`
    pub command: String,
    /// Positional command arguments
    pub args: Vec<Value>,
    /// Queue time (Unix ms)
    pub created_at: i64,
}
