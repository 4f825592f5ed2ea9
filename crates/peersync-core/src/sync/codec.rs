//! Per-collection record codec factory.
//!
//! Key management and payload cryptography live outside this crate. A
//! [`KeyProvider`] hands out a [`PayloadDecryptor`] for each collection it
//! holds keys for; [`make_factory`] pairs that decryptor with a typed decode
//! function.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use super::record::{Envelope, Record};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Payload decryption failed: {0}")]
    Decrypt(String),
    #[error("Payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Payload id '{payload}' does not match record id '{record}'")]
    IdMismatch { record: String, payload: String },
    #[error("Record '{0}' could not be decoded")]
    Undecodable(String),
}

/// Turns an envelope's payload string into cleartext JSON.
pub trait PayloadDecryptor: Send + Sync {
    fn decrypt(&self, payload: &str) -> Result<Value, CodecError>;
}

/// Supplies decryptors for the collections whose keys are available.
pub trait KeyProvider {
    /// `None` when keys for `collection` are not (yet) available.
    fn decryptor_for(&self, collection: &str) -> Option<Arc<dyn PayloadDecryptor>>;
}

/// Payloads stored as plain JSON strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cleartext;

impl PayloadDecryptor for Cleartext {
    fn decrypt(&self, payload: &str) -> Result<Value, CodecError> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Fixed decryptor assignment, optionally with a default for every collection.
#[derive(Clone, Default)]
pub struct StaticKeys {
    default: Option<Arc<dyn PayloadDecryptor>>,
    collections: HashMap<String, Arc<dyn PayloadDecryptor>>,
}

impl StaticKeys {
    /// No keys at all; every factory request fails.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Use `decryptor` for every collection.
    pub fn with_default(decryptor: impl PayloadDecryptor + 'static) -> Self {
        Self {
            default: Some(Arc::new(decryptor)),
            collections: HashMap::new(),
        }
    }

    /// Use `decryptor` for `collection`, overriding any default.
    #[must_use]
    pub fn with_collection(
        mut self,
        collection: impl Into<String>,
        decryptor: impl PayloadDecryptor + 'static,
    ) -> Self {
        self.collections
            .insert(collection.into(), Arc::new(decryptor));
        self
    }
}

impl fmt::Debug for StaticKeys {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut collections: Vec<&String> = self.collections.keys().collect();
        collections.sort();
        formatter
            .debug_struct("StaticKeys")
            .field("default", &self.default.is_some())
            .field("collections", &collections)
            .finish()
    }
}

impl KeyProvider for StaticKeys {
    fn decryptor_for(&self, collection: &str) -> Option<Arc<dyn PayloadDecryptor>> {
        self.collections
            .get(collection)
            .or(self.default.as_ref())
            .cloned()
    }
}

/// Decode function from cleartext JSON to a typed payload.
pub type DecodeFn<T> = fn(&Value) -> Option<T>;

/// Decrypts and decodes envelopes of a single collection.
pub struct RecordFactory<T> {
    collection: String,
    decryptor: Arc<dyn PayloadDecryptor>,
    decode: DecodeFn<T>,
}

impl<T> RecordFactory<T> {
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Decrypt and decode one envelope.
    ///
    /// A payload carrying an `id` different from the envelope's is rejected.
    /// A payload marked `deleted` decodes to a tombstone.
    pub fn decode(&self, envelope: &Envelope) -> Result<Decoded<T>, CodecError> {
        let cleartext = self.decryptor.decrypt(&envelope.payload)?;

        if let Some(payload_id) = cleartext.get("id").and_then(Value::as_str) {
            if payload_id != envelope.id {
                return Err(CodecError::IdMismatch {
                    record: envelope.id.clone(),
                    payload: payload_id.to_string(),
                });
            }
        }

        if cleartext.get("deleted").and_then(Value::as_bool) == Some(true) {
            return Ok(Decoded::Tombstone(envelope.id.clone()));
        }

        let payload = (self.decode)(&cleartext)
            .ok_or_else(|| CodecError::Undecodable(envelope.id.clone()))?;

        Ok(Decoded::Record(Record {
            id: envelope.id.clone(),
            modified: envelope.modified,
            payload,
        }))
    }
}

/// A decoded envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<T> {
    Record(Record<T>),
    /// Id of a record deleted on the server
    Tombstone(String),
}

impl<T> Decoded<T> {
    pub fn into_record(self) -> Option<Record<T>> {
        match self {
            Self::Record(record) => Some(record),
            Self::Tombstone(_) => None,
        }
    }
}

impl<T> fmt::Debug for RecordFactory<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RecordFactory")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

/// Build a record factory for `collection`, or `None` when its keys are
/// unavailable.
pub fn make_factory<K, T>(
    keys: &K,
    collection: &str,
    decode: DecodeFn<T>,
) -> Option<RecordFactory<T>>
where
    K: KeyProvider + ?Sized,
{
    let decryptor = keys.decryptor_for(collection)?;
    Some(RecordFactory {
        collection: collection.to_string(),
        decryptor,
        decode,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Rejecting;

    impl PayloadDecryptor for Rejecting {
        fn decrypt(&self, _payload: &str) -> Result<Value, CodecError> {
            Err(CodecError::Decrypt("HMAC mismatch".to_string()))
        }
    }

    fn decode_name(value: &Value) -> Option<String> {
        value.get("name").and_then(Value::as_str).map(ToString::to_string)
    }

    fn envelope(id: &str, payload: &Value) -> Envelope {
        Envelope {
            id: id.to_string(),
            modified: 1_000,
            payload: payload.to_string(),
        }
    }

    #[test]
    fn factory_requires_keys() {
        assert!(make_factory(&StaticKeys::empty(), "clients", decode_name).is_none());

        let keys = StaticKeys::empty().with_collection("tabs", Cleartext);
        assert!(make_factory(&keys, "clients", decode_name).is_none());
        assert!(make_factory(&keys, "tabs", decode_name).is_some());
    }

    #[test]
    fn collection_keys_override_default() {
        let keys = StaticKeys::with_default(Cleartext).with_collection("clients", Rejecting);
        let clients = make_factory(&keys, "clients", decode_name).unwrap();
        let tabs = make_factory(&keys, "tabs", decode_name).unwrap();
        let record = envelope("A", &json!({ "id": "A", "name": "Phone" }));

        assert!(matches!(clients.decode(&record), Err(CodecError::Decrypt(_))));
        assert_eq!(tabs.decode(&record).unwrap().into_record().unwrap().payload, "Phone");
    }

    #[test]
    fn decode_keeps_envelope_metadata() {
        let factory = make_factory(&StaticKeys::with_default(Cleartext), "clients", decode_name)
            .unwrap();
        let record = factory
            .decode(&envelope("A", &json!({ "id": "A", "name": "Phone" })))
            .unwrap()
            .into_record()
            .unwrap();

        assert_eq!(record.id, "A");
        assert_eq!(record.modified, 1_000);
        assert_eq!(factory.collection(), "clients");
    }

    #[test]
    fn decode_rejects_mismatched_ids_and_undecodable_payloads() {
        let factory = make_factory(&StaticKeys::with_default(Cleartext), "clients", decode_name)
            .unwrap();

        let mismatched = factory.decode(&envelope("A", &json!({ "id": "B", "name": "x" })));
        assert!(matches!(mismatched, Err(CodecError::IdMismatch { .. })));

        let undecodable = factory.decode(&envelope("A", &json!({ "id": "A" })));
        assert!(matches!(undecodable, Err(CodecError::Undecodable(_))));

        let garbage = factory.decode(&Envelope {
            id: "A".to_string(),
            modified: 1,
            payload: "{not json".to_string(),
        });
        assert!(matches!(garbage, Err(CodecError::Json(_))));
    }

    #[test]
    fn deleted_payloads_decode_to_tombstones() {
        let factory = make_factory(&StaticKeys::with_default(Cleartext), "clients", decode_name)
            .unwrap();

        let decoded = factory
            .decode(&envelope("B", &json!({ "id": "B", "deleted": true })))
            .unwrap();
        assert_eq!(decoded, Decoded::Tombstone("B".to_string()));

        let mismatched = factory.decode(&envelope("B", &json!({ "id": "C", "deleted": true })));
        assert!(matches!(mismatched, Err(CodecError::IdMismatch { .. })));
    }
}
