//! Remote collection-storage client.

use std::time::Duration;

use reqwest::header::{HeaderMap, ACCEPT};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use super::codec::{Decoded, RecordFactory};
use super::info::InfoCollections;
use super::record::{Changes, Envelope};
use crate::util::{compact_text, millis_to_seconds_param, normalize_text_option, parse_seconds_header};

const STORAGE_HTTP_TIMEOUT_SECS: u64 = 30;
const LAST_MODIFIED_HEADER: &str = "X-Last-Modified";
const TIMESTAMP_HEADER: &str = "X-Weave-Timestamp";

#[derive(Debug, Error)]
pub enum StorageClientError {
    #[error("Invalid storage configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Storage HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Storage server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Invalid storage response: {0}")]
    InvalidPayload(String),
}

pub type StorageClientResult<T> = Result<T, StorageClientError>;

/// Metadata the server attaches to every storage response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseMetadata {
    /// Last-modified time of the addressed resource (Unix ms)
    pub last_modified: u64,
}

/// A storage response value plus its metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageResponse<T> {
    pub value: T,
    pub metadata: ResponseMetadata,
}

/// Remote collection storage, addressed by collection name.
#[allow(async_fn_in_trait)]
pub trait CollectionStorage {
    /// Per-collection last-modified times.
    async fn info_collections(&self) -> StorageClientResult<StorageResponse<InfoCollections>>;

    /// Full records of `collection` modified after `since` (Unix ms).
    async fn get_since(
        &self,
        collection: &str,
        since: u64,
    ) -> StorageClientResult<StorageResponse<Vec<Envelope>>>;

    /// Delete every record of `collection` on the server.
    async fn delete_all(&self, collection: &str) -> StorageClientResult<StorageResponse<()>>;
}

/// Typed view of one collection: fetches envelopes and decodes them.
pub struct CollectionClient<'a, S, T> {
    storage: &'a S,
    factory: RecordFactory<T>,
}

impl<'a, S, T> CollectionClient<'a, S, T>
where
    S: CollectionStorage,
{
    pub const fn new(storage: &'a S, factory: RecordFactory<T>) -> Self {
        Self { storage, factory }
    }

    pub fn collection(&self) -> &str {
        self.factory.collection()
    }

    /// Fetch and decode records modified after `since`.
    ///
    /// Records that fail to decrypt or decode are skipped with a warning.
    pub async fn get_since(&self, since: u64) -> StorageClientResult<StorageResponse<Changes<T>>> {
        let response = self.storage.get_since(self.collection(), since).await?;
        let fetched = response.value.len();

        let mut changes = Changes {
            records: Vec::with_capacity(fetched),
            deleted: Vec::new(),
        };
        for envelope in &response.value {
            match self.factory.decode(envelope) {
                Ok(Decoded::Record(record)) => changes.records.push(record),
                Ok(Decoded::Tombstone(id)) => changes.deleted.push(id),
                Err(error) => tracing::warn!(
                    collection = self.collection(),
                    id = %envelope.id,
                    "Skipping undecodable record: {error}"
                ),
            }
        }

        tracing::debug!(
            collection = self.collection(),
            fetched,
            decoded = changes.records.len(),
            deleted = changes.deleted.len(),
            "Fetched changed records"
        );

        Ok(StorageResponse {
            value: changes,
            metadata: response.metadata,
        })
    }
}

/// Collection storage over HTTP, rooted at the user's storage endpoint
/// (e.g. `https://sync.example.com/1.5/12345`).
#[derive(Clone)]
pub struct HttpStorageClient {
    base_url: String,
    auth_token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpStorageClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpStorageClient")
            .field("base_url", &self.base_url)
            .field("auth_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl HttpStorageClient {
    pub fn new(
        base_url: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> StorageClientResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let auth_token = normalize_text_option(Some(auth_token.into())).ok_or_else(|| {
            StorageClientError::InvalidConfiguration("auth token must not be empty".to_string())
        })?;

        Ok(Self {
            base_url,
            auth_token,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(STORAGE_HTTP_TIMEOUT_SECS))
                .build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, collection: &str) -> StorageClientResult<String> {
        validate_collection_name(collection)?;
        Ok(format!("{}/storage/{collection}", self.base_url))
    }

    async fn check_status(response: reqwest::Response) -> StorageClientResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(StorageClientError::Status {
            status: status.as_u16(),
            message: parse_api_error(status, &body),
        })
    }
}

impl CollectionStorage for HttpStorageClient {
    async fn info_collections(&self) -> StorageClientResult<StorageResponse<InfoCollections>> {
        let response = self
            .client
            .get(format!("{}/info/collections", self.base_url))
            .bearer_auth(&self.auth_token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let metadata = response_metadata(response.headers())?;

        let body = response.json::<serde_json::Value>().await?;
        let value = InfoCollections::from_json(&body).map_err(StorageClientError::InvalidPayload)?;
        Ok(StorageResponse { value, metadata })
    }

    async fn get_since(
        &self,
        collection: &str,
        since: u64,
    ) -> StorageClientResult<StorageResponse<Vec<Envelope>>> {
        let url = self.collection_url(collection)?;
        let response = self
            .client
            .get(url)
            .query(&[("full", "1".to_string()), ("newer", millis_to_seconds_param(since))])
            .bearer_auth(&self.auth_token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let metadata = response_metadata(response.headers())?;

        let value = response.json::<Vec<Envelope>>().await?;
        Ok(StorageResponse { value, metadata })
    }

    async fn delete_all(&self, collection: &str) -> StorageClientResult<StorageResponse<()>> {
        let url = self.collection_url(collection)?;
        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.auth_token)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let metadata = response_metadata(response.headers())?;
        Ok(StorageResponse {
            value: (),
            metadata,
        })
    }
}

/// Prefer `X-Last-Modified`, falling back to the server clock header.
fn response_metadata(headers: &HeaderMap) -> StorageClientResult<ResponseMetadata> {
    [LAST_MODIFIED_HEADER, TIMESTAMP_HEADER]
        .iter()
        .find_map(|name| {
            headers
                .get(*name)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_seconds_header)
        })
        .map(|last_modified| ResponseMetadata { last_modified })
        .ok_or_else(|| {
            StorageClientError::InvalidPayload(format!(
                "response did not include {LAST_MODIFIED_HEADER}/{TIMESTAMP_HEADER}"
            ))
        })
}

#[derive(Debug, Deserialize)]
struct StorageErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<StorageErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> StorageClientResult<String> {
    let base_url = normalize_text_option(Some(raw)).ok_or_else(|| {
        StorageClientError::InvalidConfiguration("storage URL must not be empty".to_string())
    })?;
    if crate::util::is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(StorageClientError::InvalidConfiguration(
            "storage URL must include http:// or https://".to_string(),
        ))
    }
}

fn validate_collection_name(collection: &str) -> StorageClientResult<()> {
    let valid = !collection.is_empty()
        && collection
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(StorageClientError::InvalidConfiguration(format!(
            "invalid collection name '{collection}'"
        )))
    }
}
