//! HTTP key/value blob implementation of the `ShipmentStore` trait.
//!
//! The whole collection lives in one JSON blob (`{"shipments": [...]}`):
//! `GET` reads it, `PUT` replaces it. Per-document operations are emulated
//! with a read-modify-write cycle over the entire blob, serialized inside
//! this adapter so two writes from the same process cannot interleave.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use shiptrack_core::error::DomainError;
use shiptrack_core::store::{
    Document, ShipmentStore, check_insertable, check_revision, merge_fields, position_by_key,
    prepend_event, stamp_inserted,
};

const MASTER_KEY_HEADER: HeaderName = HeaderName::from_static("x-master-key");
const BIN_META_HEADER: HeaderName = HeaderName::from_static("x-bin-meta");

/// Bounded retry with linear backoff for transient store failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Delay before attempt `n + 1` is `n * base_backoff_ms`.
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_backoff_ms: 120,
        }
    }
}

/// Connection settings for [`HttpBlobStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpBlobConfig {
    /// Full URL of the blob.
    pub url: String,
    /// Value for the `X-Master-Key` header, if the blob is private.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry policy.
    pub retry: RetryPolicy,
}

/// Statuses returned to the caller without retrying.
fn is_final(status: StatusCode) -> bool {
    status.is_success() || status == StatusCode::NOT_FOUND
}

/// Statuses worth another attempt. Any other failure is permanent.
fn is_transient(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

/// Wire shape of the blob.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Bin {
    #[serde(default)]
    shipments: Vec<Document>,
}

/// Blob-backed shipment store.
#[derive(Debug)]
pub struct HttpBlobStore {
    url: String,
    headers: HeaderMap,
    retry: RetryPolicy,
    client: reqwest::Client,
    write_lock: Mutex<()>,
}

impl HttpBlobStore {
    /// Creates a store for the blob at `config.url`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StoreUnavailable` if the URL is invalid, the API
    /// key is not a valid header value, or the HTTP client cannot be built.
    pub fn new(config: HttpBlobConfig) -> Result<Self, DomainError> {
        reqwest::Url::parse(&config.url)
            .map_err(|e| DomainError::StoreUnavailable(format!("invalid blob url: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(BIN_META_HEADER, HeaderValue::from_static("false"));
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(key)
                .map_err(|e| DomainError::StoreUnavailable(format!("invalid api key header: {e}")))?;
            headers.insert(MASTER_KEY_HEADER, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DomainError::StoreUnavailable(format!("http client build failed: {e}")))?;

        Ok(Self {
            url: config.url.trim_end_matches('/').to_owned(),
            headers,
            retry: config.retry,
            client,
            write_lock: Mutex::new(()),
        })
    }

    /// Sends the request built by `build`, retrying transport errors and
    /// transient statuses (5xx, 408, 429). A 404 is returned to the caller
    /// and any other status fails at once.
    async fn send_with_retry<F>(
        &self,
        operation: &'static str,
        build: F,
    ) -> Result<reqwest::Response, DomainError>
    where
        F: Fn() -> reqwest::RequestBuilder + Send + Sync,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match build().send().await {
                Ok(resp) if is_final(resp.status()) => return Ok(resp),
                Ok(resp) if !is_transient(resp.status()) => {
                    return Err(DomainError::StoreUnavailable(format!(
                        "{operation} rejected status={} url={}",
                        resp.status(),
                        self.url
                    )));
                }
                Ok(resp) => {
                    if attempt >= self.retry.max_attempts {
                        return Err(DomainError::StoreUnavailable(format!(
                            "{operation} failed status={} url={}",
                            resp.status(),
                            self.url
                        )));
                    }
                    warn!(
                        operation,
                        attempt,
                        status = %resp.status(),
                        "blob request failed, retrying"
                    );
                }
                Err(e) => {
                    if attempt >= self.retry.max_attempts {
                        return Err(DomainError::StoreUnavailable(format!(
                            "{operation} failed url={}: {e}",
                            self.url
                        )));
                    }
                    warn!(operation, attempt, error = %e, "blob request failed, retrying");
                }
            }
            tokio::time::sleep(Duration::from_millis(
                self.retry
                    .base_backoff_ms
                    .saturating_mul(u64::from(attempt)),
            ))
            .await;
        }
    }

    /// Reads the whole collection. A missing blob reads as empty.
    #[instrument(name = "blob_read", skip(self))]
    async fn read_bin(&self) -> Result<Vec<Document>, DomainError> {
        let resp = self
            .send_with_retry("read", || {
                self.client.get(&self.url).headers(self.headers.clone())
            })
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!("blob not found, treating collection as empty");
            return Ok(Vec::new());
        }
        let bin: Bin = resp
            .json()
            .await
            .map_err(|e| DomainError::StoreUnavailable(format!("blob parse failed: {e}")))?;
        Ok(bin.shipments)
    }

    /// Replaces the whole collection.
    #[instrument(name = "blob_write", skip(self, shipments), fields(count = shipments.len()))]
    async fn write_bin(&self, shipments: Vec<Document>) -> Result<(), DomainError> {
        let body = Bin { shipments };
        let resp = self
            .send_with_retry("write", || {
                self.client
                    .put(&self.url)
                    .headers(self.headers.clone())
                    .json(&body)
            })
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(DomainError::StoreUnavailable(format!(
                "write failed status={} url={}",
                resp.status(),
                self.url
            )))
        }
    }

    /// Runs one serialized read-modify-write cycle. `apply` edits the
    /// collection in place and returns the value to hand back; nothing is
    /// written if it fails.
    async fn modify<T, F>(&self, apply: F) -> Result<T, DomainError>
    where
        F: FnOnce(&mut Vec<Document>) -> Result<T, DomainError> + Send,
        T: Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut documents = self.read_bin().await?;
        let outcome = apply(&mut documents)?;
        self.write_bin(documents).await?;
        Ok(outcome)
    }
}

#[async_trait]
impl ShipmentStore for HttpBlobStore {
    fn backend_tag(&self) -> &'static str {
        "http-blob"
    }

    async fn fetch_all(&self) -> Result<Vec<Document>, DomainError> {
        self.read_bin().await
    }

    async fn fetch_one(&self, key: &str) -> Result<Option<Document>, DomainError> {
        let mut documents = self.read_bin().await?;
        Ok(position_by_key(&documents, key).map(|index| documents.swap_remove(index)))
    }

    async fn insert(&self, mut document: Document) -> Result<Document, DomainError> {
        self.modify(move |documents| {
            check_insertable(documents, &document)?;
            stamp_inserted(&mut document);
            documents.insert(0, document.clone());
            Ok(document)
        })
        .await
    }

    async fn merge(
        &self,
        key: &str,
        expected_revision: Option<i64>,
        fields: Document,
    ) -> Result<Document, DomainError> {
        self.modify(move |documents| {
            let index = position_by_key(documents, key)
                .ok_or_else(|| DomainError::NotFound(key.to_owned()))?;
            let document = &mut documents[index];
            check_revision(document, key, expected_revision)?;
            merge_fields(document, fields);
            Ok(document.clone())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), DomainError> {
        self.modify(move |documents| {
            let index = position_by_key(documents, key)
                .ok_or_else(|| DomainError::NotFound(key.to_owned()))?;
            documents.remove(index);
            Ok(())
        })
        .await
    }

    async fn append_event(&self, key: &str, event: Value) -> Result<Document, DomainError> {
        self.modify(move |documents| {
            let index = position_by_key(documents, key)
                .ok_or_else(|| DomainError::NotFound(key.to_owned()))?;
            let document = &mut documents[index];
            prepend_event(document, event);
            Ok(document.clone())
        })
        .await
    }
}
