//! src/services/store_client.rs
//!
//! Object store access through a single pre-authenticated capability URL.
//! The URL is the only credential: listing is `GET <url>`, object access is
//! `GET|PUT|DELETE <url>/<encoded key>`. Nothing here retries; every non-2xx
//! answer becomes a `StoreError` carrying the status.

use crate::{
    errors::{StoreError, StoreResult},
    models::object::{BucketEntry, ListPage},
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode, header};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Metadata requested with every listing so size and time are populated.
const LIST_FIELDS: &str = "name,size,timeModified";
const CONTENT_MD5: &str = "content-md5";

/// The four bucket primitives the rest of the crate is written against.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every object whose key starts with `prefix` (all objects when `None`).
    async fn list(&self, prefix: Option<&str>) -> StoreResult<Vec<BucketEntry>>;

    /// Full object body. A missing object is `StoreError::NotFound`.
    async fn get(&self, key: &str) -> StoreResult<Bytes>;

    /// Create or overwrite an object.
    async fn put(&self, key: &str, body: Bytes, content_type: Option<&str>) -> StoreResult<()>;

    /// Remove an object for good.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Direct URL of an object, suitable for a plain download.
    fn object_url(&self, key: &str) -> StoreResult<Url>;
}

/// `ObjectStore` speaking HTTP to a capability URL.
///
/// Built without a URL it still exists, but every operation short-circuits
/// with `StoreError::NotConfigured`.
#[derive(Clone, Debug)]
pub struct HttpObjectStore {
    client: Client,
    base: Option<Url>,
}

impl HttpObjectStore {
    pub fn new(capability_url: Option<&str>, request_timeout: Duration) -> StoreResult<Self> {
        let base = capability_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(parse_capability_url)
            .transpose()?;
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(transport)?;
        Ok(Self { client, base })
    }

    /// The underlying client, shared so other transfers reuse its pool and
    /// timeout.
    pub fn http_client(&self) -> Client {
        self.client.clone()
    }

    fn base(&self) -> StoreResult<&Url> {
        self.base.as_ref().ok_or(StoreError::NotConfigured)
    }

    fn list_url(&self, prefix: Option<&str>, start: Option<&str>) -> StoreResult<Url> {
        let mut url = self.base()?.clone();
        {
            let mut query = url.query_pairs_mut();
            if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
                query.append_pair("prefix", prefix);
            }
            query.append_pair("fields", LIST_FIELDS);
            if let Some(start) = start {
                query.append_pair("start", start);
            }
        }
        Ok(url)
    }
}

/// Validate a capability URL: absolute, `http` or `https`, usable as a base.
pub fn parse_capability_url(raw: &str) -> StoreResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|err| StoreError::InvalidUrl {
        reason: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(StoreError::InvalidUrl {
            reason: format!("unsupported scheme `{}`", url.scheme()),
        });
    }
    if url.cannot_be_a_base() {
        return Err(StoreError::InvalidUrl {
            reason: "URL cannot carry object paths".into(),
        });
    }
    Ok(url)
}

/// Drop the URL from reqwest errors; it embeds the capability token.
fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Transport(err.without_url())
}

fn check_status(response: Response, target: &str) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(StoreError::Status {
        status,
        target: target.to_string(),
    })
}

fn check_object_status(response: Response, key: &str) -> StoreResult<Response> {
    if response.status() == StatusCode::NOT_FOUND {
        return Err(StoreError::NotFound {
            key: key.to_string(),
        });
    }
    check_status(response, key)
}

/// Base64 MD5 digest for the `Content-MD5` request header.
fn content_md5(body: &[u8]) -> String {
    general_purpose::STANDARD.encode(md5::compute(body).0)
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    #[instrument(skip(self))]
    async fn list(&self, prefix: Option<&str>) -> StoreResult<Vec<BucketEntry>> {
        let mut entries = Vec::new();
        let mut start: Option<String> = None;
        loop {
            let url = self.list_url(prefix, start.as_deref())?;
            let response = self.client.get(url).send().await.map_err(transport)?;
            let body = check_status(response, "listing")?
                .bytes()
                .await
                .map_err(transport)?;
            let page: ListPage = serde_json::from_slice(&body)
                .map_err(|err| StoreError::Decode(err.to_string()))?;
            debug!(count = page.objects.len(), "received listing page");
            entries.extend(page.objects);

            match page.next_start_with {
                // A server repeating the same cursor would loop forever.
                Some(next) if start.as_deref() != Some(next.as_str()) => start = Some(next),
                _ => break,
            }
        }
        Ok(entries)
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        let url = self.object_url(key)?;
        let response = self.client.get(url).send().await.map_err(transport)?;
        check_object_status(response, key)?
            .bytes()
            .await
            .map_err(transport)
    }

    #[instrument(skip(self, body), fields(len = body.len()))]
    async fn put(&self, key: &str, body: Bytes, content_type: Option<&str>) -> StoreResult<()> {
        let url = self.object_url(key)?;
        let mut request = self
            .client
            .put(url)
            .header(CONTENT_MD5, content_md5(&body));
        if let Some(content_type) = content_type {
            request = request.header(header::CONTENT_TYPE, content_type);
        }
        let response = request.body(body).send().await.map_err(transport)?;
        check_status(response, key)?;
        debug!("stored object");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> StoreResult<()> {
        let url = self.object_url(key)?;
        let response = self.client.delete(url).send().await.map_err(transport)?;
        check_object_status(response, key)?;
        Ok(())
    }

    fn object_url(&self, key: &str) -> StoreResult<Url> {
        let mut url = self.base()?.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl {
                reason: "URL cannot carry object paths".into(),
            })?
            .pop_if_empty()
            .push(key);
        Ok(url)
    }
}
