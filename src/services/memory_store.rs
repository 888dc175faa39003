//! In-memory `ObjectStore` for unit tests, with failure injection.

use crate::{
    errors::{StoreError, StoreResult},
    models::object::BucketEntry,
    services::store_client::ObjectStore,
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Mutex,
    time::Duration,
};
use url::Url;

#[derive(Default)]
struct Inner {
    objects: BTreeMap<String, Bytes>,
    put_counts: HashMap<String, usize>,
    failing_puts: HashSet<String>,
    failing_gets: HashMap<String, StatusCode>,
    list_delay: Option<Duration>,
    /// When set, new writes are readable but left out of listings.
    lag_listings: bool,
    unlisted: HashSet<String>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
    configured: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            configured: true,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::default()
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn insert(&self, key: &str, body: impl Into<Bytes>) {
        self.lock().objects.insert(key.to_string(), body.into());
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.lock().objects.get(key).cloned()
    }

    pub fn put_count(&self, key: &str) -> usize {
        self.lock().put_counts.get(key).copied().unwrap_or(0)
    }

    pub fn fail_puts_for(&self, key: &str) {
        self.lock().failing_puts.insert(key.to_string());
    }

    pub fn fail_gets_for(&self, key: &str, status: StatusCode) {
        self.lock().failing_gets.insert(key.to_string(), status);
    }

    pub fn clear_failures(&self) {
        let mut inner = self.lock();
        inner.failing_puts.clear();
        inner.failing_gets.clear();
    }

    pub fn delay_listing(&self, delay: Duration) {
        self.lock().list_delay = Some(delay);
    }

    /// Model an eventually consistent listing: objects written from now on
    /// can be read back but do not show up in `list`.
    pub fn lag_listings(&self) {
        self.lock().lag_listings = true;
    }

    fn ensure_configured(&self) -> StoreResult<()> {
        if self.configured {
            Ok(())
        } else {
            Err(StoreError::NotConfigured)
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, prefix: Option<&str>) -> StoreResult<Vec<BucketEntry>> {
        self.ensure_configured()?;
        let delay = self.lock().list_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let prefix = prefix.unwrap_or("");
        let inner = self.lock();
        Ok(inner
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix) && !inner.unlisted.contains(*key))
            .map(|(key, body)| BucketEntry {
                name: key.clone(),
                size: Some(body.len() as u64),
                last_modified: None,
            })
            .collect())
    }

    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        self.ensure_configured()?;
        let inner = self.lock();
        if let Some(status) = inner.failing_gets.get(key) {
            return Err(StoreError::Status {
                status: *status,
                target: key.to_string(),
            });
        }
        inner
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    async fn put(&self, key: &str, body: Bytes, _content_type: Option<&str>) -> StoreResult<()> {
        self.ensure_configured()?;
        let mut inner = self.lock();
        *inner.put_counts.entry(key.to_string()).or_default() += 1;
        if inner.failing_puts.contains(key) {
            return Err(StoreError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                target: key.to_string(),
            });
        }
        if inner.lag_listings {
            inner.unlisted.insert(key.to_string());
        }
        inner.objects.insert(key.to_string(), body);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.ensure_configured()?;
        self.lock()
            .objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    fn object_url(&self, key: &str) -> StoreResult<Url> {
        self.ensure_configured()?;
        let mut url = Url::parse("memory://bucket/o").map_err(|err| StoreError::InvalidUrl {
            reason: err.to_string(),
        })?;
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl {
                reason: "memory URL cannot carry paths".into(),
            })?
            .push(key);
        Ok(url)
    }
}
