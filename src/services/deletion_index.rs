//! src/services/deletion_index.rs
//!
//! Soft-delete index: a JSON document (`logically-deleted-files.json`) kept in
//! the same bucket it describes. Objects are never removed; marking one
//! deleted only records its key here.
//!
//! Every mutation is a whole-document read-modify-write with an unconditional
//! overwrite. There is no version token, so two sessions that each load, mutate
//! and save will silently lose one of the updates (last write wins). Within a
//! session the `&mut self` receivers keep load/mutate/save from overlapping.

use crate::{
    errors::{IndexError, StoreError, StoreResult},
    models::deletion::{DELETED_FILES_INDEX, DeletionRecord, ParsedRecord},
    paths::normalize_key,
    services::store_client::ObjectStore,
};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info, warn};

const INDEX_CONTENT_TYPE: &str = "application/json";

/// Proof that the user confirmed a destructive action.
///
/// Asking is a front-end concern; holding one of these is how a caller
/// states that it asked.
#[derive(Debug, Clone, Copy)]
pub struct Confirmed(());

impl Confirmed {
    pub fn by_user() -> Self {
        Self(())
    }
}

/// Where the in-memory record came from on the last load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSource {
    /// Nothing loaded yet.
    Unloaded,
    /// Parsed from the stored document.
    Stored,
    /// The document was missing and an empty one was written.
    Created,
    /// The document was unreadable and an empty one replaced it.
    Recreated,
    /// Load failed; the empty record is in memory only and may be stale.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Marked,
    AlreadyDeleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    NotDeleted,
}

/// Session-owned soft-delete state: the record snapshot plus the
/// show-deleted view flag.
pub struct DeletionIndex {
    store: Arc<dyn ObjectStore>,
    record: DeletionRecord,
    source: RecordSource,
    show_deleted: bool,
}

impl DeletionIndex {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            record: DeletionRecord::default(),
            source: RecordSource::Unloaded,
            show_deleted: false,
        }
    }

    pub fn record(&self) -> &DeletionRecord {
        &self.record
    }

    pub fn source(&self) -> RecordSource {
        self.source
    }

    pub fn show_deleted(&self) -> bool {
        self.show_deleted
    }

    pub fn set_show_deleted(&mut self, show: bool) {
        self.show_deleted = show;
        debug!(show_deleted = show, "set deleted files visibility");
    }

    /// Flip the show-deleted flag and return the new value.
    pub fn toggle_show_deleted(&mut self) -> bool {
        self.show_deleted = !self.show_deleted;
        debug!(show_deleted = self.show_deleted, "toggled deleted files visibility");
        self.show_deleted
    }

    /// Fetch the stored document into memory.
    ///
    /// - missing: an empty record is created and persisted once;
    /// - unparseable: an empty record replaces it (the old content is lost);
    /// - any other failure: an empty record is kept in memory only.
    pub async fn load(&mut self) -> &DeletionRecord {
        let (record, source) = match self.store.get(DELETED_FILES_INDEX).await {
            Ok(body) => match DeletionRecord::parse(&body) {
                ParsedRecord::Valid(record) => (record, RecordSource::Stored),
                ParsedRecord::Malformed(reason) => {
                    warn!(%reason, "deleted files index is malformed, recreating it");
                    self.replace_with_empty(RecordSource::Recreated).await
                }
            },
            Err(StoreError::NotFound { .. }) => {
                info!("deleted files index not found, creating an empty one");
                self.replace_with_empty(RecordSource::Created).await
            }
            Err(err) => {
                warn!(error = %err, "could not load deleted files index, using an empty one");
                (DeletionRecord::default(), RecordSource::Fallback)
            }
        };

        debug!(count = record.len(), ?source, "deleted files index loaded");
        self.record = record;
        self.source = source;
        &self.record
    }

    async fn replace_with_empty(&self, source: RecordSource) -> (DeletionRecord, RecordSource) {
        let empty = DeletionRecord::default();
        match self.persist(&empty).await {
            Ok(()) => (empty, source),
            Err(err) => {
                warn!(error = %err, "could not write empty deleted files index");
                (empty, RecordSource::Fallback)
            }
        }
    }

    /// Load before mutating when nothing trustworthy is in memory yet. A
    /// fallback record is retried so a transient failure does not turn into
    /// an overwrite of the stored document with an empty one.
    async fn ensure_loaded(&mut self) {
        if matches!(self.source, RecordSource::Unloaded | RecordSource::Fallback) {
            self.load().await;
        }
    }

    async fn persist(&self, record: &DeletionRecord) -> StoreResult<()> {
        let body = record
            .to_json()
            .map_err(|err| StoreError::EncodeIndex(err.to_string()))?;
        self.store
            .put(DELETED_FILES_INDEX, Bytes::from(body), Some(INDEX_CONTENT_TYPE))
            .await
    }

    /// Overwrite the stored document with the in-memory record.
    ///
    /// No concurrency check and no retry; `false` means the write failed.
    pub async fn save(&self) -> bool {
        match self.persist(&self.record).await {
            Ok(()) => {
                debug!(count = self.record.len(), "deleted files index saved");
                true
            }
            Err(err) => {
                warn!(error = %err, "saving deleted files index failed");
                false
            }
        }
    }

    pub fn is_deleted(&self, key: &str) -> bool {
        self.record.contains(key)
    }

    fn validate_key(key: &str) -> Result<&str, IndexError> {
        let normalized = normalize_key(key);
        if normalized.is_empty() || normalized == DELETED_FILES_INDEX {
            return Err(IndexError::InvalidKey(key.to_string()));
        }
        Ok(normalized)
    }

    /// Record `key` as deleted and persist. On a failed save the key is taken
    /// back out of memory before the error is returned.
    pub async fn mark_deleted(
        &mut self,
        key: &str,
        _confirmed: Confirmed,
    ) -> Result<MarkOutcome, IndexError> {
        let key = Self::validate_key(key)?;
        self.ensure_loaded().await;

        if !self.record.insert(key) {
            info!(key, "file is already marked as deleted");
            return Ok(MarkOutcome::AlreadyDeleted);
        }

        if let Err(err) = self.persist(&self.record).await {
            self.record.remove(key);
            warn!(key, error = %err, "rolled back soft delete");
            return Err(IndexError::Save(err));
        }

        info!(key, "file marked as deleted");
        Ok(MarkOutcome::Marked)
    }

    /// Take `key` out of the record and persist. On a failed save the entry
    /// goes back to its old position.
    pub async fn restore(&mut self, key: &str) -> Result<RestoreOutcome, IndexError> {
        let key = Self::validate_key(key)?;
        self.ensure_loaded().await;

        let Some((position, removed)) = self.record.remove(key) else {
            info!(key, "file is not marked as deleted");
            return Ok(RestoreOutcome::NotDeleted);
        };

        if let Err(err) = self.persist(&self.record).await {
            self.record.reinsert(position, removed);
            warn!(key, error = %err, "rolled back restore");
            return Err(IndexError::Save(err));
        }

        info!(key, "file restored");
        Ok(RestoreOutcome::Restored)
    }
}
