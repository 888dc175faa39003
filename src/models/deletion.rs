//! The soft-delete record persisted as a JSON document inside the bucket.

use crate::paths::normalize_key;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Reserved storage key of the deletion index document. Never shown in listings.
pub const DELETED_FILES_INDEX: &str = "logically-deleted-files.json";

/// Ordered set of logically deleted object keys.
///
/// Keys are stored without a leading separator and never repeat.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct DeletionRecord {
    #[serde(rename = "deletedFiles")]
    deleted_files: IndexSet<String>,
}

/// Outcome of decoding a fetched index document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRecord {
    Valid(DeletionRecord),
    /// The body was readable but not `{ "deletedFiles": [string, ...] }`.
    Malformed(String),
}

#[derive(Deserialize)]
struct RecordDocument {
    #[serde(rename = "deletedFiles")]
    deleted_files: Vec<String>,
}

impl DeletionRecord {
    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut record = Self::default();
        for key in keys {
            record.insert(key.as_ref());
        }
        record
    }

    pub fn parse(bytes: &[u8]) -> ParsedRecord {
        match serde_json::from_slice::<RecordDocument>(bytes) {
            Ok(doc) => ParsedRecord::Valid(Self::from_keys(doc.deleted_files)),
            Err(err) => ParsedRecord::Malformed(err.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.deleted_files.contains(normalize_key(key))
    }

    /// Adds `key`. Returns `false` when it was already present.
    pub fn insert(&mut self, key: &str) -> bool {
        let key = normalize_key(key);
        if key.is_empty() {
            return false;
        }
        self.deleted_files.insert(key.to_string())
    }

    /// Removes `key`, returning its former position for rollback.
    pub fn remove(&mut self, key: &str) -> Option<(usize, String)> {
        self.deleted_files.shift_remove_full(normalize_key(key))
    }

    /// Put back an entry removed by [`DeletionRecord::remove`] at its old position.
    pub fn reinsert(&mut self, position: usize, key: String) {
        let position = position.min(self.deleted_files.len());
        self.deleted_files.shift_insert(position, key);
    }

    /// Membership structure built once per reconciliation.
    pub fn lookup_set(&self) -> HashSet<&str> {
        self.deleted_files.iter().map(String::as_str).collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.deleted_files.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.deleted_files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deleted_files.is_empty()
    }
}
