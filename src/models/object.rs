//! Represents an object as reported by a bucket listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single object (blob) in the bucket, as listed through the capability URL.
///
/// Folders have no entry of their own; they are implied by shared key
/// prefixes or by a zero-byte placeholder whose key ends with `/`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BucketEntry {
    /// Full object key (e.g. `folder/sub/file.txt`).
    pub name: String,

    /// Size in bytes. Advisory only.
    #[serde(default)]
    pub size: Option<u64>,

    /// Last modification time. Advisory only.
    #[serde(default, rename = "timeModified")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl BucketEntry {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            last_modified: None,
        }
    }
}

/// One page of `GET <capability-url>` output.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    #[serde(default)]
    pub objects: Vec<BucketEntry>,

    /// Key to pass as `start` to fetch the next page, when truncated.
    #[serde(default)]
    pub next_start_with: Option<String>,
}
