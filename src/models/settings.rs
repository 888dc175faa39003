//! Persisted user settings (the key-value configuration store's contents).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Settings as stored on disk.
///
/// Only `par_url` matters for storage operations. `current_folder` and
/// `all_folders` are conveniences and never authoritative.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Pre-authenticated request URL scoping all bucket access.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub par_url: Option<String>,

    /// Last used folder in display form (`""` for the root).
    #[serde(default)]
    pub current_folder: String,

    /// Every folder path seen so far, in internal form.
    #[serde(default = "default_folders")]
    pub all_folders: BTreeSet<String>,
}

fn default_folders() -> BTreeSet<String> {
    BTreeSet::from(["/".to_string()])
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            par_url: None,
            current_folder: String::new(),
            all_folders: default_folders(),
        }
    }
}

impl Settings {
    /// Configured capability URL, ignoring blank values.
    pub fn capability_url(&self) -> Option<&str> {
        self.par_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}
