//! Derived view nodes produced by the listing reconciler.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One immediate child of the directory being viewed.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum VisibleNode {
    Folder {
        name: String,
        /// Internal path to navigate to (`/folder/sub`).
        path: String,
    },
    #[serde(rename_all = "camelCase")]
    File {
        /// Full storage key.
        full_path: String,
        display_name: String,
        /// Set so a front end can offer "restore" instead of "delete".
        is_deleted: bool,
        size: Option<u64>,
        last_modified: Option<DateTime<Utc>>,
    },
}

impl VisibleNode {
    pub fn name(&self) -> &str {
        match self {
            Self::Folder { name, .. } => name,
            Self::File { display_name, .. } => display_name,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder { .. })
    }
}

/// Result of reconciling one directory.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub current_path: String,
    /// `None` at the root, where there is no "up" entry.
    pub parent_path: Option<String>,
    /// Folders first (lexicographic), then files (by display name).
    pub nodes: Vec<VisibleNode>,
}

impl Listing {
    pub fn folders(&self) -> impl Iterator<Item = &VisibleNode> {
        self.nodes.iter().filter(|node| node.is_folder())
    }

    pub fn files(&self) -> impl Iterator<Item = &VisibleNode> {
        self.nodes.iter().filter(|node| !node.is_folder())
    }

    pub fn find(&self, name: &str) -> Option<&VisibleNode> {
        self.nodes.iter().find(|node| node.name() == name)
    }
}
