//! Listing reconciliation: raw bucket listing + deletion record + view flag
//! -> the nodes shown for one directory.
//!
//! Holds no state between runs. Callers re-run it after every navigation,
//! refresh, upload, delete, restore or visibility toggle.

use crate::{
    models::{
        deletion::{DELETED_FILES_INDEX, DeletionRecord},
        node::{Listing, VisibleNode},
        object::BucketEntry,
    },
    paths::{self, ChildKind},
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

pub fn reconcile(
    entries: &[BucketEntry],
    record: &DeletionRecord,
    current_path: &str,
    show_deleted: bool,
) -> Listing {
    let deleted = record.lookup_set();
    let mut folders = BTreeSet::new();
    let mut files = BTreeMap::new();

    for entry in entries {
        let key = paths::normalize_key(&entry.name);
        if key == DELETED_FILES_INDEX {
            continue;
        }
        let Some(relative) = paths::relative_to(key, current_path) else {
            continue;
        };
        if relative.is_empty() {
            continue;
        }

        match paths::classify(relative) {
            ChildKind::Folder(name) | ChildKind::FolderMarker(name) => {
                if !name.is_empty() {
                    folders.insert(name.to_string());
                }
            }
            ChildKind::File(name) => {
                let is_deleted = deleted.contains(key);
                if is_deleted && !show_deleted {
                    trace!(key, "hiding deleted file");
                    continue;
                }
                files.insert(
                    name.to_string(),
                    VisibleNode::File {
                        full_path: key.to_string(),
                        display_name: name.to_string(),
                        is_deleted,
                        size: entry.size,
                        last_modified: entry.last_modified,
                    },
                );
            }
        }
    }

    let mut nodes: Vec<VisibleNode> = folders
        .into_iter()
        .map(|name| VisibleNode::Folder {
            path: paths::child_path(current_path, &name),
            name,
        })
        .collect();
    nodes.extend(files.into_values());

    Listing {
        current_path: current_path.to_string(),
        parent_path: (!paths::is_root(current_path)).then(|| paths::parent_of(current_path)),
        nodes,
    }
}

/// Every folder path implied by `entries`, in internal form, plus the root.
pub fn extract_folders(entries: &[BucketEntry]) -> BTreeSet<String> {
    let mut folders = BTreeSet::from([paths::ROOT.to_string()]);
    for entry in entries {
        let key = paths::normalize_key(&entry.name);
        if key.is_empty() || key == DELETED_FILES_INDEX {
            continue;
        }
        let mut prefix = String::new();
        let segments: Vec<&str> = key.split(paths::SEPARATOR).collect();
        for segment in &segments[..segments.len() - 1] {
            if segment.is_empty() {
                break;
            }
            prefix.push(paths::SEPARATOR);
            prefix.push_str(segment);
            folders.insert(prefix.clone());
        }
    }
    folders
}
