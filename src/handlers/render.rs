//! Pure conversion of a reconciled listing into display rows.

use crate::models::node::{Listing, VisibleNode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

pub const EMPTY_LISTING: &str = "No files or folders found";

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    Parent,
    Folder,
    File,
    Deleted,
    Empty,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RowAction {
    Open,
    Download,
    Delete,
    Restore,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RenderRow {
    pub kind: RowKind,
    pub label: String,
    /// Path to open or key to act on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub actions: Vec<RowAction>,
}

impl RenderRow {
    fn empty() -> Self {
        Self {
            kind: RowKind::Empty,
            label: EMPTY_LISTING.to_string(),
            target: None,
            detail: None,
            actions: Vec::new(),
        }
    }
}

pub fn render_listing(listing: &Listing) -> Vec<RenderRow> {
    let mut rows = Vec::with_capacity(listing.nodes.len() + 1);

    if let Some(parent) = &listing.parent_path {
        rows.push(RenderRow {
            kind: RowKind::Parent,
            label: "..".to_string(),
            target: Some(parent.clone()),
            detail: None,
            actions: vec![RowAction::Open],
        });
    }

    for node in &listing.nodes {
        rows.push(match node {
            VisibleNode::Folder { name, path } => RenderRow {
                kind: RowKind::Folder,
                label: name.clone(),
                target: Some(path.clone()),
                detail: None,
                actions: vec![RowAction::Open],
            },
            VisibleNode::File {
                full_path,
                display_name,
                is_deleted,
                size,
                last_modified,
            } => RenderRow {
                kind: if *is_deleted { RowKind::Deleted } else { RowKind::File },
                label: display_name.clone(),
                target: Some(full_path.clone()),
                detail: file_detail(*size, *last_modified),
                actions: if *is_deleted {
                    vec![RowAction::Restore]
                } else {
                    vec![RowAction::Download, RowAction::Delete]
                },
            },
        });
    }

    if rows.is_empty() {
        rows.push(RenderRow::empty());
    }
    rows
}

fn file_detail(size: Option<u64>, last_modified: Option<DateTime<Utc>>) -> Option<String> {
    match (size, last_modified) {
        (Some(size), Some(time)) => Some(format!(
            "{}, {}",
            format_size(size),
            time.format("%Y-%m-%d %H:%M")
        )),
        (Some(size), None) => Some(format_size(size)),
        (None, Some(time)) => Some(time.format("%Y-%m-%d %H:%M").to_string()),
        (None, None) => None,
    }
}

/// Human-readable byte count (`512 B`, `1.5 KB`, `2.0 MB`).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

impl fmt::Display for RenderRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.kind {
            RowKind::Parent => "^",
            RowKind::Folder => "d",
            RowKind::File => "-",
            RowKind::Deleted => "x",
            RowKind::Empty => return write!(f, "{}", self.label),
        };
        let label = if self.kind == RowKind::Folder {
            format!("{}/", self.label)
        } else {
            self.label.clone()
        };
        write!(f, "{marker} {label:<40}")?;
        if let Some(detail) = &self.detail {
            write!(f, " {detail}")?;
        }
        if self.kind == RowKind::Deleted {
            write!(f, " (deleted)")?;
        }
        Ok(())
    }
}
