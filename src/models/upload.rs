//! Upload batches and the per-item state machine.

use bytes::Bytes;
use serde::Serialize;

/// A local file ready to be uploaded.
#[derive(Clone, Debug)]
pub struct UploadSource {
    /// File name used as the last key segment.
    pub name: String,
    pub body: Bytes,
}

impl UploadSource {
    pub fn new(name: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }
}

/// Lifecycle of one upload item. `Succeeded` and `Failed` are final.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadState {
    Pending,
    InFlight,
    Succeeded,
    Failed(String),
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }

    fn may_become(&self, next: &UploadState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InFlight)
                | (Self::InFlight, Self::Succeeded)
                | (Self::InFlight, Self::Failed(_))
        )
    }
}

#[derive(Clone, Debug)]
pub struct UploadItem {
    pub file_name: String,
    pub destination_key: String,
    pub state: UploadState,
}

/// Final result for one file, reported in the batch summary.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub file_name: String,
    pub object_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fired after every item reaches a terminal state.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub completed: usize,
    pub total: usize,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadProgress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.completed * 100) / self.total).min(100) as u8
    }
}

/// One user-initiated upload batch. Lives until its completion callback fires.
#[derive(Clone, Debug, Default)]
pub struct UploadJob {
    items: Vec<UploadItem>,
}

impl UploadJob {
    pub fn new(items: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|(file_name, destination_key)| UploadItem {
                    file_name,
                    destination_key,
                    state: UploadState::Pending,
                })
                .collect(),
        }
    }

    pub fn items(&self) -> &[UploadItem] {
        &self.items
    }

    /// Move item `index` to `next`. Illegal transitions (including any move out
    /// of a terminal state) are refused and return `false`.
    pub fn transition(&mut self, index: usize, next: UploadState) -> bool {
        match self.items.get_mut(index) {
            Some(item) if item.state.may_become(&next) => {
                item.state = next;
                true
            }
            _ => false,
        }
    }

    pub fn completed(&self) -> usize {
        self.items.iter().filter(|i| i.state.is_terminal()).count()
    }

    pub fn is_finished(&self) -> bool {
        self.completed() == self.items.len()
    }

    /// Per-item results in input order. Only meaningful once finished.
    pub fn results(&self) -> Vec<UploadResult> {
        self.items
            .iter()
            .map(|item| UploadResult {
                file_name: item.file_name.clone(),
                object_name: item.destination_key.clone(),
                success: item.state == UploadState::Succeeded,
                error: match &item.state {
                    UploadState::Failed(reason) => Some(reason.clone()),
                    UploadState::Succeeded => None,
                    other => Some(format!("upload did not finish ({other:?})")),
                },
            })
            .collect()
    }
}
