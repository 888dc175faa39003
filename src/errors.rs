//! Error taxonomy shared by the store client, the deletion index, the
//! transfer orchestrator and the session.
//!
//! Configuration problems (`StoreError::NotConfigured`) are kept apart from
//! transport failures so a front end can send the user to settings instead of
//! offering a retry.

use reqwest::StatusCode;
use std::{io, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("capability URL is not configured")]
    NotConfigured,
    #[error("capability URL is invalid: {reason}")]
    InvalidUrl { reason: String },
    #[error("object `{key}` not found")]
    NotFound { key: String },
    /// `target` names the object key or operation, never the capability URL.
    #[error("object store returned HTTP {status} for {target}")]
    Status { status: StatusCode, target: String },
    #[error("request to object store failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected listing payload: {0}")]
    Decode(String),
    #[error("could not encode deleted files index: {0}")]
    EncodeIndex(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StoreError {
    /// True when the failure means "go configure the capability URL".
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::NotConfigured | Self::InvalidUrl { .. })
    }

    /// HTTP status carried by the failure, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::NotFound { .. } => Some(StatusCode::NOT_FOUND),
            Self::Status { status, .. } => Some(*status),
            Self::Transport(err) => err.status(),
            _ => None,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("`{0}` cannot be soft-deleted")]
    InvalidKey(String),
    #[error("failed to save deleted files index: {0}")]
    Save(#[source] StoreError),
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("folder name must not be empty")]
    InvalidFolderName,
    #[error("`{0}` is reserved for the deleted files index")]
    ReservedKey(String),
    #[error("could not fetch `{url}`: {reason}")]
    Fetch { url: String, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings file I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("`{url}` is not a usable capability URL: {reason}")]
    InvalidUrl { url: String, reason: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error("listing did not finish within {0:?}")]
    TimedOut(Duration),
    #[error("background task failed: {0}")]
    Task(String),
}

impl SessionError {
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Store(err) => err.is_configuration(),
            Self::Index(IndexError::Save(err)) => err.is_configuration(),
            Self::Transfer(TransferError::Store(err)) => err.is_configuration(),
            _ => false,
        }
    }
}
