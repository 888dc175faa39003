//! Connectivity check for the configured bucket.
//!
//! - `settings` -> a capability URL is stored or supplied
//! - `listing`  -> the bucket answers a list request
//! - `index`    -> the deleted files index is readable (a missing one is fine)

use crate::{
    errors::StoreError,
    models::{
        deletion::{DELETED_FILES_INDEX, DeletionRecord, ParsedRecord},
        settings::Settings,
    },
    services::store_client::ObjectStore,
};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize, Debug)]
pub struct CheckReport {
    pub status: String,
    pub checks: BTreeMap<&'static str, CheckStatus>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CheckStatus {
    pub ok: bool,
    pub detail: Option<String>,
}

impl CheckStatus {
    fn pass(detail: Option<String>) -> Self {
        Self { ok: true, detail }
    }

    fn fail(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: Some(detail.into()),
        }
    }
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.checks.values().all(|check| check.ok)
    }
}

/// Run every check. Store checks are skipped (and fail) when no URL is set.
pub async fn run_checks(settings: &Settings, url_override: bool, store: &dyn ObjectStore) -> CheckReport {
    let mut checks = BTreeMap::new();

    let configured = url_override || settings.capability_url().is_some();
    checks.insert(
        "settings",
        if configured {
            CheckStatus::pass(None)
        } else {
            CheckStatus::fail("no capability URL configured")
        },
    );

    // 1) Listing
    let listing_check = match store.list(None).await {
        Ok(entries) => CheckStatus::pass(Some(format!("{} objects", entries.len()))),
        Err(err) => CheckStatus::fail(err.to_string()),
    };
    checks.insert("listing", listing_check);

    // 2) Deleted files index
    let index_check = match store.get(DELETED_FILES_INDEX).await {
        Ok(body) => match DeletionRecord::parse(&body) {
            ParsedRecord::Valid(record) => {
                CheckStatus::pass(Some(format!("{} deleted files", record.len())))
            }
            ParsedRecord::Malformed(reason) => CheckStatus::fail(format!("malformed: {reason}")),
        },
        Err(StoreError::NotFound { .. }) => {
            CheckStatus::pass(Some("not created yet".to_string()))
        }
        Err(err) => CheckStatus::fail(err.to_string()),
    };
    checks.insert("index", index_check);

    let mut report = CheckReport {
        status: String::new(),
        checks,
    };
    report.status = if report.is_ok() { "ok" } else { "error" }.to_string();
    report
}
