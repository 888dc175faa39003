//! src/services/transfer_service.rs
//!
//! Upload/download orchestration on top of an `ObjectStore`.
//!
//! Batch uploads use a bounded-concurrency policy: at most `max_in_flight`
//! PUTs run at once (1 means strictly sequential). One failing file never
//! aborts the batch, and there is no automatic retry.
//!
//! None of the write paths may target the deleted files index key.

use crate::{
    errors::{StoreError, TransferError},
    models::{
        deletion::DELETED_FILES_INDEX,
        upload::{UploadJob, UploadProgress, UploadResult, UploadSource, UploadState},
    },
    paths,
    services::store_client::ObjectStore,
};
use bytes::Bytes;
use chrono::Utc;
use futures::{StreamExt, stream};
use reqwest::{Client, header};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 4;
const FOLDER_MARKER_CONTENT_TYPE: &str = "text/plain";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Clone)]
pub struct TransferService {
    store: Arc<dyn ObjectStore>,
    http: Client,
    max_in_flight: usize,
}

/// Refuse a destination that would overwrite the deleted files index.
fn writable_key(key: String) -> Result<String, TransferError> {
    if paths::normalize_key(&key) == DELETED_FILES_INDEX {
        return Err(TransferError::ReservedKey(key));
    }
    Ok(key)
}

fn with_job<R>(job: &Mutex<UploadJob>, f: impl FnOnce(&mut UploadJob) -> R) -> R {
    let mut guard = job.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}

impl TransferService {
    pub fn new(store: Arc<dyn ObjectStore>, http: Client, max_in_flight: usize) -> Self {
        Self {
            store,
            http,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Upload `files` into `destination_folder`.
    ///
    /// `on_progress` fires once per file as it reaches a terminal state, in
    /// completion order. `on_complete` fires exactly once with every result,
    /// in input order, and the same list is returned.
    pub async fn upload_batch<P, C>(
        &self,
        files: Vec<UploadSource>,
        destination_folder: &str,
        mut on_progress: P,
        on_complete: C,
    ) -> Vec<UploadResult>
    where
        P: FnMut(UploadProgress),
        C: FnOnce(&[UploadResult]),
    {
        let job = Mutex::new(UploadJob::new(files.iter().map(|file| {
            (
                file.name.clone(),
                paths::join_key(destination_folder, &file.name),
            )
        })));
        let total = files.len();
        info!(total, folder = destination_folder, "starting upload batch");

        let store = &self.store;
        let job_ref = &job;
        let mut completions = stream::iter(files.into_iter().enumerate())
            .map(|(index, file)| {
                let key = with_job(job_ref, |job| {
                    job.transition(index, UploadState::InFlight);
                    job.items()[index].destination_key.clone()
                });
                async move {
                    let result = match writable_key(key) {
                        Ok(key) => {
                            debug!(key = %key, "uploading file");
                            store
                                .put(&key, file.body, guess_content_type(&file.name))
                                .await
                                .map_err(TransferError::from)
                        }
                        Err(err) => Err(err),
                    };
                    (index, file.name, result)
                }
            })
            .buffer_unordered(self.max_in_flight);

        let mut completed = 0;
        while let Some((index, file_name, result)) = completions.next().await {
            completed += 1;
            let error = match result {
                Ok(()) => {
                    with_job(job_ref, |job| job.transition(index, UploadState::Succeeded));
                    None
                }
                Err(err) => {
                    warn!(file = %file_name, error = %err, "upload failed");
                    let reason = err.to_string();
                    with_job(job_ref, |job| {
                        job.transition(index, UploadState::Failed(reason.clone()))
                    });
                    Some(reason)
                }
            };
            on_progress(UploadProgress {
                completed,
                total,
                file_name,
                error,
            });
        }
        drop(completions);

        let results = job.into_inner().unwrap_or_else(PoisonError::into_inner).results();
        let succeeded = results.iter().filter(|r| r.success).count();
        info!(succeeded, total, "upload batch finished");
        on_complete(&results);
        results
    }

    /// Resolve the object's URL, fetch it, and save it as
    /// `dest_dir/<file name>`. Returns the written path.
    pub async fn download_object(&self, key: &str, dest_dir: &Path) -> Result<PathBuf, TransferError> {
        let url = self.store.object_url(key)?;
        let file_name = paths::file_name(key);
        if file_name.is_empty() {
            return Err(TransferError::Store(StoreError::NotFound {
                key: key.to_string(),
            }));
        }

        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| StoreError::Transport(err.without_url()))?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound {
                key: key.to_string(),
            }
            .into());
        }
        if !status.is_success() {
            return Err(StoreError::Status {
                status,
                target: key.to_string(),
            }
            .into());
        }

        fs::create_dir_all(dest_dir).await?;
        let final_path = dest_dir.join(file_name);
        let tmp_path = dest_dir.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = fs::File::create(&tmp_path).await?;

        loop {
            let chunk = match response.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StoreError::Transport(err.without_url()).into());
                }
            };
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err.into());
            }
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        if let Err(err) = fs::rename(&tmp_path, &final_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }

        info!(key, path = %final_path.display(), "downloaded object");
        Ok(final_path)
    }

    /// Write a zero-byte `<parent>/<name>/` placeholder so the folder shows up
    /// in listings. Returns the placeholder key.
    pub async fn create_folder(&self, name: &str, parent_path: &str) -> Result<String, TransferError> {
        let name = name.trim().trim_matches(paths::SEPARATOR);
        if name.is_empty() {
            return Err(TransferError::InvalidFolderName);
        }
        let folder_key = writable_key(paths::join_key(parent_path, name))?;
        let key = format!("{folder_key}{}", paths::SEPARATOR);
        self.store
            .put(&key, Bytes::new(), Some(FOLDER_MARKER_CONTENT_TYPE))
            .await?;
        info!(key = %key, "folder created");
        Ok(key)
    }

    /// Fetch `source_url` and upload its body into `folder`.
    pub async fn import_from_url(&self, source_url: &str, folder: &str) -> Result<UploadResult, TransferError> {
        let fetch_error = |reason: String| TransferError::Fetch {
            url: source_url.to_string(),
            reason,
        };
        let url = Url::parse(source_url).map_err(|err| fetch_error(err.to_string()))?;
        let file_name = filename_from_url(&url);
        let key = writable_key(paths::join_key(folder, &file_name))?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| fetch_error(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {status}")));
        }
        let served_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|err| fetch_error(err.to_string()))?;

        let content_type = guess_content_type(&file_name)
            .map(str::to_string)
            .or(served_type)
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());
        self.store.put(&key, body, Some(&content_type)).await?;
        info!(key = %key, "imported remote file");

        Ok(UploadResult {
            file_name,
            object_name: key,
            success: true,
            error: None,
        })
    }
}

/// Last path segment of `url`, or a timestamped name when there is none.
pub fn filename_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("file-{}", Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ")))
}

/// Content type implied by a file extension, if it is a familiar one.
pub fn guess_content_type(file_name: &str) -> Option<&'static str> {
    let (_, extension) = file_name.rsplit_once('.')?;
    let content_type = match extension.to_ascii_lowercase().as_str() {
        "pdf" => "application/pdf",
        "json" => "application/json",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "xml" => "application/xml",
        "zip" => "application/zip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "csv" => "text/csv",
        _ => return None,
    };
    Some(content_type)
}
