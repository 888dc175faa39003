//! File-backed key-value settings (capability URL, last folder, known folders).

use crate::{
    errors::SettingsError,
    models::settings::Settings,
    paths,
    services::store_client::parse_capability_url,
};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Read settings from `path`. A missing file yields defaults.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let settings = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file yet, using defaults");
                Settings::default()
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Self { path, settings })
    }

    /// Settings that live only in memory, e.g. when a URL comes from the
    /// command line.
    pub fn in_memory(path: impl Into<PathBuf>, settings: Settings) -> Self {
        Self {
            path: path.into(),
            settings,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    /// Apply `change` and write the result to disk (temp file + rename).
    pub async fn update<F>(&mut self, change: F) -> Result<(), SettingsError>
    where
        F: FnOnce(&mut Settings),
    {
        let mut next = self.settings.clone();
        change(&mut next);
        if next == self.settings {
            return Ok(());
        }
        self.write(&next).await?;
        self.settings = next;
        Ok(())
    }

    async fn write(&self, settings: &Settings) -> Result<(), SettingsError> {
        let body = serde_json::to_vec_pretty(settings)?;
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".settings-{}.tmp", Uuid::new_v4()));
        if let Err(err) = fs::write(&tmp_path, &body).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        if let Err(err) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }

    /// Validate and store a new capability URL.
    pub async fn set_par_url(&mut self, raw: &str) -> Result<(), SettingsError> {
        let url = parse_capability_url(raw).map_err(|err| SettingsError::InvalidUrl {
            url: raw.trim().to_string(),
            reason: err.to_string(),
        })?;
        if url.scheme() != "https" {
            warn!("capability URL is not https; traffic will not be encrypted");
        }
        if !url.host_str().is_some_and(|host| host.contains("objectstorage")) {
            warn!("capability URL host does not look like an object storage endpoint");
        }
        let value = url.to_string();
        self.update(|settings| settings.par_url = Some(value)).await
    }

    /// Remember the folder being viewed (stored in display form).
    pub async fn set_current_folder(&mut self, internal_path: &str) -> Result<(), SettingsError> {
        let display = paths::display_path(internal_path).to_string();
        self.update(|settings| settings.current_folder = display).await
    }

    /// Add folders to the accumulated known-folder set.
    pub async fn remember_folders<I>(&mut self, folders: I) -> Result<(), SettingsError>
    where
        I: IntoIterator<Item = String>,
    {
        self.update(|settings| settings.all_folders.extend(folders)).await
    }

    /// Last viewed folder as an internal path.
    pub fn current_folder(&self) -> String {
        paths::from_display(&self.settings.current_folder)
    }
}
