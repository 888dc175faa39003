//! One browsing session: current folder, soft-delete state and the last raw
//! listing, with every user action sequenced through `&mut self`.
//!
//! Front ends subscribe to the returned event receiver and render whatever
//! arrives; the session never talks to a terminal or a DOM itself.

use crate::{
    errors::SessionError,
    models::{
        node::Listing,
        object::BucketEntry,
        status::StatusMessage,
        upload::{UploadProgress, UploadResult, UploadSource},
    },
    paths,
    services::{
        deletion_index::{Confirmed, DeletionIndex, MarkOutcome, RestoreOutcome},
        reconciler,
        settings_store::SettingsStore,
        store_client::ObjectStore,
        transfer_service::TransferService,
    },
};
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

pub const DEFAULT_LIST_TIMEOUT: Duration = Duration::from_secs(15);

const CONFIGURE_HINT: &str = "Please configure the PAR URL in settings";

#[derive(Debug, Clone, PartialEq)]
pub enum ManagerEvent {
    ListingReady(Listing),
    UploadProgress(UploadProgress),
    UploadBatchComplete(Vec<UploadResult>),
    DeletionStateChanged { show_deleted: bool },
    Status(StatusMessage),
}

pub struct Session {
    store: Arc<dyn ObjectStore>,
    transfers: TransferService,
    index: DeletionIndex,
    settings: SettingsStore,
    current_path: String,
    entries: Vec<BucketEntry>,
    list_timeout: Duration,
    events: UnboundedSender<ManagerEvent>,
}

fn failure_text(context: &str, err: &SessionError) -> String {
    if err.is_configuration() {
        CONFIGURE_HINT.to_string()
    } else {
        format!("{context}: {err}")
    }
}

impl Session {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        transfers: TransferService,
        settings: SettingsStore,
        list_timeout: Duration,
    ) -> (Self, UnboundedReceiver<ManagerEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let current_path = settings.current_folder();
        let session = Self {
            index: DeletionIndex::new(Arc::clone(&store)),
            store,
            transfers,
            settings,
            current_path,
            entries: Vec::new(),
            list_timeout,
            events,
        };
        (session, receiver)
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    pub fn show_deleted(&self) -> bool {
        self.index.show_deleted()
    }

    pub fn index(&self) -> &DeletionIndex {
        &self.index
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    fn emit(&self, event: ManagerEvent) {
        if self.events.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }

    fn status(&self, message: StatusMessage) {
        self.emit(ManagerEvent::Status(message));
    }

    /// Reconcile the cached listing against the in-memory record.
    pub fn listing(&self) -> Listing {
        reconciler::reconcile(
            &self.entries,
            self.index.record(),
            &self.current_path,
            self.index.show_deleted(),
        )
    }

    fn publish_listing(&self) -> Listing {
        let listing = self.listing();
        self.emit(ManagerEvent::ListingReady(listing.clone()));
        listing
    }

    /// List in a spawned task and stop waiting after `list_timeout`. The task
    /// is detached rather than cancelled when the deadline passes.
    async fn fetch_entries(&self, path: &str) -> Result<Vec<BucketEntry>, SessionError> {
        let prefix = paths::listing_prefix(path);
        let store = Arc::clone(&self.store);
        let task = tokio::spawn(async move { store.list(prefix.as_deref()).await });
        match tokio::time::timeout(self.list_timeout, task).await {
            Ok(Ok(entries)) => Ok(entries?),
            Ok(Err(join_error)) => Err(SessionError::Task(join_error.to_string())),
            Err(_) => {
                warn!(path, timeout = ?self.list_timeout, "listing timed out");
                Err(SessionError::TimedOut(self.list_timeout))
            }
        }
    }

    /// Load the index, list `path`, reconcile and publish the result.
    pub async fn navigate(&mut self, path: &str) -> Result<Listing, SessionError> {
        let path = paths::from_display(path);
        self.index.load().await;

        let entries = match self.fetch_entries(&path).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %path, error = %err, "loading files failed");
                self.status(StatusMessage::error(failure_text("Error loading files", &err)));
                return Err(err);
            }
        };

        debug!(path = %path, entries = entries.len(), "listing loaded");
        self.current_path = path;
        self.entries = entries;
        let listing = self.publish_listing();
        self.remember_location().await;
        Ok(listing)
    }

    pub async fn refresh(&mut self) -> Result<Listing, SessionError> {
        let path = self.current_path.clone();
        self.navigate(&path).await
    }

    async fn remember_location(&mut self) {
        if let Err(err) = self.settings.set_current_folder(&self.current_path).await {
            warn!(error = %err, "could not save current folder");
        }
        let folders = reconciler::extract_folders(&self.entries);
        if let Err(err) = self.settings.remember_folders(folders).await {
            warn!(error = %err, "could not save known folders");
        }
    }

    /// Every folder in the bucket merged into the remembered set.
    pub async fn known_folders(&mut self) -> Result<BTreeSet<String>, SessionError> {
        let entries = match self.fetch_entries(paths::ROOT).await {
            Ok(entries) => entries,
            Err(err) => {
                self.status(StatusMessage::error(failure_text("Error loading folders", &err)));
                return Err(err);
            }
        };
        let folders = reconciler::extract_folders(&entries);
        if let Err(err) = self.settings.remember_folders(folders.iter().cloned()).await {
            warn!(error = %err, "could not save known folders");
        }
        let mut known = self.settings.get().all_folders.clone();
        known.extend(folders);
        Ok(known)
    }

    /// Choose deleted-file visibility before the first listing. Nothing is
    /// published; the next `navigate` renders with it.
    pub fn set_show_deleted(&mut self, show: bool) {
        self.index.set_show_deleted(show);
    }

    /// Flip deleted-file visibility and re-render without relisting.
    pub fn toggle_show_deleted(&mut self) -> Listing {
        let show_deleted = self.index.toggle_show_deleted();
        self.emit(ManagerEvent::DeletionStateChanged { show_deleted });
        self.status(StatusMessage::info(if show_deleted {
            "Showing deleted files"
        } else {
            "Hiding deleted files"
        }));
        self.publish_listing()
    }

    pub async fn delete(&mut self, key: &str, confirmed: Confirmed) -> Result<MarkOutcome, SessionError> {
        let name = paths::file_name(key).to_string();
        match self.index.mark_deleted(key, confirmed).await {
            Ok(MarkOutcome::Marked) => {
                self.status(StatusMessage::success(format!("File marked as deleted: {name}")));
                self.publish_listing();
                Ok(MarkOutcome::Marked)
            }
            Ok(MarkOutcome::AlreadyDeleted) => {
                self.status(StatusMessage::info(format!("{name} is already deleted")));
                Ok(MarkOutcome::AlreadyDeleted)
            }
            Err(err) => {
                let err = SessionError::from(err);
                self.status(StatusMessage::error(failure_text("Error deleting file", &err)));
                self.publish_listing();
                Err(err)
            }
        }
    }

    pub async fn restore(&mut self, key: &str) -> Result<RestoreOutcome, SessionError> {
        let name = paths::file_name(key).to_string();
        match self.index.restore(key).await {
            Ok(RestoreOutcome::Restored) => {
                self.status(StatusMessage::success(format!("File restored: {name}")));
                self.publish_listing();
                Ok(RestoreOutcome::Restored)
            }
            Ok(RestoreOutcome::NotDeleted) => {
                self.status(StatusMessage::info(format!("{name} is not deleted")));
                Ok(RestoreOutcome::NotDeleted)
            }
            Err(err) => {
                let err = SessionError::from(err);
                self.status(StatusMessage::error(failure_text("Error restoring file", &err)));
                self.publish_listing();
                Err(err)
            }
        }
    }

    /// Upload into the current folder, then relist.
    pub async fn upload(&mut self, files: Vec<UploadSource>) -> Vec<UploadResult> {
        let progress_tx = self.events.clone();
        let complete_tx = self.events.clone();
        let results = self
            .transfers
            .upload_batch(
                files,
                &self.current_path,
                |progress| {
                    let _ = progress_tx.send(ManagerEvent::UploadProgress(progress));
                },
                |results| {
                    let _ = complete_tx.send(ManagerEvent::UploadBatchComplete(results.to_vec()));
                },
            )
            .await;

        let failed: Vec<&str> = results
            .iter()
            .filter(|result| !result.success)
            .map(|result| result.file_name.as_str())
            .collect();
        let message = if failed.is_empty() {
            StatusMessage::success(format!("Uploaded {} file(s)", results.len()))
        } else {
            StatusMessage::error(format!(
                "Uploaded {} of {} file(s); failed: {}",
                results.len() - failed.len(),
                results.len(),
                failed.join(", ")
            ))
        };
        self.status(message);

        if let Err(err) = self.refresh().await {
            debug!(error = %err, "refresh after upload failed");
        }
        results
    }

    pub async fn create_folder(&mut self, name: &str) -> Result<String, SessionError> {
        match self.transfers.create_folder(name, &self.current_path).await {
            Ok(key) => {
                self.status(StatusMessage::success(format!(
                    "Folder created: {}",
                    paths::file_name(&key)
                )));
                if let Err(err) = self.refresh().await {
                    debug!(error = %err, "refresh after folder creation failed");
                }
                Ok(key)
            }
            Err(err) => {
                let err = SessionError::from(err);
                self.status(StatusMessage::error(failure_text("Error creating folder", &err)));
                Err(err)
            }
        }
    }

    /// Fetch a remote URL and store it in the current folder.
    pub async fn import_url(&mut self, source_url: &str) -> Result<UploadResult, SessionError> {
        match self.transfers.import_from_url(source_url, &self.current_path).await {
            Ok(result) => {
                info!(key = %result.object_name, "import finished");
                self.status(StatusMessage::success(format!(
                    "Uploaded {} to {}",
                    result.file_name,
                    paths::display_path(&self.current_path)
                )));
                if let Err(err) = self.refresh().await {
                    debug!(error = %err, "refresh after import failed");
                }
                Ok(result)
            }
            Err(err) => {
                let err = SessionError::from(err);
                self.status(StatusMessage::error(failure_text("Upload failed", &err)));
                Err(err)
            }
        }
    }

    pub async fn download(&self, key: &str, dest_dir: &Path) -> Result<PathBuf, SessionError> {
        match self.transfers.download_object(key, dest_dir).await {
            Ok(path) => {
                self.status(StatusMessage::success(format!(
                    "Downloaded {}",
                    paths::file_name(key)
                )));
                Ok(path)
            }
            Err(err) => {
                let err = SessionError::from(err);
                self.status(StatusMessage::error(failure_text("Error downloading file", &err)));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::TransferError,
        models::{
            deletion::DELETED_FILES_INDEX, node::VisibleNode, settings::Settings,
            status::StatusKind,
        },
        services::{deletion_index::RecordSource, memory_store::MemoryStore},
    };
    use reqwest::Client;
    use tempfile::TempDir;

    struct Harness {
        store: Arc<MemoryStore>,
        session: Session,
        events: UnboundedReceiver<ManagerEvent>,
        _dir: TempDir,
    }

    fn harness_with(store: MemoryStore, list_timeout: Duration) -> Harness {
        let store = Arc::new(store);
        let dir = tempfile::tempdir().unwrap();
        let dyn_store = store.clone() as Arc<dyn ObjectStore>;
        let transfers = TransferService::new(Arc::clone(&dyn_store), Client::new(), 2);
        let settings = SettingsStore::in_memory(dir.path().join("settings.json"), Settings::default());
        let (session, events) = Session::new(dyn_store, transfers, settings, list_timeout);
        Harness {
            store,
            session,
            events,
            _dir: dir,
        }
    }

    fn harness() -> Harness {
        let store = MemoryStore::new();
        store.insert("a.txt", "a");
        store.insert("folder/", "");
        store.insert("folder/b.txt", "b");
        store.insert(DELETED_FILES_INDEX, r#"{"deletedFiles":["a.txt"]}"#);
        harness_with(store, DEFAULT_LIST_TIMEOUT)
    }

    fn drain(events: &mut UnboundedReceiver<ManagerEvent>) -> Vec<ManagerEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        seen
    }

    fn statuses(events: &[ManagerEvent]) -> Vec<&StatusMessage> {
        events
            .iter()
            .filter_map(|event| match event {
                ManagerEvent::Status(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn file_names(listing: &Listing) -> Vec<&str> {
        listing.files().map(VisibleNode::name).collect()
    }

    #[tokio::test]
    async fn navigate_publishes_a_reconciled_listing() {
        let mut h = harness();
        let listing = h.session.navigate("/").await.unwrap();

        assert!(file_names(&listing).is_empty());
        assert_eq!(listing.folders().count(), 1);
        let events = drain(&mut h.events);
        assert_eq!(events, vec![ManagerEvent::ListingReady(listing)]);
    }

    #[tokio::test]
    async fn navigate_remembers_the_folder() {
        let mut h = harness();
        h.session.navigate("folder/").await.unwrap();

        assert_eq!(h.session.current_path(), "/folder");
        let settings = h.session.settings().get();
        assert_eq!(settings.current_folder, "folder");
        assert!(settings.all_folders.contains("/folder"));
    }

    #[tokio::test]
    async fn toggle_reveals_deleted_files() {
        let mut h = harness();
        h.session.navigate("/").await.unwrap();
        drain(&mut h.events);

        let listing = h.session.toggle_show_deleted();
        assert!(h.session.show_deleted());
        match listing.find("a.txt") {
            Some(VisibleNode::File { is_deleted, .. }) => assert!(is_deleted),
            other => panic!("expected a deleted a.txt, got {other:?}"),
        }
        let events = drain(&mut h.events);
        assert_eq!(
            events[0],
            ManagerEvent::DeletionStateChanged { show_deleted: true }
        );
        assert!(matches!(events.last(), Some(ManagerEvent::ListingReady(_))));
    }

    #[tokio::test]
    async fn delete_hides_the_file_and_reports_success() {
        let mut h = harness();
        h.session.navigate("/folder").await.unwrap();
        drain(&mut h.events);

        let outcome = h
            .session
            .delete("folder/b.txt", Confirmed::by_user())
            .await
            .unwrap();

        assert_eq!(outcome, MarkOutcome::Marked);
        assert!(file_names(&h.session.listing()).is_empty());
        let events = drain(&mut h.events);
        assert_eq!(statuses(&events)[0].kind, StatusKind::Success);
        assert!(h.session.index().is_deleted("folder/b.txt"));
    }

    #[tokio::test]
    async fn failed_delete_keeps_the_file_visible() {
        let mut h = harness();
        h.session.navigate("/folder").await.unwrap();
        drain(&mut h.events);
        h.store.fail_puts_for(DELETED_FILES_INDEX);

        assert!(
            h.session
                .delete("folder/b.txt", Confirmed::by_user())
                .await
                .is_err()
        );

        assert_eq!(file_names(&h.session.listing()), vec!["b.txt"]);
        let events = drain(&mut h.events);
        assert_eq!(statuses(&events)[0].kind, StatusKind::Error);
    }

    #[tokio::test]
    async fn restore_brings_a_file_back() {
        let mut h = harness();
        h.session.navigate("/").await.unwrap();

        let outcome = h.session.restore("a.txt").await.unwrap();
        assert_eq!(outcome, RestoreOutcome::Restored);
        assert_eq!(file_names(&h.session.listing()), vec!["a.txt"]);

        let again = h.session.restore("a.txt").await.unwrap();
        assert_eq!(again, RestoreOutcome::NotDeleted);
    }

    #[tokio::test]
    async fn upload_reports_progress_and_relists() {
        let mut h = harness();
        h.session.navigate("/folder").await.unwrap();
        drain(&mut h.events);
        h.store.fail_puts_for("folder/bad.txt");

        let results = h
            .session
            .upload(vec![
                UploadSource::new("good.txt", "1"),
                UploadSource::new("bad.txt", "2"),
                UploadSource::new("fine.txt", "3"),
            ])
            .await;

        assert_eq!(results.iter().filter(|r| !r.success).count(), 1);
        let events = drain(&mut h.events);
        let progress = events
            .iter()
            .filter(|event| matches!(event, ManagerEvent::UploadProgress(_)))
            .count();
        let completions = events
            .iter()
            .filter(|event| matches!(event, ManagerEvent::UploadBatchComplete(_)))
            .count();
        assert_eq!(progress, 3);
        assert_eq!(completions, 1);
        assert_eq!(statuses(&events)[0].kind, StatusKind::Error);
        assert_eq!(
            file_names(&h.session.listing()),
            vec!["b.txt", "fine.txt", "good.txt"]
        );
    }

    #[tokio::test]
    async fn create_folder_lands_in_the_current_folder() {
        let mut h = harness();
        h.session.navigate("/folder").await.unwrap();

        let key = h.session.create_folder("nested").await.unwrap();
        assert_eq!(key, "folder/nested/");
        assert!(h.session.listing().find("nested").is_some());
    }

    #[tokio::test]
    async fn preset_visibility_applies_to_the_first_listing() {
        let mut h = harness();
        h.session.set_show_deleted(true);
        assert!(drain(&mut h.events).is_empty());

        let listing = h.session.navigate("/").await.unwrap();

        assert_eq!(file_names(&listing), vec!["a.txt"]);
        let events = drain(&mut h.events);
        assert_eq!(events, vec![ManagerEvent::ListingReady(listing)]);
    }

    #[tokio::test]
    async fn upload_of_the_index_name_at_the_root_is_refused() {
        let mut h = harness();
        h.session.navigate("/").await.unwrap();

        let results = h
            .session
            .upload(vec![
                UploadSource::new(DELETED_FILES_INDEX, "user notes"),
                UploadSource::new("c.txt", "c"),
            ])
            .await;

        assert!(!results[0].success);
        assert!(results[1].success);
        assert!(h.session.index().is_deleted("a.txt"));
        assert_eq!(
            h.session.index().source(),
            RecordSource::Stored
        );
        assert_eq!(file_names(&h.session.listing()), vec!["c.txt"]);
    }

    #[tokio::test]
    async fn mkdir_of_the_index_name_at_the_root_is_refused() {
        let mut h = harness();
        h.session.navigate("/").await.unwrap();
        drain(&mut h.events);

        let err = h.session.create_folder(DELETED_FILES_INDEX).await.unwrap_err();

        assert!(matches!(
            err,
            SessionError::Transfer(TransferError::ReservedKey(_))
        ));
        let events = drain(&mut h.events);
        assert_eq!(statuses(&events)[0].kind, StatusKind::Error);
    }

    #[tokio::test]
    async fn upload_succeeds_before_the_listing_catches_up() {
        let mut h = harness();
        h.session.navigate("/folder").await.unwrap();
        h.store.lag_listings();

        let results = h
            .session
            .upload(vec![UploadSource::new("late.txt", "l")])
            .await;

        assert!(results[0].success);
        assert!(h.store.object("folder/late.txt").is_some());
        assert_eq!(file_names(&h.session.listing()), vec!["b.txt"]);
        let events = drain(&mut h.events);
        assert!(statuses(&events).iter().all(|m| m.kind != StatusKind::Error));
    }

    #[tokio::test]
    async fn create_folder_succeeds_before_the_listing_catches_up() {
        let mut h = harness();
        h.session.navigate("/").await.unwrap();
        h.store.lag_listings();

        let key = h.session.create_folder("fresh").await.unwrap();

        assert_eq!(key, "fresh/");
        assert!(h.session.listing().find("fresh").is_none());
        assert_eq!(h.session.listing().folders().count(), 1);
    }

    #[tokio::test]
    async fn known_folders_cover_the_whole_bucket() {
        let mut h = harness();
        h.store.insert("deep/er/x.txt", "x");

        let folders = h.session.known_folders().await.unwrap();

        let expected: Vec<&str> = vec!["/", "/deep", "/deep/er", "/folder"];
        assert_eq!(folders.iter().map(String::as_str).collect::<Vec<_>>(), expected);
        assert!(h.session.settings().get().all_folders.contains("/deep/er"));
    }

    #[tokio::test]
    async fn slow_listing_times_out_without_changing_location() {
        let store = MemoryStore::new();
        store.insert("a.txt", "a");
        store.delay_listing(Duration::from_millis(500));
        let mut h = harness_with(store, Duration::from_millis(20));

        let err = h.session.navigate("/elsewhere").await.unwrap_err();

        assert!(matches!(err, SessionError::TimedOut(_)));
        assert_eq!(h.session.current_path(), "/");
        let events = drain(&mut h.events);
        assert_eq!(statuses(&events)[0].kind, StatusKind::Error);
    }

    #[tokio::test]
    async fn unconfigured_store_asks_for_configuration() {
        let mut h = harness_with(MemoryStore::unconfigured(), DEFAULT_LIST_TIMEOUT);

        let err = h.session.navigate("/").await.unwrap_err();

        assert!(err.is_configuration());
        let events = drain(&mut h.events);
        assert_eq!(statuses(&events)[0].text, CONFIGURE_HINT);
    }
}
