//! The directory controller: current path, listings, and every operation
//! that changes the remote tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::api::ApiClient;
use crate::config::Config;
use crate::error::ClientError;
use crate::models::DirectoryEntry;
use crate::path::{normalize, IntoNavigationPath, NavigationPath};
use crate::presenter::Presenter;
use crate::state::{UploadId, UploadSource, UploadTracker};
use crate::transfer::{UploadHandle, UploadTransfer};

// what is currently on screen
#[derive(Debug, Default)]
struct DirectoryView {
    current: NavigationPath,
    entries: Vec<DirectoryEntry>,
}

/// owns the current path and keeps the displayed listing in sync with the
/// server. cheap to clone; clones share state.
#[derive(Clone)]
pub struct DirectoryController {
    api: ApiClient,
    presenter: Arc<dyn Presenter>,
    view: Arc<RwLock<DirectoryView>>,
    uploads: Arc<UploadTracker>,
    upload_grace: Duration,
    progress_interval: Duration,
    download_dir: PathBuf,
}

impl DirectoryController {
    pub fn new(config: &Config, presenter: Arc<dyn Presenter>) -> Result<Self, ClientError> {
        let api = ApiClient::new(config)?;
        Ok(Self {
            api,
            presenter,
            view: Arc::new(RwLock::new(DirectoryView {
                current: config.start_path.clone(),
                entries: Vec::new(),
            })),
            uploads: Arc::new(UploadTracker::new()),
            upload_grace: config.upload_grace,
            progress_interval: config.progress_interval,
            download_dir: config.download_dir.clone(),
        })
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn current_path(&self) -> NavigationPath {
        self.view.read().current.clone()
    }

    /// the last listing fetched successfully
    pub fn entries(&self) -> Vec<DirectoryEntry> {
        self.view.read().entries.clone()
    }

    pub fn uploads(&self) -> &UploadTracker {
        &self.uploads
    }

    // log, notify, and hand the error back to the caller
    fn report(&self, error: ClientError) -> ClientError {
        tracing::warn!("{}", error);
        self.presenter.show_error(&error.to_string());
        error
    }

    /// make `path` current and fetch its listing
    pub async fn navigate(&self, path: impl IntoNavigationPath) -> Result<(), ClientError> {
        let path = normalize(path);
        tracing::debug!("Navigating to {}", path);
        self.view.write().current = path.clone();
        self.presenter.set_location(&path);
        self.list().await.map(|_| ())
    }

    /// go to the parent directory; does nothing at the root
    pub async fn up(&self) -> Result<(), ClientError> {
        let current = self.current_path();
        if current.is_root() {
            return Ok(());
        }
        self.navigate(current.parent()).await
    }

    /// fetch the listing of the current path.
    /// on failure the previous listing stays in place.
    pub async fn list(&self) -> Result<Vec<DirectoryEntry>, ClientError> {
        let path = self.current_path();
        let entries = self.api.list(&path).await.map_err(|e| self.report(e))?;

        let mut view = self.view.write();
        if view.current != path {
            tracing::debug!("Discarding listing of {}, now at {}", path, view.current);
            return Ok(entries);
        }
        view.entries = entries.clone();
        self.presenter.render_listing(&path, &entries);
        Ok(entries)
    }

    /// re-fetch the listing; failures are already surfaced by `list`
    pub async fn refresh(&self) {
        let _ = self.list().await;
    }

    pub async fn create_folder(&self, name: &str) -> Result<(), ClientError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(self.report(ClientError::validation("Please enter a folder name")));
        }

        let current = self.current_path();
        self.api
            .mkdir(&current, name)
            .await
            .map_err(|e| self.report(e))?;
        tracing::info!("📁 Created folder {} in {}", name, current);

        self.refresh().await;
        Ok(())
    }

    pub async fn rename(
        &self,
        old: impl IntoNavigationPath,
        new: impl IntoNavigationPath,
    ) -> Result<(), ClientError> {
        let old = normalize(old);
        let new = normalize(new);
        if old.is_root() || new.is_root() {
            return Err(self.report(ClientError::validation("Please enter a new name")));
        }
        if old == new {
            return Err(self.report(ClientError::validation(
                "The new name is the same as the old one",
            )));
        }

        self.api.rename(&old, &new).await.map_err(|e| self.report(e))?;
        tracing::info!("✏️  Renamed {} -> {}", old, new);

        self.refresh().await;
        Ok(())
    }

    /// rename an entry within its own directory
    pub async fn rename_entry(
        &self,
        old: impl IntoNavigationPath,
        new_name: &str,
    ) -> Result<(), ClientError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(self.report(ClientError::validation("Please enter a new name")));
        }
        // the typed name is used as is, never decoded or split
        let old = normalize(old);
        let Some(new) = old.with_file_name(new_name) else {
            return Err(self.report(ClientError::validation(
                "Names can't contain / or \\",
            )));
        };
        self.rename(old, new).await
    }

    pub async fn delete(&self, path: impl IntoNavigationPath) -> Result<(), ClientError> {
        let path = normalize(path);
        if path.is_root() {
            return Err(self.report(ClientError::validation("Refusing to delete the root directory")));
        }

        self.api.delete(&path).await.map_err(|e| self.report(e))?;
        tracing::info!("🗑️  Deleted {}", path);

        self.refresh().await;
        Ok(())
    }

    /// save a remote file into the configured download directory
    pub async fn download(&self, path: impl IntoNavigationPath) -> Result<PathBuf, ClientError> {
        self.download_to(path, &self.download_dir).await
    }

    pub async fn download_to(
        &self,
        path: impl IntoNavigationPath,
        dest_dir: &Path,
    ) -> Result<PathBuf, ClientError> {
        let path = normalize(path);
        self.api
            .download(&path, dest_dir)
            .await
            .map_err(|e| self.report(e))
    }

    /// start one tracked upload per source into the current directory
    pub fn upload(&self, sources: Vec<UploadSource>) -> Result<Vec<UploadHandle>, ClientError> {
        if sources.is_empty() {
            return Err(self.report(ClientError::validation("Please select files to upload")));
        }

        let destination = self.current_path();
        Ok(sources
            .into_iter()
            .map(|source| self.start_upload(source, destination.clone()))
            .collect())
    }

    /// describe local files and upload them. files that can't be read are
    /// reported and skipped. when none is readable the first of those
    /// errors is returned.
    pub async fn upload_paths<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<UploadHandle>, ClientError> {
        let mut sources = Vec::with_capacity(paths.len());
        let mut first_failure = None;
        for path in paths {
            match UploadSource::from_path(path).await {
                Ok(source) => sources.push(source),
                Err(e) => {
                    let e = self.report(e);
                    first_failure.get_or_insert(e);
                }
            }
        }

        match first_failure {
            Some(e) if sources.is_empty() => Err(e),
            _ => self.upload(sources),
        }
    }

    fn start_upload(&self, source: UploadSource, destination: NavigationPath) -> UploadHandle {
        let task = self.uploads.register_task(source, destination);
        self.presenter.upload_added(&task.id, &task.source.file_name);

        let controller = self.clone();
        UploadTransfer::new(
            &task,
            self.api.clone(),
            self.uploads.clone(),
            self.presenter.clone(),
            self.progress_interval,
            self.upload_grace,
        )
        .start(move || async move { controller.refresh().await })
    }

    /// abort an upload; returns false for unknown or already finished uploads
    pub fn cancel_upload(&self, id: &UploadId) -> bool {
        if self.uploads.cancel(id) {
            self.presenter.upload_removed(id);
            true
        } else {
            false
        }
    }
}
