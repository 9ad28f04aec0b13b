use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::ClientError;
use crate::models::{ProgressReport, UploadStatus};
use crate::path::NavigationPath;

/// opaque identity of one upload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadId(String);

impl UploadId {
    /// millisecond timestamp plus a random suffix, so two uploads started in
    /// the same millisecond still differ
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis();
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("upload-{}-{}", millis, &suffix[..9]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UploadId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// local file picked for upload; the task refers to it, never copies it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSource {
    pub path: PathBuf,
    pub file_name: String,
    /// `None` when the length can't be determined up front
    pub size: Option<u64>,
}

impl UploadSource {
    /// describe a local file, reading its size from the filesystem
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(ClientError::validation(format!("Not a file: {}", path.display())));
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| ClientError::validation(format!("Not a file: {}", path.display())))?;

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            size: Some(metadata.len()),
        })
    }
}

/// one upload tracked by the registry
#[derive(Debug, Clone)]
pub struct UploadTask {
    pub id: UploadId,
    pub source: UploadSource,
    pub destination: NavigationPath,
    pub status: UploadStatus,
    pub progress: Option<ProgressReport>,
    pub created_at: DateTime<Utc>,
    /// cancelling this aborts the in-flight request
    cancel: CancellationToken,
}

impl UploadTask {
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// registry of in-flight uploads, keyed by upload id
#[derive(Debug, Default)]
pub struct UploadTracker {
    uploads: DashMap<UploadId, UploadTask>,
}

impl UploadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// store a new task in `Waiting` and hand back its identity
    pub fn register(&self, source: UploadSource, destination: NavigationPath) -> UploadId {
        self.register_task(source, destination).id
    }

    /// like [`register`](Self::register) but returns a snapshot of the new task
    pub fn register_task(&self, source: UploadSource, destination: NavigationPath) -> UploadTask {
        let task = UploadTask {
            id: UploadId::generate(),
            source,
            destination,
            status: UploadStatus::Waiting,
            progress: None,
            created_at: Utc::now(),
            cancel: CancellationToken::new(),
        };
        tracing::debug!("Registered upload {} for {:?}", task.id, task.source.file_name);
        self.uploads.insert(task.id.clone(), task.clone());
        task
    }

    pub fn get(&self, id: &UploadId) -> Option<UploadTask> {
        self.uploads.get(id).map(|task| task.clone())
    }

    pub fn contains(&self, id: &UploadId) -> bool {
        self.uploads.contains_key(id)
    }

    /// abort and forget a running upload. finished or unknown uploads are left
    /// alone; returns whether anything was cancelled.
    pub fn cancel(&self, id: &UploadId) -> bool {
        let removed = self
            .uploads
            .remove_if(id, |_, task| !task.status.is_terminal());

        match removed {
            Some((_, task)) => {
                task.cancel.cancel();
                tracing::info!("🛑 Cancelled upload {} ({})", id, task.source.file_name);
                true
            }
            None => {
                tracing::trace!("Nothing to cancel for {}", id);
                false
            }
        }
    }

    pub fn remove(&self, id: &UploadId) -> Option<UploadTask> {
        self.uploads.remove(id).map(|(_, task)| task)
    }

    /// store a progress sample. the first one moves the task to `InProgress`.
    /// returns false when the task is gone or already finished.
    pub fn record_progress(&self, id: &UploadId, report: ProgressReport) -> bool {
        match self.uploads.get_mut(id) {
            Some(mut task) if !task.status.is_terminal() => {
                task.status = UploadStatus::InProgress;
                task.progress = Some(report);
                true
            }
            _ => false,
        }
    }

    /// move a task to a terminal status. only the first call for a task
    /// succeeds; later ones (or calls for removed tasks) return false.
    pub fn finish(&self, id: &UploadId, status: UploadStatus) -> bool {
        debug_assert!(status.is_terminal());
        match self.uploads.get_mut(id) {
            Some(mut task) if !task.status.is_terminal() => {
                task.status = status;
                true
            }
            _ => false,
        }
    }

    pub fn ids(&self) -> Vec<UploadId> {
        self.uploads.iter().map(|entry| entry.key().clone()).collect()
    }

    /// snapshot of every tracked task
    pub fn tasks(&self) -> Vec<UploadTask> {
        self.uploads.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.uploads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty()
    }
}
