use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// one row of a directory listing, as sent by the storage api
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    // meaningless for directories
    pub size: u64,
    pub mod_time: DateTime<Utc>,
}

// request body for the mkdir endpoint
#[derive(Serialize, Deserialize, Debug)]
pub struct MkdirRequest {
    pub name: String,
    pub path: String,
}

// request body for the rename endpoint
#[derive(Serialize, Deserialize, Debug)]
pub struct RenameRequest {
    pub old: String,
    pub new: String,
}

// request body for the delete endpoint
#[derive(Serialize, Deserialize, Debug)]
pub struct DeleteRequest {
    pub path: String,
}

/// lifecycle of a single upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Waiting,
    InProgress,
    Completed,
    Error,
    Cancelled,
}

impl UploadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Waiting => "Waiting...",
            Self::InProgress => "Uploading",
            Self::Completed => "Completed",
            Self::Error => "Error",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// normalized progress of one upload
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub loaded: u64,
    /// `None` when the transport can't compute a length
    pub total: Option<u64>,
    /// only present when `total` is known
    pub percent: Option<f64>,
    /// bytes per second over the last sample
    pub speed: f64,
}

/// how an upload ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Completed,
    Failed(String),
    Cancelled,
}
