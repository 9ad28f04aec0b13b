//! Presentational surfaces the controller and transfers report into.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::models::{DirectoryEntry, ProgressReport, UploadStatus};
use crate::path::NavigationPath;
use crate::state::UploadId;
use crate::utils::{format_bytes, format_speed, format_timestamp};

/// where listings, progress and error notifications end up
pub trait Presenter: Send + Sync {
    /// replace the displayed listing
    fn render_listing(&self, path: &NavigationPath, entries: &[DirectoryEntry]);

    /// transient error notification
    fn show_error(&self, message: &str);

    /// mirror the current path somewhere bookmarkable
    fn set_location(&self, _path: &NavigationPath) {}

    fn upload_added(&self, _id: &UploadId, _file_name: &str) {}

    fn upload_progress(&self, _id: &UploadId, _report: &ProgressReport) {}

    fn upload_status(&self, _id: &UploadId, _status: UploadStatus) {}

    fn upload_removed(&self, _id: &UploadId) {}
}

/// plain stdout/stderr rendering for the terminal front end
#[derive(Default)]
pub struct TerminalPresenter {
    names: Mutex<HashMap<UploadId, String>>,
}

impl TerminalPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn name_of(&self, id: &UploadId) -> String {
        self.names
            .lock()
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }
}

/// `🏠 Home / a / b`
pub fn breadcrumb_line(path: &NavigationPath) -> String {
    let mut line = String::from("🏠 Home");
    for (segment, _) in path.breadcrumbs() {
        line.push_str(" / ");
        line.push_str(&segment);
    }
    line
}

/// one table row per entry
pub fn listing_rows(entries: &[DirectoryEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let icon = if entry.is_dir { "📁" } else { "📄" };
            let size = if entry.is_dir {
                "-".to_string()
            } else {
                format_bytes(entry.size)
            };
            format!(
                "{} {:<40} {:>12}  {}",
                icon,
                entry.name,
                size,
                format_timestamp(&entry.mod_time)
            )
        })
        .collect()
}

impl Presenter for TerminalPresenter {
    fn render_listing(&self, path: &NavigationPath, entries: &[DirectoryEntry]) {
        println!("{}", breadcrumb_line(path));
        if entries.is_empty() {
            println!("   (empty)");
        }
        for row in listing_rows(entries) {
            println!("{}", row);
        }
    }

    fn show_error(&self, message: &str) {
        eprintln!("❌ {}", message);
    }

    fn set_location(&self, path: &NavigationPath) {
        tracing::debug!("Location is now {}", path);
    }

    fn upload_added(&self, id: &UploadId, file_name: &str) {
        self.names.lock().insert(id.clone(), file_name.to_string());
        println!("📤 {} queued as {}", file_name, id);
    }

    fn upload_progress(&self, id: &UploadId, report: &ProgressReport) {
        let percent = report
            .percent
            .map(|p| format!("{:.1}%", p))
            .unwrap_or_else(|| format_bytes(report.loaded));
        println!(
            "   {} {} {}",
            self.name_of(id),
            percent,
            format_speed(report.speed)
        );
    }

    fn upload_status(&self, id: &UploadId, status: UploadStatus) {
        println!("   {} {}", self.name_of(id), status.label());
    }

    fn upload_removed(&self, id: &UploadId) {
        self.names.lock().remove(id);
    }
}
