#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::path::{Component, Path as FsPath, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use tempfile::TempDir;
use tokio::sync::Notify;

use juicebox_deck::config::Config;
use juicebox_deck::models::{
    DeleteRequest, DirectoryEntry, MkdirRequest, ProgressReport, RenameRequest, UploadStatus,
};
use juicebox_deck::path::NavigationPath;
use juicebox_deck::presenter::Presenter;
use juicebox_deck::state::UploadId;

/// knobs and counters of the fake storage api
#[derive(Default)]
pub struct MockState {
    pub root: PathBuf,
    pub list_calls: AtomicUsize,
    pub list_queries: Mutex<Vec<Option<String>>>,
    pub mutations: AtomicUsize,
    pub fail_list: AtomicBool,
    pub stall_list: AtomicBool,
    pub list_started: Notify,
    pub release_list: Notify,
    pub break_downloads: AtomicBool,
    pub fail_mutations: AtomicBool,
    pub upload_status: Mutex<Option<StatusCode>>,
    pub stall_uploads: AtomicBool,
    pub upload_started: Notify,
    pub release_uploads: Notify,
    pub uploads_received: AtomicUsize,
    pub upload_paths: Mutex<Vec<String>>,
}

// the api only ever resolves paths under its root
fn resolve(root: &FsPath, relative: &str) -> Option<PathBuf> {
    let relative = FsPath::new(relative);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(root.join(relative))
}

#[derive(Deserialize)]
struct ListQuery {
    path: Option<String>,
}

async fn list(
    State(state): State<Arc<MockState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<DirectoryEntry>>, StatusCode> {
    state.list_calls.fetch_add(1, Ordering::SeqCst);
    state.list_queries.lock().push(query.path.clone());
    let stalled = state.stall_list.load(Ordering::SeqCst);
    state.list_started.notify_one();
    if stalled {
        state.release_list.notified().await;
    }
    if state.fail_list.load(Ordering::SeqCst) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let relative = query.path.unwrap_or_default();
    let dir = resolve(&state.root, &relative).ok_or(StatusCode::BAD_REQUEST)?;
    let mut reader = tokio::fs::read_dir(&dir)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let mut entries = Vec::new();
    while let Ok(Some(entry)) = reader.next_entry().await {
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        let name = entry.file_name().to_string_lossy().to_string();
        let path = if relative.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", relative, name)
        };
        entries.push(DirectoryEntry {
            name,
            path,
            is_dir: metadata.is_dir(),
            size: metadata.len(),
            mod_time: metadata
                .modified()
                .map(Into::into)
                .unwrap_or_else(|_| chrono::Utc::now()),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(entries))
}

async fn upload(
    State(state): State<Arc<MockState>>,
    mut multipart: Multipart,
) -> StatusCode {
    state.upload_started.notify_one();
    if state.stall_uploads.load(Ordering::SeqCst) {
        state.release_uploads.notified().await;
    }

    let mut target = String::new();
    let mut files = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name() {
            Some("path") => target = field.text().await.unwrap_or_default(),
            Some("files") => {
                let name = field.file_name().unwrap_or("unnamed").to_string();
                match field.bytes().await {
                    Ok(data) => files.push((name, data)),
                    Err(_) => return StatusCode::BAD_REQUEST,
                }
            }
            _ => {}
        }
    }

    if let Some(status) = *state.upload_status.lock() {
        return status;
    }

    let Some(dir) = resolve(&state.root, &target) else {
        return StatusCode::BAD_REQUEST;
    };
    if tokio::fs::create_dir_all(&dir).await.is_err() {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    for (name, data) in files {
        if tokio::fs::write(dir.join(&name), &data).await.is_err() {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    }

    state.upload_paths.lock().push(target);
    state.uploads_received.fetch_add(1, Ordering::SeqCst);
    StatusCode::CREATED
}

async fn mkdir(State(state): State<Arc<MockState>>, Json(body): Json<MkdirRequest>) -> StatusCode {
    state.mutations.fetch_add(1, Ordering::SeqCst);
    if state.fail_mutations.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    let Some(dir) = resolve(&state.root, &format!("{}/{}", body.path, body.name).trim_start_matches('/')) else {
        return StatusCode::BAD_REQUEST;
    };
    match tokio::fs::create_dir_all(dir).await {
        Ok(()) => StatusCode::CREATED,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn rename(State(state): State<Arc<MockState>>, Json(body): Json<RenameRequest>) -> StatusCode {
    state.mutations.fetch_add(1, Ordering::SeqCst);
    if state.fail_mutations.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    let (Some(old), Some(new)) = (resolve(&state.root, &body.old), resolve(&state.root, &body.new)) else {
        return StatusCode::BAD_REQUEST;
    };
    if !old.exists() {
        return StatusCode::NOT_FOUND;
    }
    match tokio::fs::rename(old, new).await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn delete(State(state): State<Arc<MockState>>, Json(body): Json<DeleteRequest>) -> StatusCode {
    state.mutations.fetch_add(1, Ordering::SeqCst);
    if state.fail_mutations.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    let Some(target) = resolve(&state.root, &body.path) else {
        return StatusCode::BAD_REQUEST;
    };
    let result = if target.is_dir() {
        tokio::fs::remove_dir_all(&target).await
    } else if target.exists() {
        tokio::fs::remove_file(&target).await
    } else {
        return StatusCode::NOT_FOUND;
    };
    match result {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// the router decodes the path once, the handler unescapes it again
async fn download(
    State(state): State<Arc<MockState>>,
    Path(encoded): Path<String>,
) -> Result<Body, StatusCode> {
    let decoded = percent_decode_str(&encoded)
        .decode_utf8()
        .map_err(|_| StatusCode::BAD_REQUEST)?;
    let target = resolve(&state.root, &decoded).ok_or(StatusCode::BAD_REQUEST)?;
    let data = tokio::fs::read(target).await.map_err(|_| StatusCode::NOT_FOUND)?;

    if state.break_downloads.load(Ordering::SeqCst) {
        // half the file, then the connection drops
        let chunks: Vec<Result<Bytes, io::Error>> = vec![
            Ok(Bytes::copy_from_slice(&data[..data.len() / 2])),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection dropped")),
        ];
        return Ok(Body::from_stream(futures_util::stream::iter(chunks)));
    }
    Ok(Body::from(data))
}

pub struct MockServer {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    _root: TempDir,
}

impl MockServer {
    pub async fn spawn() -> Self {
        let root = tempfile::tempdir().unwrap();
        let state = Arc::new(MockState {
            root: root.path().to_path_buf(),
            ..Default::default()
        });

        let app = Router::new()
            .route("/api/list", get(list))
            .route("/api/upload", post(upload))
            .route("/api/mkdir", post(mkdir))
            .route("/api/rename", post(rename))
            .route("/api/delete", post(delete))
            .route("/api/download/*path", get(download))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            _root: root,
        }
    }

    pub fn root(&self) -> &FsPath {
        &self.state.root
    }

    pub fn config(&self) -> Config {
        Config {
            api_url: format!("http://{}", self.addr),
            upload_grace: Duration::from_millis(100),
            progress_interval: Duration::from_millis(5),
            ..Config::default()
        }
    }

    pub fn list_calls(&self) -> usize {
        self.state.list_calls.load(Ordering::SeqCst)
    }

    pub fn mutations(&self) -> usize {
        self.state.mutations.load(Ordering::SeqCst)
    }
}

/// everything the controller and transfers told the ui
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Listing(NavigationPath, Vec<String>),
    Error(String),
    Location(NavigationPath),
    Added(UploadId, String),
    Progress(UploadId, ProgressReport),
    Status(UploadId, UploadStatus),
    Removed(UploadId),
}

#[derive(Default)]
pub struct RecordingPresenter {
    events: Mutex<Vec<Event>>,
}

impl RecordingPresenter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Error(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn listings(&self) -> Vec<(NavigationPath, Vec<String>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Listing(path, names) => Some((path, names)),
                _ => None,
            })
            .collect()
    }

    pub fn statuses(&self, id: &UploadId) -> Vec<UploadStatus> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Status(upload, status) if &upload == id => Some(status),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self, id: &UploadId) -> Vec<ProgressReport> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Progress(upload, report) if &upload == id => Some(report),
                _ => None,
            })
            .collect()
    }

    pub fn was_removed(&self, id: &UploadId) -> bool {
        self.events()
            .iter()
            .any(|e| matches!(e, Event::Removed(upload) if upload == id))
    }

    fn push(&self, event: Event) {
        self.events.lock().push(event);
    }
}

impl Presenter for RecordingPresenter {
    fn render_listing(&self, path: &NavigationPath, entries: &[DirectoryEntry]) {
        let names = entries.iter().map(|e| e.name.clone()).collect();
        self.push(Event::Listing(path.clone(), names));
    }

    fn show_error(&self, message: &str) {
        self.push(Event::Error(message.to_string()));
    }

    fn set_location(&self, path: &NavigationPath) {
        self.push(Event::Location(path.clone()));
    }

    fn upload_added(&self, id: &UploadId, file_name: &str) {
        self.push(Event::Added(id.clone(), file_name.to_string()));
    }

    fn upload_progress(&self, id: &UploadId, report: &ProgressReport) {
        self.push(Event::Progress(id.clone(), report.clone()));
    }

    fn upload_status(&self, id: &UploadId, status: UploadStatus) {
        self.push(Event::Status(id.clone(), status));
    }

    fn upload_removed(&self, id: &UploadId) {
        self.push(Event::Removed(id.clone()));
    }
}

/// poll `condition` until it holds, failing the test after five seconds
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
