//! Driving a single upload from start to its one terminal state.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use reqwest::multipart::Part;
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::api::ApiClient;
use crate::error::ClientError;
use crate::models::{ProgressReport, UploadOutcome, UploadStatus};
use crate::path::NavigationPath;
use crate::presenter::Presenter;
use crate::state::{UploadId, UploadSource, UploadTask, UploadTracker};

/// turns cumulative byte counts into progress reports with a speed estimate
#[derive(Debug, Clone)]
pub struct SpeedMeter {
    last_loaded: u64,
    last_time: Instant,
    speed: f64,
}

impl SpeedMeter {
    pub fn new(started: Instant) -> Self {
        Self {
            last_loaded: 0,
            last_time: started,
            speed: 0.0,
        }
    }

    /// speed is the byte delta over the time delta since the previous sample.
    /// a sample with no measurable time delta keeps the previous speed and
    /// leaves the baseline alone.
    pub fn sample(&mut self, loaded: u64, total: Option<u64>, now: Instant) -> ProgressReport {
        let elapsed = now.saturating_duration_since(self.last_time).as_secs_f64();
        if elapsed > 0.0 {
            let delta = loaded.saturating_sub(self.last_loaded);
            self.speed = delta as f64 / elapsed;
            self.last_loaded = loaded;
            self.last_time = now;
        }

        let percent = total
            .filter(|total| *total > 0)
            .map(|total| loaded as f64 / total as f64 * 100.0);

        ProgressReport {
            loaded,
            total,
            percent,
            speed: self.speed,
        }
    }
}

/// byte stream wrapper that reports how much has been handed to the transport
///
/// a notification (the cumulative byte count) goes out for the first chunk,
/// then at most once per `interval`, and once more at end of stream.
pub struct ProgressStream<S> {
    inner: S,
    loaded: u64,
    interval: Duration,
    last_emit: Option<Instant>,
    finished: bool,
    tx: mpsc::UnboundedSender<u64>,
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, tx: mpsc::UnboundedSender<u64>, interval: Duration) -> Self {
        Self {
            inner,
            loaded: 0,
            interval,
            last_emit: None,
            finished: false,
            tx,
        }
    }

    fn emit(&mut self) {
        self.last_emit = Some(Instant::now());
        // receiver is gone once the transfer reached a terminal state
        let _ = self.tx.send(self.loaded);
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.loaded += chunk.len() as u64;
                let due = this
                    .last_emit
                    .map_or(true, |last| last.elapsed() >= this.interval);
                if due {
                    this.emit();
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(None) => {
                if !this.finished {
                    this.finished = true;
                    this.emit();
                }
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

/// a spawned upload; await [`UploadHandle::outcome`] for its terminal result
#[derive(Debug)]
pub struct UploadHandle {
    pub id: UploadId,
    join: JoinHandle<UploadOutcome>,
}

impl UploadHandle {
    pub async fn outcome(self) -> UploadOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => UploadOutcome::Failed(format!("Upload task aborted: {}", e)),
        }
    }
}

/// one file's trip to the upload endpoint
pub struct UploadTransfer {
    id: UploadId,
    source: UploadSource,
    destination: NavigationPath,
    cancel: CancellationToken,
    api: ApiClient,
    tracker: Arc<UploadTracker>,
    presenter: Arc<dyn Presenter>,
    progress_interval: Duration,
    grace: Duration,
}

impl UploadTransfer {
    pub fn new(
        task: &UploadTask,
        api: ApiClient,
        tracker: Arc<UploadTracker>,
        presenter: Arc<dyn Presenter>,
        progress_interval: Duration,
        grace: Duration,
    ) -> Self {
        Self {
            id: task.id.clone(),
            source: task.source.clone(),
            destination: task.destination.clone(),
            cancel: task.cancellation(),
            api,
            tracker,
            presenter,
            progress_interval,
            grace,
        }
    }

    /// spawn the transfer. `on_completed` runs once, after a 201, before the
    /// grace period starts.
    pub fn start<F, Fut>(self, on_completed: F) -> UploadHandle
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.id.clone();
        let join = tokio::spawn(self.run(on_completed));
        UploadHandle { id, join }
    }

    async fn run<F, Fut>(self, on_completed: F) -> UploadOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        tracing::debug!(
            "Starting upload {} ({}) to {}",
            self.id,
            self.source.file_name,
            self.destination
        );

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let mut meter = SpeedMeter::new(Instant::now());
        let mut announced = false;

        let result = {
            let send = self.send(progress_tx);
            tokio::pin!(send);

            loop {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        // the tracker already dropped the task; dropping `send` aborts the request
                        tracing::debug!("Upload {} aborted", self.id);
                        return UploadOutcome::Cancelled;
                    }
                    result = &mut send => break result,
                    Some(loaded) = progress_rx.recv() => {
                        let report = meter.sample(loaded, self.source.size, Instant::now());
                        if self.tracker.record_progress(&self.id, report.clone()) {
                            if !announced {
                                announced = true;
                                self.presenter.upload_status(&self.id, UploadStatus::InProgress);
                            }
                            self.presenter.upload_progress(&self.id, &report);
                        }
                    }
                }
            }
        };

        match result {
            Ok(status) if status == StatusCode::CREATED => self.complete(meter, on_completed).await,
            Ok(status) => {
                let reason = status.canonical_reason().unwrap_or("Upload failed");
                self.fail(format!("{} ({})", reason, status.as_u16()))
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    async fn send(&self, progress: mpsc::UnboundedSender<u64>) -> Result<StatusCode, ClientError> {
        let file = tokio::fs::File::open(&self.source.path).await?;
        let stream = ProgressStream::new(ReaderStream::new(file), progress, self.progress_interval);
        let body = reqwest::Body::wrap_stream(stream);

        let part = match self.source.size {
            Some(len) => Part::stream_with_length(body, len),
            None => Part::stream(body),
        };
        let mime = mime_guess::from_path(&self.source.path).first_or_octet_stream();
        let part = part
            .file_name(self.source.file_name.clone())
            .mime_str(mime.essence_str())?;

        self.api.upload(part, &self.destination).await
    }

    async fn complete<F, Fut>(self, mut meter: SpeedMeter, on_completed: F) -> UploadOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        if !self.tracker.finish(&self.id, UploadStatus::Completed) {
            // cancelled while the response was on its way
            return UploadOutcome::Cancelled;
        }

        tracing::info!(
            "✅ Uploaded {} to {}",
            self.source.file_name,
            self.destination
        );
        if let Some(size) = self.source.size {
            let report = meter.sample(size, Some(size), Instant::now());
            self.presenter.upload_progress(&self.id, &report);
        }
        self.presenter.upload_status(&self.id, UploadStatus::Completed);

        on_completed().await;

        tokio::time::sleep(self.grace).await;
        self.tracker.remove(&self.id);
        self.presenter.upload_removed(&self.id);
        UploadOutcome::Completed
    }

    fn fail(self, message: String) -> UploadOutcome {
        if !self.tracker.finish(&self.id, UploadStatus::Error) {
            return UploadOutcome::Cancelled;
        }

        tracing::warn!("❌ Upload of {} failed: {}", self.source.file_name, message);
        self.presenter.upload_status(&self.id, UploadStatus::Error);
        self.presenter.show_error(&message);
        self.tracker.remove(&self.id);
        self.presenter.upload_removed(&self.id);
        UploadOutcome::Failed(message)
    }
}
