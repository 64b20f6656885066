//! The controller: drives [`WorkflowState`] from user actions and from the
//! completions of the tasks it spawns.
//!
//! ## Execution model
//!
//! The controller is a single owner. User actions (`select_tool`,
//! `select_files`, `submit`, `reset`) are `&mut self` methods that apply a
//! transition immediately and spawn whatever asynchronous work it implies.
//! Each spawned task reports back through one unbounded channel with a
//! [`Completion`] tagged by the [`Generation`] or [`AttemptId`] it was issued
//! under. Completions are applied only by [`Controller::step`],
//! [`Controller::settle`] or [`Controller::drain`], on the caller's task, so
//! the state is never mutated concurrently and stale completions are simply
//! dropped by the state machine.
//!
//! ```text
//!  user action ──▶ Controller ──spawn──▶ upload / preview / process / ticker
//!                      ▲                              │
//!                      └──────── Completion (tagged) ─┘
//! ```

use crate::backend::{Backend, HttpBackend};
use crate::config::ClientConfig;
use crate::error::{PreviewError, ValidationError, WorkflowError};
use crate::intake::{FileHandle, FileSet, Generation};
use crate::pipeline::process::ProcessingResult;
use crate::pipeline::render::{PageRasterizer, PdfiumRasterizer};
use crate::preview::{render_preview, PreviewEvent, PreviewOptions};
use crate::progress::{spawn_ticker, Notice, NoopObserver, ProgressEstimate, SharedObserver};
use crate::tool::{OptionsForm, Tool};
use crate::workflow::{AttemptId, Phase, WorkflowState};
use bytes::Bytes;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A tagged report from a spawned task.
#[derive(Debug)]
enum Completion {
    Upload {
        generation: Generation,
        result: Result<String, WorkflowError>,
    },
    Preview {
        generation: Generation,
        event: PreviewEvent,
    },
    PreviewDone {
        generation: Generation,
        error: Option<PreviewError>,
    },
    Processed {
        attempt: AttemptId,
        result: Result<ProcessingResult, WorkflowError>,
    },
    Tick {
        attempt: AttemptId,
        value: f64,
    },
}

/// Workflow controller.
///
/// All methods that spawn work must be called from within a tokio runtime.
pub struct Controller {
    state: WorkflowState,
    config: ClientConfig,
    backend: Arc<dyn Backend>,
    rasterizer: Arc<dyn PageRasterizer>,
    observer: SharedObserver,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    ticker: Option<(CancellationToken, JoinHandle<()>)>,
    preview_task: Option<CancellationToken>,
}

impl Controller {
    /// A controller talking HTTP to `config.base_url` and previewing with pdfium.
    pub fn new(config: ClientConfig) -> Result<Self, WorkflowError> {
        let backend = HttpBackend::new(config.clone())?;
        Ok(Self::with_parts(
            config,
            Arc::new(backend),
            Arc::new(PdfiumRasterizer::new()),
        ))
    }

    /// A controller over explicit backend and rasterizer implementations.
    pub fn with_parts(
        config: ClientConfig,
        backend: Arc<dyn Backend>,
        rasterizer: Arc<dyn PageRasterizer>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state: WorkflowState::new(),
            config,
            backend,
            rasterizer,
            observer: Arc::new(NoopObserver),
            tx,
            rx,
            ticker: None,
            preview_task: None,
        }
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ── User actions ─────────────────────────────────────────────────────

    /// Make `id` the active tool. Unknown ids are ignored.
    pub fn select_tool(&mut self, id: &str) -> Option<Tool> {
        let tool = self.state.select_tool(id)?;
        self.observer.on_tool_selected(tool, tool.spec());
        Some(tool)
    }

    /// Replace the file set, then start its preview and upload.
    ///
    /// Returns the new generation, or `None` for an empty selection (which
    /// changes nothing). Any in-flight upload, preview or processing attempt
    /// for the previous selection is superseded.
    pub fn select_files(&mut self, files: Vec<FileHandle>) -> Option<Generation> {
        let before = self.state.phase();
        let set = self.state.select_files(files)?;

        self.stop_ticker();
        self.stop_preview();
        self.observer.on_files_selected(&set);
        self.emit_phase(before);

        match set.first_previewable() {
            Some(doc) if self.config.preview_max_pages > 0 => {
                self.spawn_preview(set.generation(), doc.content.clone());
            }
            Some(_) => {
                self.state.preview_finished(set.generation(), None);
            }
            None => {}
        }
        self.spawn_upload(&set);
        Some(set.generation())
    }

    /// Run the submission gate and, if it passes, send the processing request.
    ///
    /// Validation failures are reported as an error notice and returned; the
    /// workflow is left as it was and nothing reaches the network.
    pub fn submit(&mut self, form: &OptionsForm) -> Result<AttemptId, ValidationError> {
        let before = self.state.phase();
        let (attempt, request) = match self.state.begin_submit(form) {
            Ok(v) => v,
            Err(e) => {
                warn!("Submission rejected: {}", e);
                self.observer.on_notice(&Notice::error(e.to_string()));
                return Err(e);
            }
        };
        self.emit_phase(before);
        self.observer.on_progress(self.state.progress());

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.process(&request).await;
            let _ = tx.send(Completion::Processed { attempt, result });
        });

        if self.state.dispatch(attempt).is_applied() {
            self.emit_phase(Phase::Submitting);
            self.start_ticker(attempt);
        }
        Ok(attempt)
    }

    /// Start a new document. Returns `false` if there was nothing to reset.
    pub fn reset(&mut self) -> bool {
        let before = self.state.phase();
        self.stop_ticker();
        self.stop_preview();
        let changed = self.state.reset();
        if changed {
            self.emit_phase(before);
        }
        changed
    }

    /// Fetch the produced artifact and write it to `path`.
    ///
    /// The body is written to a sibling `.part` file and renamed into place,
    /// so `path` never holds a partial download. Returns the bytes written.
    pub async fn download_to(&self, path: impl AsRef<Path>) -> Result<u64, WorkflowError> {
        let location = self
            .state
            .download_location()
            .ok_or(WorkflowError::NothingToDownload)?;
        let bytes = self.backend.download(location).await?;
        let path = path.as_ref();

        let write_err = |source: std::io::Error| WorkflowError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".part");
        let tmp_path = PathBuf::from(tmp_name);

        tokio::fs::write(&tmp_path, &bytes).await.map_err(write_err)?;
        tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

        info!("Saved {} bytes to {}", bytes.len(), path.display());
        Ok(bytes.len() as u64)
    }

    // ── Completions ──────────────────────────────────────────────────────

    /// Wait for and apply the next completion.
    ///
    /// Returns `false` without waiting when no upload, processing call or
    /// preview is outstanding.
    pub async fn step(&mut self) -> bool {
        if !self.state.has_outstanding_work() {
            return false;
        }
        match self.rx.recv().await {
            Some(completion) => {
                self.apply(completion);
                true
            }
            None => false,
        }
    }

    /// Apply completions until no work is outstanding.
    pub async fn settle(&mut self) {
        while self.step().await {}
    }

    /// Apply every completion already queued, without waiting. Returns how
    /// many were taken off the queue (stale ones included).
    pub fn drain(&mut self) -> usize {
        let mut n = 0;
        while let Ok(completion) = self.rx.try_recv() {
            self.apply(completion);
            n += 1;
        }
        n
    }

    fn apply(&mut self, completion: Completion) {
        let before = self.state.phase();
        match completion {
            Completion::Upload { generation, result } => {
                let notice = match &result {
                    Ok(_) => Notice::success("Files uploaded successfully"),
                    Err(WorkflowError::Backend { message, .. }) => {
                        Notice::error(format!("File upload failed: {message}"))
                    }
                    Err(e) => Notice::error(format!("Error uploading files: {e}")),
                };
                if self.state.upload_resolved(generation, result).is_applied() {
                    self.observer.on_notice(&notice);
                }
            }

            Completion::Preview { generation, event } => {
                let remaining = match event {
                    PreviewEvent::Remaining(n) => Some(n),
                    _ => None,
                };
                let placed = self.state.preview_event(generation, event);
                if let Some(thumb) = placed
                    .and_then(|page| self.state.preview().slots.get(page - 1))
                    .and_then(Option::as_ref)
                {
                    self.observer.on_preview_page(thumb);
                }
                if let Some(n) = remaining {
                    if generation == self.state.generation() && self.state.preview_pending() {
                        self.observer.on_preview_overflow(n);
                    }
                }
            }

            Completion::PreviewDone { generation, error } => {
                if let Some(ref e) = error {
                    debug!("Preview for {} unavailable: {}", generation, e);
                }
                if self.state.preview_finished(generation, error).is_applied() {
                    self.preview_task = None;
                }
            }

            Completion::Processed { attempt, result } => {
                let notice = match &result {
                    Ok(r) if r.success => Notice::success("Processing completed successfully"),
                    Ok(r) => Notice::error(format!(
                        "Processing failed: {}",
                        r.message.as_deref().unwrap_or("unknown error")
                    )),
                    Err(WorkflowError::Backend { message, .. }) => {
                        Notice::error(format!("Processing failed: {message}"))
                    }
                    Err(e) => Notice::error(format!("Error processing file: {e}")),
                };
                if self.state.processing_resolved(attempt, result).is_applied() {
                    self.stop_ticker();
                    self.observer.on_progress(self.state.progress());
                    if let Some(r) = self.state.last_result() {
                        self.observer.on_result(r);
                    }
                    self.observer.on_notice(&notice);
                }
            }

            Completion::Tick { attempt, value } => {
                if let Some(p) = self.state.progress_tick(attempt, value) {
                    self.observer.on_progress(p);
                }
            }
        }
        self.emit_phase(before);
    }

    // ── Task management ──────────────────────────────────────────────────

    fn spawn_upload(&self, set: &FileSet) {
        let generation = set.generation();
        let files = set.files().to_vec();
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.upload(&files).await;
            let _ = tx.send(Completion::Upload { generation, result });
        });
    }

    fn spawn_preview(&mut self, generation: Generation, document: Bytes) {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let rasterizer = Arc::clone(&self.rasterizer);
        let options = PreviewOptions {
            max_pages: self.config.preview_max_pages,
            scale: self.config.preview_scale,
        };
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let mut stream = match render_preview(document, rasterizer, options).await {
                Ok(stream) => stream,
                Err(error) => {
                    let _ = tx.send(Completion::PreviewDone {
                        generation,
                        error: Some(error),
                    });
                    return;
                }
            };
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    next = stream.next() => match next {
                        Some(event) => {
                            if tx.send(Completion::Preview { generation, event }).is_err() {
                                return;
                            }
                        }
                        None => break,
                    },
                }
            }
            let _ = tx.send(Completion::PreviewDone {
                generation,
                error: None,
            });
        });
        self.preview_task = Some(cancel);
    }

    fn start_ticker(&mut self, attempt: AttemptId) {
        self.stop_ticker();
        let cancel = CancellationToken::new();
        let tx = self.tx.clone();
        let handle = spawn_ticker(
            ProgressEstimate::from_config(&self.config),
            self.config.progress_interval(),
            cancel.clone(),
            move |value| tx.send(Completion::Tick { attempt, value }).is_ok(),
        );
        self.ticker = Some((cancel, handle));
    }

    fn stop_ticker(&mut self) {
        if let Some((cancel, _)) = self.ticker.take() {
            cancel.cancel();
        }
    }

    fn stop_preview(&mut self) {
        if let Some(cancel) = self.preview_task.take() {
            cancel.cancel();
        }
    }

    fn emit_phase(&self, before: Phase) {
        let after = self.state.phase();
        if before != after {
            info!("Phase {} → {}", before, after);
            self.observer.on_phase_change(before, after);
        }
    }

    /// Whether the progress ticker is still running: neither cancelled nor
    /// stopped by itself at the ceiling.
    pub fn ticker_active(&self) -> bool {
        self.ticker
            .as_ref()
            .is_some_and(|(cancel, handle)| !cancel.is_cancelled() && !handle.is_finished())
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop_ticker();
        self.stop_preview();
    }
}
