//! Shared fakes for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use edgequake_pdftools::{
    Backend, ClientConfig, FileHandle, Notice, NoticeLevel, PageRasterizer, Phase, PreviewError,
    ProcessingRequest, ProcessingResult, Thumbnail, WorkflowError, WorkflowObserver,
};
use image::{DynamicImage, Rgba, RgbaImage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;

pub fn pdf(name: &str) -> FileHandle {
    FileHandle::new(name, "application/pdf", b"%PDF-1.7\n".to_vec())
}

pub fn png(name: &str) -> FileHandle {
    FileHandle::new(name, "image/png", vec![0x89, b'P', b'N', b'G'])
}

/// Fast ticker so progress tests finish quickly.
pub fn fast_config(base_url: &str) -> ClientConfig {
    ClientConfig::builder()
        .base_url(base_url)
        .progress_interval_ms(5)
        .upload_timeout_secs(5)
        .process_timeout_secs(5)
        .download_timeout_secs(5)
        .build()
        .expect("valid test config")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("edgequake_pdftools=debug")
        .with_test_writer()
        .try_init();
}

// ── Observer ─────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct Recorder {
    pub notices: Mutex<Vec<Notice>>,
    pub progress: Mutex<Vec<f64>>,
    pub phases: Mutex<Vec<Phase>>,
    pub pages: Mutex<Vec<usize>>,
    pub overflow: Mutex<Option<usize>>,
    pub results: Mutex<Vec<ProcessingResult>>,
}

impl Recorder {
    pub fn messages(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.message.clone())
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.level == NoticeLevel::Error)
            .map(|n| n.message.clone())
            .collect()
    }
}

impl WorkflowObserver for Recorder {
    fn on_phase_change(&self, _from: Phase, to: Phase) {
        self.phases.lock().unwrap().push(to);
    }

    fn on_progress(&self, percent: f64) {
        self.progress.lock().unwrap().push(percent);
    }

    fn on_preview_page(&self, thumbnail: &Thumbnail) {
        self.pages.lock().unwrap().push(thumbnail.page_num);
    }

    fn on_preview_overflow(&self, remaining: usize) {
        *self.overflow.lock().unwrap() = Some(remaining);
    }

    fn on_notice(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(notice.clone());
    }

    fn on_result(&self, result: &ProcessingResult) {
        self.results.lock().unwrap().push(result.clone());
    }
}

// ── Rasterizer ───────────────────────────────────────────────────────────

/// Every document has `pages` pages, each a blank 4x4 image.
pub struct FakeRasterizer {
    pub pages: usize,
}

impl PageRasterizer for FakeRasterizer {
    fn page_count(&self, _document: &[u8]) -> Result<usize, PreviewError> {
        Ok(self.pages)
    }

    fn render_page(
        &self,
        _document: &[u8],
        _page_index: usize,
        _scale: f32,
    ) -> Result<DynamicImage, PreviewError> {
        Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            4,
            4,
            Rgba([255, 255, 255, 255]),
        )))
    }
}

// ── Backend ──────────────────────────────────────────────────────────────

type UploadReply = Result<String, WorkflowError>;
type ProcessReply = Result<ProcessingResult, WorkflowError>;

/// A backend whose every answer is released by the test.
///
/// Uploads are keyed by the first file's name; processing calls are queued
/// in submission order.
#[derive(Default)]
pub struct GatedBackend {
    pub uploads: AtomicUsize,
    pub processes: AtomicUsize,
    pub requests: Mutex<Vec<ProcessingRequest>>,
    upload_gates: Mutex<HashMap<String, oneshot::Receiver<UploadReply>>>,
    process_gates: Mutex<Vec<oneshot::Receiver<ProcessReply>>>,
}

impl GatedBackend {
    /// Register the gate for the upload of a file set starting with `name`.
    pub fn gate_upload(&self, name: &str) -> oneshot::Sender<UploadReply> {
        let (tx, rx) = oneshot::channel();
        self.upload_gates.lock().unwrap().insert(name.to_string(), rx);
        tx
    }

    /// Register the gate for the next processing call.
    pub fn gate_process(&self) -> oneshot::Sender<ProcessReply> {
        let (tx, rx) = oneshot::channel();
        self.process_gates.lock().unwrap().push(rx);
        tx
    }
}

#[async_trait]
impl Backend for GatedBackend {
    async fn upload(&self, files: &[FileHandle]) -> Result<String, WorkflowError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let gate = files
            .first()
            .and_then(|f| self.upload_gates.lock().unwrap().remove(&f.name));
        match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(WorkflowError::Internal("gate dropped".into()))),
            None => Ok(format!("token-{}", files.len())),
        }
    }

    async fn process(&self, request: &ProcessingRequest) -> Result<ProcessingResult, WorkflowError> {
        self.processes.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let gate = {
            let mut gates = self.process_gates.lock().unwrap();
            (!gates.is_empty()).then(|| gates.remove(0))
        };
        match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(WorkflowError::Internal("gate dropped".into()))),
            None => Ok(ProcessingResult::succeeded(10, 5, Some(50.0), "/d/auto")),
        }
    }

    async fn download(&self, location: &str) -> Result<Bytes, WorkflowError> {
        Ok(Bytes::from(format!("artifact at {location}")))
    }
}

pub fn ok_result(location: &str) -> ProcessReply {
    Ok(ProcessingResult::succeeded(1000, 1000, None, location))
}

pub fn assert_non_decreasing(values: &[f64]) {
    assert!(
        values.windows(2).all(|w| w[0] <= w[1]),
        "progress went backwards: {values:?}"
    );
}
