//! Observer trait for workflow events, and the progress-estimate ticker.
//!
//! Inject an [`Arc<dyn WorkflowObserver>`] via
//! [`crate::controller::Controller::with_observer`] to receive events as the
//! controller applies them: phase changes, progress, preview pages and the
//! transient notices a UI would flash to the user.
//!
//! # Why callbacks instead of channels?
//!
//! Callers can forward events to a terminal progress bar, a WebSocket or a
//! log without the library knowing how the host renders anything. Every
//! observer call happens from inside a `Controller` method on the caller's
//! task, never concurrently.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdftools::{Phase, WorkflowObserver};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct PhaseLog(Mutex<Vec<Phase>>);
//!
//! impl WorkflowObserver for PhaseLog {
//!     fn on_phase_change(&self, _from: Phase, to: Phase) {
//!         self.0.lock().unwrap().push(to);
//!     }
//! }
//!
//! let log: Arc<dyn WorkflowObserver> = Arc::new(PhaseLog::default());
//! log.on_phase_change(Phase::Idle, Phase::Uploading);
//! ```

use crate::config::ClientConfig;
use crate::intake::FileSet;
use crate::pipeline::encode::Thumbnail;
use crate::pipeline::process::ProcessingResult;
use crate::tool::{Tool, ToolSpec};
use crate::workflow::Phase;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

// ── Notices ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A transient, user-visible message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

// ── Observer ─────────────────────────────────────────────────────────────

/// Called by the controller as the workflow changes.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait WorkflowObserver: Send + Sync {
    /// A known tool became active; `spec` describes its option panel.
    fn on_tool_selected(&self, tool: Tool, spec: &ToolSpec) {
        let _ = (tool, spec);
    }

    /// A new file set replaced the previous one.
    fn on_files_selected(&self, files: &FileSet) {
        let _ = files;
    }

    fn on_phase_change(&self, from: Phase, to: Phase) {
        let _ = (from, to);
    }

    /// Progress of the current processing attempt, in percent. Non-decreasing
    /// within one attempt; 100 only once the backend has answered.
    fn on_progress(&self, percent: f64) {
        let _ = percent;
    }

    /// A preview thumbnail landed in its slot.
    fn on_preview_page(&self, thumbnail: &Thumbnail) {
        let _ = thumbnail;
    }

    /// The previewed document has `remaining` pages beyond the preview cap.
    fn on_preview_overflow(&self, remaining: usize) {
        let _ = remaining;
    }

    fn on_notice(&self, notice: &Notice) {
        let _ = notice;
    }

    /// A processing attempt resolved (successfully or not).
    fn on_result(&self, result: &ProcessingResult) {
        let _ = result;
    }
}

/// The default observer.
pub struct NoopObserver;

impl WorkflowObserver for NoopObserver {}

pub type SharedObserver = Arc<dyn WorkflowObserver>;

// ── Progress estimate ────────────────────────────────────────────────────

/// Heuristic progress shown while the backend works.
///
/// Bears no relation to real server-side progress: it climbs by random
/// increments towards `ceiling` and stays there until the response arrives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEstimate {
    value: f64,
    ceiling: f64,
    max_step: f64,
}

/// Highest value an estimate may reach, whatever ceiling it was given.
pub const ESTIMATE_LIMIT: f64 = 99.0;

impl ProgressEstimate {
    /// `ceiling` is clamped to `[0, ESTIMATE_LIMIT]`, so only a real response
    /// can complete the bar.
    pub fn new(ceiling: f64, max_step: f64) -> Self {
        let ceiling = if ceiling.is_nan() {
            0.0
        } else {
            ceiling.clamp(0.0, ESTIMATE_LIMIT)
        };
        Self {
            value: 0.0,
            ceiling,
            max_step: max_step.max(0.0),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.progress_ceiling, config.progress_max_step)
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Advance by `fraction` (in `[0, 1)`) of the maximum step, capped at the
    /// ceiling. Never decreases.
    pub fn advance(&mut self, fraction: f64) -> f64 {
        let step = fraction.clamp(0.0, 1.0) * self.max_step;
        self.value = (self.value + step).min(self.ceiling);
        self.value
    }

    pub fn at_ceiling(&self) -> bool {
        self.value >= self.ceiling
    }
}

/// Spawn the progress ticker.
///
/// Every `period` the estimate advances by a random increment and `emit` is
/// called with the new value. The task ends when `cancel` fires, when the
/// estimate reaches its ceiling, or when `emit` returns `false` (receiver
/// gone).
pub fn spawn_ticker<F>(
    mut estimate: ProgressEstimate,
    period: Duration,
    cancel: CancellationToken,
    mut emit: F,
) -> JoinHandle<()>
where
    F: FnMut(f64) -> bool + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Progress ticker cancelled at {:.1}%", estimate.value());
                    break;
                }
                _ = interval.tick() => {
                    let fraction: f64 = rand::rng().random();
                    let value = estimate.advance(fraction);
                    debug!("Progress tick {:.1}%", value);
                    if !emit(value) || estimate.at_ceiling() {
                        break;
                    }
                }
            }
        }
    })
}
