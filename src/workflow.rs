//! The workflow state machine.
//!
//! [`WorkflowState`] is the single owner of everything the user sees: the
//! active tool, the current file set, the upload session, the last result,
//! the phase, progress and preview slots. It performs no I/O. Every
//! transition is a method taking `&mut self`; asynchronous completions come
//! back carrying the [`Generation`] or [`AttemptId`] they were issued under
//! and are applied only if that tag is still current.
//!
//! ```text
//!            select_files            upload ok            submit
//!   Idle ───────────────▶ Uploading ──────────▶ Ready ──────────▶ Submitting
//!                             │                   ▲                   │ dispatch
//!                 upload err  │                   │ resubmit          ▼
//!                             ▼                   │               Processing
//!                          Failed ◀───────────────┴─── err ──────────┤
//!                                                                    │ ok
//!                                                                    ▼
//!                                                               Succeeded
//! ```
//!
//! `reset` returns to `Idle` from anywhere; `select_files` restarts at
//! `Uploading` from anywhere.

use crate::error::{PreviewError, ValidationError, WorkflowError};
use crate::intake::{FileHandle, FileSet, Generation};
use crate::pipeline::process::{ProcessingRequest, ProcessingResult};
use crate::preview::{PreviewEvent, PreviewSlots};
use crate::progress::ESTIMATE_LIMIT;
use crate::tool::{OptionsForm, Tool};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// Explicit workflow phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Phase {
    #[default]
    Idle,
    Uploading,
    Ready,
    Submitting,
    Processing,
    Succeeded,
    Failed,
}

impl Phase {
    /// A processing attempt has been issued and not yet resolved.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Phase::Submitting | Phase::Processing)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Identity of one processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct AttemptId(pub u64);

impl AttemptId {
    pub fn next(self) -> AttemptId {
        AttemptId(self.0 + 1)
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt#{}", self.0)
    }
}

/// Backend token for the uploaded copy of one file set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadSession {
    pub token: String,
    pub generation: Generation,
}

/// Whether an asynchronous completion was applied or dropped as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    Stale,
}

impl Resolution {
    pub fn is_applied(self) -> bool {
        self == Resolution::Applied
    }
}

/// The workflow aggregate.
#[derive(Debug, Clone, Default)]
pub struct WorkflowState {
    active_tool: Option<Tool>,
    file_set: Option<FileSet>,
    session: Option<UploadSession>,
    last_result: Option<ProcessingResult>,
    last_error: Option<String>,
    phase: Phase,
    progress: f64,
    preview: PreviewSlots,
    preview_pending: bool,
    generation: Generation,
    last_attempt: AttemptId,
    in_flight: Option<AttemptId>,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn active_tool(&self) -> Option<Tool> {
        self.active_tool
    }

    pub fn file_set(&self) -> Option<&FileSet> {
        self.file_set.as_ref()
    }

    pub fn session(&self) -> Option<&UploadSession> {
        self.session.as_ref()
    }

    pub fn last_result(&self) -> Option<&ProcessingResult> {
        self.last_result.as_ref()
    }

    /// Display text of the error that put the workflow in `Failed`.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn preview(&self) -> &PreviewSlots {
        &self.preview
    }

    pub fn preview_pending(&self) -> bool {
        self.preview_pending
    }

    /// Version of the current file set. Bumped by every non-empty selection
    /// and by every effective reset.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// The processing attempt awaiting a response, if any.
    pub fn current_attempt(&self) -> Option<AttemptId> {
        self.in_flight
    }

    /// Where the produced artifact can be fetched, after a success.
    pub fn download_location(&self) -> Option<&str> {
        self.last_result
            .as_ref()
            .filter(|r| r.success)
            .and_then(|r| r.download_location.as_deref())
    }

    /// An upload, processing call or preview is still expected to report back.
    pub fn has_outstanding_work(&self) -> bool {
        self.phase == Phase::Uploading || self.phase.is_in_flight() || self.preview_pending
    }

    // ── Transitions ──────────────────────────────────────────────────────

    /// Make `id` the active tool. Unknown ids change nothing.
    pub fn select_tool(&mut self, id: &str) -> Option<Tool> {
        let Some(tool) = Tool::from_id(id) else {
            debug!("Ignoring unknown tool id '{}'", id);
            return None;
        };
        self.active_tool = Some(tool);
        info!("Tool selected: {}", tool);
        Some(tool)
    }

    /// Replace the file set and start over at `Uploading`.
    ///
    /// An empty selection is ignored. Otherwise the generation is bumped, so
    /// every upload, preview and processing completion issued before this
    /// call becomes stale. The active tool survives.
    pub fn select_files(&mut self, files: Vec<FileHandle>) -> Option<FileSet> {
        if files.is_empty() {
            debug!("Ignoring empty file selection");
            return None;
        }

        self.generation = self.generation.next();
        let set = FileSet::new(self.generation, files);
        info!("Files selected ({}): {}", self.generation, set.summary());

        self.preview_pending = set.first_previewable().is_some();
        self.file_set = Some(set.clone());
        self.session = None;
        self.last_result = None;
        self.last_error = None;
        self.in_flight = None;
        self.progress = 0.0;
        self.preview = PreviewSlots::default();
        self.phase = Phase::Uploading;
        Some(set)
    }

    /// Apply the outcome of the upload issued for `generation`.
    pub fn upload_resolved(
        &mut self,
        generation: Generation,
        result: Result<String, WorkflowError>,
    ) -> Resolution {
        if generation != self.generation || self.phase != Phase::Uploading {
            debug!(
                "Discarding stale upload response for {} (current {}, {})",
                generation, self.generation, self.phase
            );
            return Resolution::Stale;
        }

        match result {
            Ok(token) => {
                info!("Upload complete for {}", generation);
                self.session = Some(UploadSession { token, generation });
                self.phase = Phase::Ready;
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                self.phase = Phase::Failed;
            }
        }
        Resolution::Applied
    }

    /// The submission gate.
    ///
    /// Checks, in order: no attempt already in flight, a tool is selected, an
    /// upload session is live, the tool's options validate. On success the
    /// workflow enters `Submitting` under a fresh [`AttemptId`] and the
    /// request to send is returned. On failure nothing changes.
    pub fn begin_submit(
        &mut self,
        form: &OptionsForm,
    ) -> Result<(AttemptId, ProcessingRequest), ValidationError> {
        if self.phase.is_in_flight() {
            return Err(ValidationError::ProcessingInFlight);
        }
        let tool = self.active_tool.ok_or(ValidationError::NoToolSelected)?;
        let token = self
            .session
            .as_ref()
            .map(|s| s.token.clone())
            .ok_or(ValidationError::UploadIncomplete)?;
        let options = tool.validate(form)?;

        let attempt = self.last_attempt.next();
        self.last_attempt = attempt;
        self.in_flight = Some(attempt);
        self.progress = 0.0;
        self.last_result = None;
        self.last_error = None;
        self.phase = Phase::Submitting;
        info!("Submitting {} ({})", tool, attempt);

        Ok((attempt, ProcessingRequest { token, options }))
    }

    /// The request for `attempt` has been handed to the transport.
    pub fn dispatch(&mut self, attempt: AttemptId) -> Resolution {
        if self.in_flight != Some(attempt) || self.phase != Phase::Submitting {
            return Resolution::Stale;
        }
        self.phase = Phase::Processing;
        Resolution::Applied
    }

    /// Apply one progress-estimate tick. Returns the new progress if it moved.
    ///
    /// Ticks are capped at [`ESTIMATE_LIMIT`]; only `processing_resolved`
    /// sets 100.
    pub fn progress_tick(&mut self, attempt: AttemptId, value: f64) -> Option<f64> {
        if self.in_flight != Some(attempt) || self.phase != Phase::Processing {
            debug!("Discarding stale progress tick for {}", attempt);
            return None;
        }
        let value = value.min(ESTIMATE_LIMIT);
        if value <= self.progress {
            return None;
        }
        self.progress = value;
        Some(value)
    }

    /// Apply the response for `attempt`.
    ///
    /// A success consumes the session. A backend rejection (`success:
    /// false`) still snaps progress to 100, since the backend did answer; a
    /// transport failure leaves progress where the estimate had it. Either
    /// failure keeps the session so the user can resubmit.
    pub fn processing_resolved(
        &mut self,
        attempt: AttemptId,
        result: Result<ProcessingResult, WorkflowError>,
    ) -> Resolution {
        if self.in_flight != Some(attempt) || !self.phase.is_in_flight() {
            debug!(
                "Discarding stale processing response for {} (current {:?})",
                attempt, self.in_flight
            );
            return Resolution::Stale;
        }
        self.in_flight = None;

        match result {
            Ok(r) if r.success => {
                info!("Processing succeeded ({})", attempt);
                self.progress = 100.0;
                self.session = None;
                self.last_result = Some(r);
                self.phase = Phase::Succeeded;
            }
            Ok(r) => {
                self.progress = 100.0;
                self.last_error = r.message.clone();
                self.last_result = Some(r);
                self.phase = Phase::Failed;
            }
            Err(e) => {
                if let WorkflowError::Backend { .. } = e {
                    self.progress = 100.0;
                }
                let message = e.to_string();
                self.last_result = Some(ProcessingResult::failed(message.clone()));
                self.last_error = Some(message);
                self.phase = Phase::Failed;
            }
        }
        Resolution::Applied
    }

    /// Fold one preview event rendered for `generation` into the slots.
    ///
    /// Returns the page placed, if any. Events for superseded file sets are
    /// dropped.
    pub fn preview_event(&mut self, generation: Generation, event: PreviewEvent) -> Option<usize> {
        if generation != self.generation || !self.preview_pending {
            debug!("Discarding stale preview event for {}", generation);
            return None;
        }
        self.preview.apply(event)
    }

    /// The preview for `generation` is over. `error` is set when the
    /// document could not be opened at all.
    pub fn preview_finished(
        &mut self,
        generation: Generation,
        error: Option<PreviewError>,
    ) -> Resolution {
        if generation != self.generation || !self.preview_pending {
            return Resolution::Stale;
        }
        self.preview_pending = false;
        self.preview.unavailable = error;
        Resolution::Applied
    }

    /// Start over.
    ///
    /// Clears the tool, files, session, result and preview, and bumps the
    /// generation so that nothing issued earlier can touch the new state.
    /// Returns `false` (and changes nothing) when already pristine.
    pub fn reset(&mut self) -> bool {
        if self.is_pristine() {
            return false;
        }
        info!("Workflow reset");
        *self = WorkflowState {
            generation: self.generation.next(),
            last_attempt: self.last_attempt,
            ..WorkflowState::default()
        };
        true
    }

    fn is_pristine(&self) -> bool {
        self.phase == Phase::Idle
            && self.active_tool.is_none()
            && self.file_set.is_none()
            && self.session.is_none()
            && self.last_result.is_none()
            && self.last_error.is_none()
            && self.in_flight.is_none()
            && !self.preview_pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::Thumbnail;
    use crate::tool::ToolOptions;

    fn pdf(name: &str) -> FileHandle {
        FileHandle::new(name, "application/pdf", b"%PDF-1.7".to_vec())
    }

    fn lock_form(password: &str, confirm: &str) -> OptionsForm {
        OptionsForm {
            password: Some(password.into()),
            confirm_password: Some(confirm.into()),
            ..OptionsForm::default()
        }
    }

    /// Tool `lock`, one file uploaded with token `t1`.
    fn ready_for_lock() -> WorkflowState {
        let mut s = WorkflowState::new();
        s.select_tool("lock");
        let set = s.select_files(vec![pdf("a.pdf")]).unwrap();
        assert!(s
            .upload_resolved(set.generation(), Ok("t1".into()))
            .is_applied());
        s
    }

    fn backend_error(message: &str) -> WorkflowError {
        WorkflowError::Backend {
            endpoint: "/api/lock".into(),
            message: message.into(),
        }
    }

    #[test]
    fn unknown_tool_is_a_silent_no_op() {
        let mut s = WorkflowState::new();
        s.select_tool("merge");
        assert_eq!(s.select_tool("Merge"), None);
        assert_eq!(s.select_tool("rotate"), None);
        assert_eq!(s.active_tool(), Some(Tool::Merge));
    }

    #[test]
    fn tool_selection_leaves_files_and_session_alone() {
        let mut s = ready_for_lock();
        s.select_tool("compress");
        assert_eq!(s.phase(), Phase::Ready);
        assert_eq!(s.session().map(|x| x.token.as_str()), Some("t1"));
        assert!(s.file_set().is_some());
    }

    #[test]
    fn empty_selection_changes_nothing() {
        let mut s = ready_for_lock();
        let before = s.generation();
        assert!(s.select_files(vec![]).is_none());
        assert_eq!(s.generation(), before);
        assert_eq!(s.phase(), Phase::Ready);
    }

    #[test]
    fn selection_enters_uploading_and_marks_preview() {
        let mut s = WorkflowState::new();
        let set = s
            .select_files(vec![
                FileHandle::new("a.png", "image/png", vec![1, 2, 3]),
                pdf("b.pdf"),
            ])
            .unwrap();
        assert_eq!(s.phase(), Phase::Uploading);
        assert_eq!(set.generation(), Generation(1));
        assert!(s.preview_pending());
        assert!(s.has_outstanding_work());

        s.select_files(vec![FileHandle::new("c.png", "image/png", vec![0])]);
        assert!(!s.preview_pending());
    }

    #[test]
    fn upload_failure_moves_to_failed_without_session() {
        let mut s = WorkflowState::new();
        let set = s.select_files(vec![pdf("a.pdf")]).unwrap();
        s.upload_resolved(
            set.generation(),
            Err(WorkflowError::Transport {
                endpoint: "/api/upload".into(),
                detail: "connection refused".into(),
            }),
        );
        assert_eq!(s.phase(), Phase::Failed);
        assert!(s.session().is_none());
        assert!(s.last_error().unwrap().contains("connection refused"));
    }

    #[test]
    fn late_upload_for_older_selection_is_discarded() {
        let mut s = WorkflowState::new();
        let a = s.select_files(vec![pdf("a.pdf")]).unwrap();
        let b = s.select_files(vec![pdf("b.pdf")]).unwrap();

        assert_eq!(
            s.upload_resolved(a.generation(), Ok("token-a".into())),
            Resolution::Stale
        );
        assert!(s.session().is_none());
        assert_eq!(s.phase(), Phase::Uploading);

        s.upload_resolved(b.generation(), Ok("token-b".into()));
        assert_eq!(s.session().map(|x| x.token.as_str()), Some("token-b"));
        assert_eq!(s.session().map(|x| x.generation), Some(b.generation()));

        // Arriving after B's resolution changes nothing either.
        assert_eq!(
            s.upload_resolved(a.generation(), Ok("token-a".into())),
            Resolution::Stale
        );
        assert_eq!(s.session().map(|x| x.token.as_str()), Some("token-b"));
    }

    #[test]
    fn submit_requires_a_tool() {
        let mut s = WorkflowState::new();
        let set = s.select_files(vec![pdf("a.pdf")]).unwrap();
        s.upload_resolved(set.generation(), Ok("t1".into()));
        assert_eq!(
            s.begin_submit(&OptionsForm::default()).unwrap_err(),
            ValidationError::NoToolSelected
        );
        assert_eq!(s.phase(), Phase::Ready);
    }

    #[test]
    fn submit_requires_a_session() {
        let mut s = WorkflowState::new();
        s.select_tool("merge");
        assert_eq!(
            s.begin_submit(&OptionsForm::default()).unwrap_err(),
            ValidationError::UploadIncomplete
        );
        s.select_files(vec![pdf("a.pdf")]);
        assert_eq!(
            s.begin_submit(&OptionsForm::default()).unwrap_err(),
            ValidationError::UploadIncomplete
        );
        assert_eq!(s.phase(), Phase::Uploading);
    }

    #[test]
    fn mismatched_passwords_never_reach_submitting() {
        let mut s = ready_for_lock();
        assert_eq!(
            s.begin_submit(&lock_form("abc", "xyz")).unwrap_err(),
            ValidationError::PasswordMismatch
        );
        assert_eq!(s.phase(), Phase::Ready);
        assert!(s.current_attempt().is_none());
    }

    #[test]
    fn lock_scenario_reaches_succeeded() {
        let mut s = ready_for_lock();
        let (attempt, request) = s.begin_submit(&lock_form("abc", "abc")).unwrap();
        assert_eq!(s.phase(), Phase::Submitting);
        assert_eq!(request.token, "t1");
        assert_eq!(
            request.options,
            ToolOptions::Lock {
                password: "abc".into()
            }
        );

        assert!(s.dispatch(attempt).is_applied());
        assert_eq!(s.phase(), Phase::Processing);

        s.processing_resolved(
            attempt,
            Ok(ProcessingResult::succeeded(1000, 1000, None, "/d/1")),
        );
        assert_eq!(s.phase(), Phase::Succeeded);
        assert_eq!(s.download_location(), Some("/d/1"));
        assert_eq!(s.progress(), 100.0);
        assert!(s.session().is_none());
        assert!(!s.has_outstanding_work());
    }

    #[test]
    fn second_submit_while_in_flight_is_rejected() {
        let mut s = ready_for_lock();
        let (attempt, _) = s.begin_submit(&lock_form("abc", "abc")).unwrap();
        assert_eq!(
            s.begin_submit(&lock_form("abc", "abc")).unwrap_err(),
            ValidationError::ProcessingInFlight
        );
        s.dispatch(attempt);
        assert_eq!(
            s.begin_submit(&lock_form("abc", "abc")).unwrap_err(),
            ValidationError::ProcessingInFlight
        );
        assert_eq!(s.current_attempt(), Some(attempt));
    }

    #[test]
    fn success_consumes_the_session() {
        let mut s = ready_for_lock();
        let (attempt, _) = s.begin_submit(&lock_form("abc", "abc")).unwrap();
        s.dispatch(attempt);
        s.processing_resolved(attempt, Ok(ProcessingResult::succeeded(1, 1, None, "/d")));
        assert_eq!(
            s.begin_submit(&lock_form("abc", "abc")).unwrap_err(),
            ValidationError::UploadIncomplete
        );
    }

    #[test]
    fn backend_failure_keeps_session_and_allows_resubmit() {
        let mut s = ready_for_lock();
        let (first, _) = s.begin_submit(&lock_form("abc", "abc")).unwrap();
        s.dispatch(first);
        s.progress_tick(first, 40.0);
        s.processing_resolved(first, Err(backend_error("Invalid token")));

        assert_eq!(s.phase(), Phase::Failed);
        assert_eq!(s.progress(), 100.0);
        assert_eq!(s.download_location(), None);
        let result = s.last_result().unwrap();
        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("Invalid token"));

        let (second, request) = s.begin_submit(&lock_form("abc", "abc")).unwrap();
        assert!(second > first);
        assert_eq!(request.token, "t1");
        assert_eq!(s.progress(), 0.0);
    }

    #[test]
    fn transport_failure_leaves_progress_where_it_was() {
        let mut s = ready_for_lock();
        let (attempt, _) = s.begin_submit(&lock_form("abc", "abc")).unwrap();
        s.dispatch(attempt);
        s.progress_tick(attempt, 37.5);
        s.processing_resolved(
            attempt,
            Err(WorkflowError::Timeout {
                endpoint: "/api/lock".into(),
                secs: 600,
            }),
        );
        assert_eq!(s.phase(), Phase::Failed);
        assert_eq!(s.progress(), 37.5);
        assert!(s.last_error().unwrap().contains("timed out"));
    }

    #[test]
    fn progress_is_monotonic_within_an_attempt() {
        let mut s = ready_for_lock();
        let (attempt, _) = s.begin_submit(&lock_form("abc", "abc")).unwrap();
        s.dispatch(attempt);

        let mut shown = vec![s.progress()];
        for v in [5.0, 12.0, 9.0, 30.0, 30.0, 2.0, 88.0] {
            s.progress_tick(attempt, v);
            shown.push(s.progress());
        }
        assert!(shown.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(s.progress(), 88.0);
        assert_ne!(s.progress(), 100.0);

        s.processing_resolved(attempt, Ok(ProcessingResult::succeeded(1, 1, None, "/d")));
        assert_eq!(s.progress(), 100.0);
        assert_eq!(s.progress_tick(attempt, 95.0), None);
        assert_eq!(s.progress(), 100.0);
    }

    #[test]
    fn ticks_never_complete_the_bar() {
        let mut s = ready_for_lock();
        let (attempt, _) = s.begin_submit(&lock_form("abc", "abc")).unwrap();
        s.dispatch(attempt);

        assert_eq!(s.progress_tick(attempt, 150.0), Some(ESTIMATE_LIMIT));
        assert_eq!(s.progress_tick(attempt, 100.0), None);
        assert!(s.progress() < 100.0);
        assert_eq!(s.phase(), Phase::Processing);
    }

    #[test]
    fn new_selection_supersedes_processing_attempt() {
        let mut s = ready_for_lock();
        let (attempt, _) = s.begin_submit(&lock_form("abc", "abc")).unwrap();
        s.dispatch(attempt);

        s.select_files(vec![pdf("other.pdf")]);
        assert_eq!(s.phase(), Phase::Uploading);
        assert_eq!(s.progress_tick(attempt, 50.0), None);
        assert_eq!(
            s.processing_resolved(attempt, Ok(ProcessingResult::succeeded(1, 1, None, "/d"))),
            Resolution::Stale
        );
        assert_eq!(s.phase(), Phase::Uploading);
        assert!(s.last_result().is_none());
    }

    #[test]
    fn reset_clears_everything_and_is_idempotent() {
        let mut s = ready_for_lock();
        let (attempt, _) = s.begin_submit(&lock_form("abc", "abc")).unwrap();
        s.dispatch(attempt);
        let generation = s.file_set().unwrap().generation();

        assert!(s.reset());
        assert_eq!(s.phase(), Phase::Idle);
        assert!(s.active_tool().is_none());
        assert!(s.file_set().is_none());
        assert!(s.session().is_none());
        assert!(s.last_result().is_none());
        assert!(s.current_attempt().is_none());
        assert!(!s.has_outstanding_work());

        let after_first = s.generation();
        assert!(!s.reset());
        assert_eq!(s.generation(), after_first);

        // Nothing issued before the reset can resurrect the workflow.
        assert_eq!(
            s.processing_resolved(attempt, Ok(ProcessingResult::succeeded(1, 1, None, "/d"))),
            Resolution::Stale
        );
        assert_eq!(
            s.upload_resolved(generation, Ok("t9".into())),
            Resolution::Stale
        );
        assert_eq!(s.phase(), Phase::Idle);
    }

    #[test]
    fn attempt_ids_keep_increasing_across_reset() {
        let mut s = ready_for_lock();
        let (first, _) = s.begin_submit(&lock_form("abc", "abc")).unwrap();
        s.reset();
        s.select_tool("lock");
        let set = s.select_files(vec![pdf("a.pdf")]).unwrap();
        s.upload_resolved(set.generation(), Ok("t2".into()));
        let (second, _) = s.begin_submit(&lock_form("abc", "abc")).unwrap();
        assert!(second > first);
    }

    #[test]
    fn preview_events_are_generation_tagged() {
        let thumb = |n| Thumbnail {
            page_num: n,
            width: 1,
            height: 1,
            png: vec![],
        };
        let mut s = WorkflowState::new();
        let a = s.select_files(vec![pdf("a.pdf")]).unwrap().generation();
        s.preview_event(
            a,
            PreviewEvent::Started {
                total_pages: 2,
                slots: 2,
            },
        );
        let b = s.select_files(vec![pdf("b.pdf")]).unwrap().generation();

        assert_eq!(
            s.preview_event(
                a,
                PreviewEvent::Page {
                    page_num: 1,
                    result: Ok(thumb(1))
                }
            ),
            None
        );
        assert!(s.preview().slots.is_empty());
        assert_eq!(s.preview_finished(a, None), Resolution::Stale);
        assert!(s.preview_pending());

        s.preview_event(
            b,
            PreviewEvent::Started {
                total_pages: 1,
                slots: 1,
            },
        );
        assert_eq!(
            s.preview_event(
                b,
                PreviewEvent::Page {
                    page_num: 1,
                    result: Ok(thumb(1))
                }
            ),
            Some(1)
        );
        assert!(s.preview_finished(b, None).is_applied());
        assert!(!s.preview_pending());
    }

    #[test]
    fn unreadable_preview_is_recorded_without_failing_the_workflow() {
        let mut s = WorkflowState::new();
        let g = s.select_files(vec![pdf("a.pdf")]).unwrap().generation();
        s.preview_finished(
            g,
            Some(PreviewError::DocumentUnreadable {
                detail: "bad xref".into(),
            }),
        );
        assert!(s.preview().unavailable.is_some());
        assert_eq!(s.phase(), Phase::Uploading);
    }
}
