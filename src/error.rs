//! Error types for the edgequake-pdftools library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`ValidationError`]: **Local**: the submission gate (or file intake)
//!   refused the request before any network traffic. The `Display` text is
//!   the message shown to the user.
//!
//! * [`WorkflowError`]: **Fatal to one operation**: an upload, processing
//!   call or download failed. The workflow moves to `Failed` (or the call
//!   returns `Err`), but the controller stays usable; the user retries by
//!   reselecting files or resubmitting.
//!
//! * [`PreviewError`]: **Non-fatal**: one preview page (or the whole
//!   preview) could not be rendered. Stored next to the preview slots so a
//!   broken thumbnail never blocks uploading or processing.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Rejections raised before a request reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// `submit` was called before a tool was chosen.
    #[error("Please select a tool first")]
    NoToolSelected,

    /// `submit` was called without a live upload session.
    #[error("Files not uploaded yet")]
    UploadIncomplete,

    /// A processing attempt is already in flight for this session.
    #[error("Processing is already in progress")]
    ProcessingInFlight,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Please enter a password")]
    PasswordRequired,

    #[error("Please enter a page range")]
    PageRangeRequired,

    /// The page-range expression does not follow `N`, `N-M`, `N,M-K`.
    #[error("Invalid page range: '{expr}'")]
    PageRangeInvalid { expr: String },

    #[error("Please choose an output format")]
    FormatRequired,
}

/// Errors returned by controller operations and backend calls.
#[derive(Debug, Error)]
pub enum WorkflowError {
    // ── Local ─────────────────────────────────────────────────────────────
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // ── Network ───────────────────────────────────────────────────────────
    /// Connection refused, DNS failure, broken body, non-JSON error page.
    #[error("Request to {endpoint} failed: {detail}")]
    Transport { endpoint: String, detail: String },

    /// The call exceeded its configured timeout.
    #[error("Request to {endpoint} timed out after {secs}s")]
    Timeout { endpoint: String, secs: u64 },

    /// The backend answered with `success: false`.
    #[error("{message}")]
    Backend { endpoint: String, message: String },

    /// The backend answered `success: true` but omitted a required field.
    #[error("Malformed response from {endpoint}: {detail}")]
    MalformedResponse { endpoint: String, detail: String },

    // ── Local I/O ─────────────────────────────────────────────────────────
    #[error("Failed to read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No file to download")]
    NothingToDownload,

    // ── Config ────────────────────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkflowError {
    /// Transport-level failures (as opposed to the backend saying no).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            WorkflowError::Transport { .. } | WorkflowError::Timeout { .. }
        )
    }
}

/// A non-fatal preview failure.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum PreviewError {
    /// The rasterisation engine could not be loaded.
    #[error("Preview engine unavailable: {detail}")]
    EngineUnavailable { detail: String },

    /// The document could not be opened at all.
    #[error("Document could not be opened for preview: {detail}")]
    DocumentUnreadable { detail: String },

    #[error("Page {page}: rendering failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    #[error("Page {page}: thumbnail encoding failed: {detail}")]
    EncodeFailed { page: usize, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_are_user_facing() {
        assert_eq!(
            ValidationError::NoToolSelected.to_string(),
            "Please select a tool first"
        );
        assert_eq!(
            ValidationError::UploadIncomplete.to_string(),
            "Files not uploaded yet"
        );
        assert_eq!(
            ValidationError::PasswordMismatch.to_string(),
            "Passwords do not match"
        );
    }

    #[test]
    fn validation_converts_into_workflow_error() {
        let e: WorkflowError = ValidationError::PageRangeRequired.into();
        assert!(matches!(
            e,
            WorkflowError::Validation(ValidationError::PageRangeRequired)
        ));
        assert_eq!(e.to_string(), "Please enter a page range");
    }

    #[test]
    fn transport_classification() {
        let t = WorkflowError::Timeout {
            endpoint: "/api/upload".into(),
            secs: 30,
        };
        assert!(t.is_transport());
        assert!(t.to_string().contains("30s"));

        let b = WorkflowError::Backend {
            endpoint: "/api/lock".into(),
            message: "Invalid token".into(),
        };
        assert!(!b.is_transport());
        assert_eq!(b.to_string(), "Invalid token");
    }

    #[test]
    fn preview_error_display() {
        let e = PreviewError::RenderFailed {
            page: 2,
            detail: "bad xref".into(),
        };
        assert!(e.to_string().contains("Page 2"));
        assert!(e.to_string().contains("bad xref"));
    }
}
