//! # edgequake-pdftools
//!
//! Client-side controller for a PDF processing service: pick a tool
//! (compress, merge, split, lock, convert), select files, upload them, submit
//! a processing request with live progress, preview the first pages, and
//! download the result.
//!
//! ## Why this crate?
//!
//! The interesting part of such a client is not the HTTP calls but their
//! ordering. Users reselect files while an upload is in flight, hit "start
//! over" while the server is still working, and page previews finish in any
//! order. This crate keeps one owned [`WorkflowState`] with an explicit
//! [`Phase`], tags every asynchronous operation with the generation or
//! attempt it belongs to, and drops responses whose tag is no longer
//! current.
//!
//! ## Workflow Overview
//!
//! ```text
//! select_tool ─┐
//!              ├─▶ select_files ─┬─▶ preview (first 3 pages, any order)
//!              │                 └─▶ upload ──▶ token
//!              └──────────────────────────────────┴─▶ submit ──▶ progress ──▶ result ──▶ download
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdftools::{ClientConfig, Controller, FileHandle, OptionsForm, Phase};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder().base_url("http://localhost:5000").build()?;
//!     let mut ctl = Controller::new(config)?;
//!
//!     ctl.select_tool("compress");
//!     ctl.select_files(vec![FileHandle::from_path("report.pdf").await?]);
//!     ctl.settle().await;
//!
//!     ctl.submit(&OptionsForm { level: Some("3".into()), ..Default::default() })?;
//!     ctl.settle().await;
//!
//!     if ctl.state().phase() == Phase::Succeeded {
//!         ctl.download_to("report.min.pdf").await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdftools` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-pdftools = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod format;
pub mod intake;
pub mod pipeline;
pub mod preview;
pub mod progress;
pub mod tool;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{Backend, HttpBackend};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use controller::Controller;
pub use error::{PreviewError, ValidationError, WorkflowError};
pub use format::format_size;
pub use intake::{FileHandle, FileSet, Generation};
pub use pipeline::encode::Thumbnail;
pub use pipeline::process::{ProcessingRequest, ProcessingResult};
pub use pipeline::render::{PageRasterizer, PdfiumRasterizer};
pub use preview::{render_preview, PreviewEvent, PreviewOptions, PreviewSlots};
pub use progress::{Notice, NoticeLevel, NoopObserver, SharedObserver, WorkflowObserver};
pub use tool::{CompressionLevel, OptionsForm, Tool, ToolOptions, ToolSpec};
pub use workflow::{AttemptId, Phase, UploadSession, WorkflowState};
