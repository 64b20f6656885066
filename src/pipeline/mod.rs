//! Wire-level stages used by the controller.
//!
//! Each submodule owns exactly one concern, so each is independently testable
//! and the rendering backend can change without touching the HTTP code.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌──▶ render ──▶ encode      (preview thumbnails)
//! FileSet ───┤
//!            └──▶ upload ──▶ token ──▶ process ──▶ download location
//!                 (multipart)          (JSON)
//! ```
//!
//! 1. [`upload`]: multipart `POST /api/upload`, yields a session token
//! 2. [`process`]: JSON `POST /api/<tool>`, yields a [`process::ProcessingResult`];
//!    also fetches the produced artifact
//! 3. [`render`]: rasterise one page; blocking, run in `spawn_blocking`
//! 4. [`encode`]: PNG-encode a rendered page into a thumbnail

pub mod encode;
pub mod process;
pub mod render;
pub mod upload;

use crate::error::WorkflowError;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Classify a reqwest failure as a timeout or a plain transport error.
pub(crate) fn transport_error(endpoint: &str, timeout: Duration, e: reqwest::Error) -> WorkflowError {
    if e.is_timeout() {
        WorkflowError::Timeout {
            endpoint: endpoint.to_string(),
            secs: timeout.as_secs(),
        }
    } else {
        WorkflowError::Transport {
            endpoint: endpoint.to_string(),
            detail: e.to_string(),
        }
    }
}

/// Parse a JSON body regardless of HTTP status.
///
/// The backend reports rejections as `{success: false, message}` with a 4xx
/// status, so a parseable body always wins. Only an unparseable body turns
/// into a transport error, mentioning the status when it was not 2xx.
pub(crate) async fn read_json<T: DeserializeOwned>(
    endpoint: &str,
    timeout: Duration,
    response: reqwest::Response,
) -> Result<T, WorkflowError> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| transport_error(endpoint, timeout, e))?;

    serde_json::from_slice(&body).map_err(|e| {
        let detail = if status.is_success() {
            format!("invalid JSON body: {e}")
        } else {
            format!("HTTP {status}")
        };
        WorkflowError::Transport {
            endpoint: endpoint.to_string(),
            detail,
        }
    })
}
