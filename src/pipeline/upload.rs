//! Upload wire format: `POST /api/upload`, multipart, one `files` part per file.
//!
//! The backend answers `{success: true, token}` or `{success: false, message}`.
//! Both answers may arrive with any HTTP status (a rejected upload comes back
//! as 400 with a JSON body), so the body is parsed before the status is
//! considered.

use crate::error::WorkflowError;
use crate::intake::FileHandle;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

pub const UPLOAD_ENDPOINT: &str = "/api/upload";

/// Multipart field name, repeated once per file.
pub const FILES_FIELD: &str = "files";

#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    pub success: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl UploadResponse {
    /// Collapse the wire shape into a token or an error.
    pub(crate) fn into_token(self) -> Result<String, WorkflowError> {
        if !self.success {
            return Err(WorkflowError::Backend {
                endpoint: UPLOAD_ENDPOINT.to_string(),
                message: self
                    .message
                    .unwrap_or_else(|| "upload rejected".to_string()),
            });
        }
        match self.token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(WorkflowError::MalformedResponse {
                endpoint: UPLOAD_ENDPOINT.to_string(),
                detail: "success without a token".to_string(),
            }),
        }
    }
}

/// Build the multipart body for `files`.
pub(crate) fn build_form(files: &[FileHandle]) -> Result<Form, WorkflowError> {
    files.iter().try_fold(Form::new(), |form, file| {
        let part = Part::stream_with_length(file.content.clone(), file.size)
            .file_name(file.name.clone())
            .mime_str(&file.mime)
            .map_err(|e| WorkflowError::Internal(format!("mime '{}': {e}", file.mime)))?;
        Ok(form.part(FILES_FIELD, part))
    })
}

/// Send `files` to the upload endpoint and return the session token.
pub(crate) async fn upload_files(
    client: &reqwest::Client,
    url: reqwest::Url,
    files: &[FileHandle],
    timeout: Duration,
) -> Result<String, WorkflowError> {
    let total: u64 = files.iter().map(|f| f.size).sum();
    info!("Uploading {} file(s), {} bytes", files.len(), total);

    let response = client
        .post(url)
        .multipart(build_form(files)?)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| super::transport_error(UPLOAD_ENDPOINT, timeout, e))?;

    let parsed: UploadResponse = super::read_json(UPLOAD_ENDPOINT, timeout, response).await?;
    let token = parsed.into_token();
    if let Err(ref e) = token {
        warn!("Upload failed: {}", e);
    }
    token
}
