//! Processing wire format: `POST /api/<tool>` with `{token, ...options}`,
//! and retrieval of the produced artifact.

use crate::error::WorkflowError;
use crate::format::format_size;
use crate::tool::{Tool, ToolOptions};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// A validated processing request for one upload session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingRequest {
    pub token: String,
    #[serde(flatten)]
    pub options: ToolOptions,
}

impl ProcessingRequest {
    pub fn tool(&self) -> Tool {
        self.options.tool()
    }

    pub fn endpoint(&self) -> &'static str {
        self.tool().endpoint()
    }
}

/// Outcome of one processing attempt.
///
/// `download_location` is present iff `success`; `message` is present iff
/// not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingResult {
    pub success: bool,
    pub original_size: u64,
    pub new_size: u64,
    pub reduction_percent: Option<f64>,
    pub download_location: Option<String>,
    pub message: Option<String>,
}

impl ProcessingResult {
    pub fn succeeded(
        original_size: u64,
        new_size: u64,
        reduction_percent: Option<f64>,
        download_location: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            original_size,
            new_size,
            reduction_percent,
            download_location: Some(download_location.into()),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            original_size: 0,
            new_size: 0,
            reduction_percent: None,
            download_location: None,
            message: Some(message.into()),
        }
    }

    /// `"12.5%"`, or `"N/A"` when the backend reported no (or zero) reduction.
    pub fn reduction_label(&self) -> String {
        match self.reduction_percent {
            Some(r) if r != 0.0 => format!("{r}%"),
            _ => "N/A".to_string(),
        }
    }

    pub fn original_size_label(&self) -> String {
        format_size(self.original_size)
    }

    pub fn new_size_label(&self) -> String {
        format_size(self.new_size)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProcessingResponse {
    pub success: bool,
    #[serde(default)]
    pub original_size: Option<u64>,
    #[serde(default)]
    pub new_size: Option<u64>,
    #[serde(default)]
    pub reduction: Option<f64>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ProcessingResponse {
    pub(crate) fn into_result(self, endpoint: &str) -> Result<ProcessingResult, WorkflowError> {
        if !self.success {
            return Err(WorkflowError::Backend {
                endpoint: endpoint.to_string(),
                message: self
                    .message
                    .unwrap_or_else(|| "processing rejected".to_string()),
            });
        }
        let location = match self.download_url {
            Some(url) if !url.is_empty() => url,
            _ => {
                return Err(WorkflowError::MalformedResponse {
                    endpoint: endpoint.to_string(),
                    detail: "success without a download_url".to_string(),
                })
            }
        };
        Ok(ProcessingResult::succeeded(
            self.original_size.unwrap_or(0),
            self.new_size.unwrap_or(0),
            self.reduction,
            location,
        ))
    }
}

/// Submit `request` to its tool's endpoint.
pub(crate) async fn submit(
    client: &reqwest::Client,
    url: reqwest::Url,
    request: &ProcessingRequest,
    timeout: Duration,
) -> Result<ProcessingResult, WorkflowError> {
    let endpoint = request.endpoint();
    info!("Submitting {} request to {}", request.tool(), endpoint);

    let response = client
        .post(url)
        .json(request)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| super::transport_error(endpoint, timeout, e))?;

    let parsed: ProcessingResponse = super::read_json(endpoint, timeout, response).await?;
    let result = parsed.into_result(endpoint);
    if let Err(ref e) = result {
        warn!("{} failed: {}", endpoint, e);
    }
    result
}

/// Fetch a produced artifact.
pub(crate) async fn fetch(
    client: &reqwest::Client,
    url: reqwest::Url,
    timeout: Duration,
) -> Result<Bytes, WorkflowError> {
    let endpoint = url.path().to_string();
    info!("Downloading {}", url);

    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| super::transport_error(&endpoint, timeout, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(WorkflowError::Transport {
            endpoint,
            detail: format!("HTTP {status}"),
        });
    }

    response
        .bytes()
        .await
        .map_err(|e| super::transport_error(&endpoint, timeout, e))
}
