//! The processing service as seen by the controller.
//!
//! [`Backend`] is the seam between workflow sequencing and HTTP. The
//! controller only ever talks to an `Arc<dyn Backend>`; [`HttpBackend`] is
//! the real implementation, and tests substitute in-process fakes to control
//! response ordering.

use crate::config::ClientConfig;
use crate::error::WorkflowError;
use crate::intake::FileHandle;
use crate::pipeline::process::{self, ProcessingRequest, ProcessingResult};
use crate::pipeline::upload::{self, UPLOAD_ENDPOINT};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Upload `files` and return the session token.
    async fn upload(&self, files: &[FileHandle]) -> Result<String, WorkflowError>;

    /// Run one processing request against its tool endpoint.
    async fn process(&self, request: &ProcessingRequest) -> Result<ProcessingResult, WorkflowError>;

    /// Fetch the artifact at a location returned by [`Backend::process`].
    async fn download(&self, location: &str) -> Result<Bytes, WorkflowError>;
}

/// [`Backend`] over the service's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Result<Self, WorkflowError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("edgequake-pdftools/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WorkflowError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Reuse an existing client (connection pool, proxies, TLS roots).
    pub fn with_client(client: reqwest::Client, config: ClientConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn upload(&self, files: &[FileHandle]) -> Result<String, WorkflowError> {
        let url = self.config.resolve(UPLOAD_ENDPOINT)?;
        let timeout = Duration::from_secs(self.config.upload_timeout_secs);
        upload::upload_files(&self.client, url, files, timeout).await
    }

    async fn process(&self, request: &ProcessingRequest) -> Result<ProcessingResult, WorkflowError> {
        let url = self.config.resolve(request.endpoint())?;
        let timeout = Duration::from_secs(self.config.process_timeout_secs);
        process::submit(&self.client, url, request, timeout).await
    }

    async fn download(&self, location: &str) -> Result<Bytes, WorkflowError> {
        let url = self.config.resolve(location)?;
        let timeout = Duration::from_secs(self.config.download_timeout_secs);
        process::fetch(&self.client, url, timeout).await
    }
}
