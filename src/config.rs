//! Configuration for the workflow controller.
//!
//! All client behaviour is controlled through [`ClientConfig`], built via its
//! [`ClientConfigBuilder`]. Setters clamp obviously out-of-range values;
//! [`ClientConfigBuilder::build`] rejects what cannot be clamped (a base URL
//! that does not parse, for instance).

use crate::error::WorkflowError;
use reqwest::Url;
use serde::Serialize;
use std::time::Duration;

/// Configuration for a [`crate::controller::Controller`].
///
/// # Example
/// ```rust
/// use edgequake_pdftools::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://localhost:5000")
///     .upload_timeout_secs(60)
///     .build()
///     .unwrap();
/// assert_eq!(config.preview_max_pages, 3);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ClientConfig {
    /// Root URL of the processing service. Endpoint paths (`/api/upload`,
    /// `/api/compress`, …) and relative download locations are joined onto it.
    pub base_url: String,

    /// Upload call timeout in seconds. Default: 300.
    ///
    /// A hung upload would otherwise leave the workflow in `Uploading`
    /// forever. On expiry the upload resolves to
    /// [`WorkflowError::Timeout`] and the workflow moves to `Failed`.
    pub upload_timeout_secs: u64,

    /// Processing call timeout in seconds. Default: 600.
    pub process_timeout_secs: u64,

    /// Result download timeout in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Progress ticker period in milliseconds. Default: 200.
    pub progress_interval_ms: u64,

    /// Highest percentage the progress estimate reaches on its own. Default: 90.
    ///
    /// Only a real backend response moves the bar past this point.
    pub progress_ceiling: f64,

    /// Upper bound of one random progress increment, in percent. Default: 10.
    pub progress_max_step: f64,

    /// Number of leading pages rendered in the preview. Default: 3.
    ///
    /// 0 disables previews.
    pub preview_max_pages: usize,

    /// Scale factor applied to each preview page. Default: 0.5.
    pub preview_scale: f32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            upload_timeout_secs: 300,
            process_timeout_secs: 600,
            download_timeout_secs: 120,
            progress_interval_ms: 200,
            progress_ceiling: 90.0,
            progress_max_step: 10.0,
            preview_max_pages: 3,
            preview_scale: 0.5,
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Ticker period. Never zero, even for a config assembled field by field.
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }

    /// Resolve an endpoint path or a backend-provided location against `base_url`.
    ///
    /// Absolute locations (`https://cdn/…`) are returned unchanged.
    pub fn resolve(&self, location: &str) -> Result<Url, WorkflowError> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| WorkflowError::InvalidConfig(format!("base_url: {e}")))?;
        base.join(location).map_err(|e| WorkflowError::MalformedResponse {
            endpoint: location.to_string(),
            detail: format!("not a valid location: {e}"),
        })
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload_timeout_secs = secs.max(1);
        self
    }

    pub fn process_timeout_secs(mut self, secs: u64) -> Self {
        self.config.process_timeout_secs = secs.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn progress_interval_ms(mut self, ms: u64) -> Self {
        self.config.progress_interval_ms = ms.max(1);
        self
    }

    pub fn progress_ceiling(mut self, percent: f64) -> Self {
        self.config.progress_ceiling = percent;
        self
    }

    pub fn progress_max_step(mut self, percent: f64) -> Self {
        self.config.progress_max_step = percent;
        self
    }

    pub fn preview_max_pages(mut self, n: usize) -> Self {
        self.config.preview_max_pages = n;
        self
    }

    pub fn preview_scale(mut self, scale: f32) -> Self {
        self.config.preview_scale = scale;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, WorkflowError> {
        let c = &self.config;
        let url = Url::parse(&c.base_url).map_err(|e| {
            WorkflowError::InvalidConfig(format!("base_url '{}' is not a URL: {e}", c.base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(WorkflowError::InvalidConfig(format!(
                "base_url must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if !(c.progress_ceiling > 0.0 && c.progress_ceiling < 100.0) {
            return Err(WorkflowError::InvalidConfig(format!(
                "progress_ceiling must be in (0, 100), got {}",
                c.progress_ceiling
            )));
        }
        if !(c.progress_max_step > 0.0) {
            return Err(WorkflowError::InvalidConfig(format!(
                "progress_max_step must be > 0, got {}",
                c.progress_max_step
            )));
        }
        if !(c.preview_scale > 0.0 && c.preview_scale <= 4.0) {
            return Err(WorkflowError::InvalidConfig(format!(
                "preview_scale must be in (0, 4], got {}",
                c.preview_scale
            )));
        }
        Ok(self.config)
    }
}
