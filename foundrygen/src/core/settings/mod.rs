//! Client Settings
//!
//! Explicit configuration objects handed to the clients at construction:
//! - [`ServiceEndpoint`]: where a deployment lives and which API version it speaks
//! - [`VideoSettings`] / [`ImageSettings`]: polling cadence and timeouts
//! - [`ClientSettings`]: the two above, loadable from a JSON settings file
//!
//! Nothing in this module reads process environment variables; that is left
//! to the caller (the CLI resolves them once and passes values in).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::core::{CoreError, CoreResult};

/// API version used by the video job endpoints
pub const DEFAULT_VIDEO_API_VERSION: &str = "preview";

/// API version used by the image deployment endpoints
pub const DEFAULT_IMAGE_API_VERSION: &str = "2025-04-01-preview";

/// Default video deployment name
pub const DEFAULT_VIDEO_DEPLOYMENT: &str = "sora";

/// Default image deployment name
pub const DEFAULT_IMAGE_DEPLOYMENT: &str = "gpt-image-1";

// =============================================================================
// Service Endpoint
// =============================================================================

/// Location of one deployment on the remote platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    endpoint: String,
    deployment: String,
    api_version: String,
}

impl ServiceEndpoint {
    /// Creates an endpoint, rejecting empty or non-http(s) URLs.
    pub fn new(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
    ) -> CoreResult<Self> {
        let endpoint = endpoint.into();
        let trimmed = endpoint.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(CoreError::Configuration(
                "Service endpoint URL must be provided".to_string(),
            ));
        }

        let parsed = reqwest::Url::parse(trimmed).map_err(|e| {
            CoreError::Configuration(format!("Invalid endpoint URL '{}': {}", trimmed, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CoreError::Configuration(format!(
                "Unsupported endpoint URL scheme '{}'. Only http/https are allowed.",
                parsed.scheme()
            )));
        }

        let deployment = deployment.into();
        if deployment.trim().is_empty() {
            return Err(CoreError::Configuration(
                "Deployment name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            endpoint: trimmed.to_string(),
            deployment: deployment.trim().to_string(),
            api_version: api_version.into(),
        })
    }

    /// Video endpoint with the default video API version
    pub fn video(endpoint: impl Into<String>, deployment: impl Into<String>) -> CoreResult<Self> {
        Self::new(endpoint, deployment, DEFAULT_VIDEO_API_VERSION)
    }

    /// Image endpoint with the default image API version
    pub fn image(endpoint: impl Into<String>, deployment: impl Into<String>) -> CoreResult<Self> {
        Self::new(endpoint, deployment, DEFAULT_IMAGE_API_VERSION)
    }

    /// Base URL without trailing slash
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Builds `{endpoint}/{path}?api-version={version}`
    pub fn url(&self, path: &str) -> String {
        self.url_with_version(path, &self.api_version)
    }

    /// Builds `{endpoint}/{path}?api-version={version}` with an explicit version
    pub fn url_with_version(&self, path: &str, api_version: &str) -> String {
        format!(
            "{}/{}?api-version={}",
            self.endpoint,
            path.trim_start_matches('/'),
            api_version
        )
    }
}

// =============================================================================
// Operation Settings
// =============================================================================

/// Timeouts and cadence for the video job workflow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoSettings {
    /// Fixed delay between status queries
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Bound on a single status query
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    /// Default overall wait for a job to reach a terminal state
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
    /// Bound on the job creation request
    #[serde(default = "default_submit_timeout_secs")]
    pub submit_timeout_secs: u64,
    /// Bound on the content download
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    10
}
fn default_query_timeout_secs() -> u64 {
    30
}
fn default_job_timeout_secs() -> u64 {
    1800
}
fn default_submit_timeout_secs() -> u64 {
    60
}
fn default_download_timeout_secs() -> u64 {
    300
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            query_timeout_secs: default_query_timeout_secs(),
            job_timeout_secs: default_job_timeout_secs(),
            submit_timeout_secs: default_submit_timeout_secs(),
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

impl VideoSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

/// Timeouts for image calls
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageSettings {
    /// Request timeout; `None` waits for as long as the service takes
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl ImageSettings {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

// =============================================================================
// Settings File
// =============================================================================

/// All client settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientSettings {
    #[serde(default)]
    pub video: VideoSettings,
    #[serde(default)]
    pub image: ImageSettings,
}

impl ClientSettings {
    /// Loads settings from a JSON file.
    ///
    /// A missing file yields defaults; an unreadable or malformed file is a
    /// configuration error.
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            info!(
                "Settings file {} not found, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Configuration(format!(
                "Failed to read settings file {}: {}",
                path.display(),
                e
            ))
        })?;

        let settings: ClientSettings = serde_json::from_str(&content).map_err(|e| {
            CoreError::Configuration(format!(
                "Failed to parse settings file {}: {}",
                path.display(),
                e
            ))
        })?;

        if settings.video.poll_interval_secs == 0 {
            warn!("pollIntervalSecs is 0; status queries will run back to back");
        }

        Ok(settings)
    }
}
