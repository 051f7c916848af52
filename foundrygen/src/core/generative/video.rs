//! Video Generation Types
//!
//! Data models for asynchronous video generation jobs: the request parameters,
//! the job resource as reported by the service, and its lifecycle states.

use serde::{Deserialize, Serialize};

use crate::core::{GenerationId, JobId};

// =============================================================================
// Job Status
// =============================================================================

/// Lifecycle state of a job as reported by the service.
///
/// `Succeeded`, `Failed`, `Cancelled` and `Expired` are terminal. Any status
/// the client does not recognise is kept verbatim in `Other` and treated as
/// still in progress.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Expired,
    Other(String),
}

impl JobStatus {
    /// Whether no further transition can happen
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled | JobStatus::Expired
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Expired => "expired",
            JobStatus::Other(s) => s,
        }
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "queued" => JobStatus::Queued,
            "running" => JobStatus::Running,
            "succeeded" => JobStatus::Succeeded,
            "failed" => JobStatus::Failed,
            "cancelled" => JobStatus::Cancelled,
            "expired" => JobStatus::Expired,
            _ => JobStatus::Other(value),
        }
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Job Resource
// =============================================================================

/// One produced video inside a succeeded job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Identifier used to build the content download URL
    #[serde(rename = "id")]
    pub generation_id: GenerationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_seconds: Option<u32>,
}

/// Failure detail of a failed job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A video generation job as reported by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Service-assigned id; filled from the request when a status body omits it
    #[serde(default)]
    pub id: JobId,
    pub status: JobStatus,
    /// Produced videos, populated once the job succeeded
    #[serde(default)]
    pub generations: Vec<ArtifactDescriptor>,
    /// Failure detail, populated when the job failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobErrorDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl Job {
    /// Human-readable failure message (`error.message`, then `failure_reason`)
    pub fn failure_message(&self) -> String {
        self.error
            .as_ref()
            .and_then(|e| e.message.clone())
            .or_else(|| self.failure_reason.clone())
            .unwrap_or_else(|| "Unknown error".to_string())
    }

    /// Service error code, when present
    pub fn failure_code(&self) -> Option<String> {
        self.error.as_ref().and_then(|e| e.code.clone())
    }

    /// The artifact this client consumes (the first one)
    pub fn first_generation(&self) -> Option<&ArtifactDescriptor> {
        self.generations.first()
    }
}

// =============================================================================
// Generation Parameters
// =============================================================================

/// Parameters for one video generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoGenerationParams {
    /// Text prompt describing the desired video
    pub prompt: String,
    /// Number of variants the service should produce
    pub variant_count: u32,
    /// Duration in seconds
    pub duration_seconds: u32,
    pub height: u32,
    pub width: u32,
}

impl VideoGenerationParams {
    /// Creates params with defaults (1 variant, 5 seconds, 1920x1080)
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            variant_count: 1,
            duration_seconds: 5,
            height: 1080,
            width: 1920,
        }
    }

    pub fn with_variants(mut self, variant_count: u32) -> Self {
        self.variant_count = variant_count;
        self
    }

    pub fn with_duration(mut self, duration_seconds: u32) -> Self {
        self.duration_seconds = duration_seconds;
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Checks positivity only; the service enforces its own upper bounds.
    pub fn validate(&self) -> Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("Prompt cannot be empty".to_string());
        }
        if self.variant_count == 0 {
            return Err("Variant count must be at least 1".to_string());
        }
        if self.duration_seconds == 0 {
            return Err("Duration must be greater than 0 seconds".to_string());
        }
        if self.height == 0 || self.width == 0 {
            return Err(format!(
                "Resolution must be positive (got {}x{})",
                self.width, self.height
            ));
        }
        Ok(())
    }
}

/// Job creation body.
///
/// Numeric fields travel as strings, matching what the service has been
/// observed to accept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct SubmitJobRequest {
    pub prompt: String,
    pub n_variants: String,
    pub n_seconds: String,
    pub height: String,
    pub width: String,
    pub model: String,
}

impl SubmitJobRequest {
    pub fn new(params: &VideoGenerationParams, model: &str) -> Self {
        Self {
            prompt: params.prompt.clone(),
            n_variants: params.variant_count.to_string(),
            n_seconds: params.duration_seconds.to_string(),
            height: params.height.to_string(),
            width: params.width.to_string(),
            model: model.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitJobResponse {
    #[serde(default)]
    pub id: Option<String>,
}
