//! Foundrygen Error Definitions
//!
//! Defines error types used throughout the project.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use super::generative::video::JobStatus;
use super::JobId;

/// Maximum number of body characters kept in a [`CoreError::Remote`].
pub const REMOTE_BODY_EXCERPT_CHARS: usize = 500;

/// Core error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Setup Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    #[error("Network error: {0}")]
    Network(String),

    #[error("Remote service returned HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    // =========================================================================
    // Job Errors
    // =========================================================================
    #[error("Job {job_id} failed: {message}")]
    JobFailed {
        job_id: JobId,
        message: String,
        code: Option<String>,
    },

    #[error("Job {job_id} ended in terminal state '{status}'")]
    JobTerminal { job_id: JobId, status: JobStatus },

    #[error("Job {job_id} polling timeout after {} seconds", .timeout.as_secs())]
    PollTimeout { job_id: JobId, timeout: Duration },

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl CoreError {
    /// Builds a [`CoreError::Remote`] from a non-success response.
    ///
    /// Structured `{"error": {"code", "message"}}` bodies are condensed to
    /// `message (code: ...)`; anything else is kept as a truncated excerpt.
    pub fn remote(status: u16, body: &str) -> Self {
        if let Ok(ApiErrorResponse {
            error: Some(detail),
        }) = serde_json::from_str::<ApiErrorResponse>(body)
        {
            if let Some(message) = detail.message {
                let body = match detail.code {
                    Some(code) => format!("{} (code: {})", message, code),
                    None => message,
                };
                return CoreError::Remote { status, body };
            }
        }

        let body: String = body.chars().take(REMOTE_BODY_EXCERPT_CHARS).collect();
        CoreError::Remote { status, body }
    }

    /// Whether this error reports a job the service has finished without success.
    ///
    /// These are the only errors the job poller propagates instead of retrying.
    pub fn is_terminal_job_state(&self) -> bool {
        matches!(
            self,
            CoreError::JobFailed { .. } | CoreError::JobTerminal { .. }
        )
    }

    /// HTTP status code, when the error came from a remote response
    pub fn status_code(&self) -> Option<u16> {
        match self {
            CoreError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}
