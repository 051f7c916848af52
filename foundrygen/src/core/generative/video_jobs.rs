//! Video Job Endpoints
//!
//! Job creation, single status query and content URL construction for the
//! video generation service. Each call is exactly one HTTP request.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::video::{Job, SubmitJobRequest, SubmitJobResponse, VideoGenerationParams};
use crate::core::settings::ServiceEndpoint;
use crate::core::transport::{HeaderSet, HttpRequest, RequestBody, Transport};
use crate::core::{excerpt, CoreError, CoreResult, GenerationId, JobId};

const JOBS_PATH: &str = "openai/v1/video/generations/jobs";
const GENERATIONS_PATH: &str = "openai/v1/video/generations";

/// Raw job endpoints of one video deployment
#[derive(Clone)]
pub struct VideoJobApi {
    transport: Arc<dyn Transport>,
    service: ServiceEndpoint,
}

impl std::fmt::Debug for VideoJobApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoJobApi")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

impl VideoJobApi {
    pub fn new(transport: Arc<dyn Transport>, service: ServiceEndpoint) -> Self {
        Self { transport, service }
    }

    pub fn service(&self) -> &ServiceEndpoint {
        &self.service
    }

    /// `POST .../jobs`
    pub fn jobs_url(&self) -> String {
        self.service.url(JOBS_PATH)
    }

    /// `GET .../jobs/{job_id}`
    pub fn job_url(&self, job_id: &str) -> String {
        self.service.url(&format!("{}/{}", JOBS_PATH, job_id))
    }

    /// `GET .../{generation_id}/content/video`
    pub fn content_url(&self, generation_id: &str) -> String {
        self.service
            .url(&format!("{}/{}/content/video", GENERATIONS_PATH, generation_id))
    }

    /// Creates a job and returns its id.
    ///
    /// Not idempotent: every call creates a distinct job. The service must
    /// answer 201 with an `id`; any other status is a remote error and a
    /// missing `id` is a protocol error.
    pub async fn submit(
        &self,
        params: &VideoGenerationParams,
        headers: &HeaderSet,
        timeout: Duration,
    ) -> CoreResult<JobId> {
        params.validate().map_err(CoreError::ValidationError)?;

        let body = serde_json::to_value(SubmitJobRequest::new(params, self.service.deployment()))
            .map_err(|e| CoreError::Internal(format!("Serialization failed: {}", e)))?;

        info!(
            "Creating video generation job with prompt: {}",
            excerpt(&params.prompt, 50)
        );

        let request = HttpRequest::post(self.jobs_url(), RequestBody::Json(body))
            .with_headers(headers)
            .with_timeout(Some(timeout));

        let response = self.transport.send(request).await?.expect_status(201)?;
        let parsed: SubmitJobResponse = response.json()?;

        let job_id = parsed
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                CoreError::Protocol("No job ID returned from video generation API".to_string())
            })?;

        info!("Video generation job created with ID: {}", job_id);
        Ok(job_id)
    }

    /// Reads the current state of a job (one query, no retry)
    pub async fn get_job(
        &self,
        job_id: &str,
        headers: &HeaderSet,
        timeout: Duration,
    ) -> CoreResult<Job> {
        let request = HttpRequest::get(self.job_url(job_id))
            .with_headers(headers)
            .with_timeout(Some(timeout));

        let response = self.transport.send(request).await?;
        let raw: Value = response.json()?;
        let mut job: Job = serde_json::from_value(raw)
            .map_err(|e| CoreError::Protocol(format!("Unexpected job status body: {}", e)))?;

        if job.id.is_empty() {
            job.id = job_id.to_string();
        }
        Ok(job)
    }

    /// Downloads the content of one generation
    pub async fn download(
        &self,
        generation_id: &GenerationId,
        headers: &HeaderSet,
        timeout: Duration,
    ) -> CoreResult<Vec<u8>> {
        let request = HttpRequest::get(self.content_url(generation_id))
            .with_headers(headers)
            .with_timeout(Some(timeout));

        let response = self.transport.send(request).await?;
        Ok(response.body)
    }
}
