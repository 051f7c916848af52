//! Video Generation Client
//!
//! End-to-end "submit, wait, fetch" workflow. One call owns one poll session;
//! nothing is shared between concurrent calls except the transport and the
//! credential resolver.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::fetcher::ResultFetcher;
use super::output::MediaOutput;
use super::poller::JobPoller;
use super::video::{Job, VideoGenerationParams};
use super::video_jobs::VideoJobApi;
use crate::core::credentials::CredentialResolver;
use crate::core::settings::{ServiceEndpoint, VideoSettings};
use crate::core::transport::Transport;
use crate::core::{CoreResult, JobId};

/// Client for asynchronous video generation
#[derive(Debug, Clone)]
pub struct VideoClient {
    api: VideoJobApi,
    poller: JobPoller,
    fetcher: ResultFetcher,
    credentials: Arc<CredentialResolver>,
    settings: VideoSettings,
}

impl VideoClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<CredentialResolver>,
        service: ServiceEndpoint,
        settings: VideoSettings,
    ) -> Self {
        let api = VideoJobApi::new(transport, service);
        let poller = JobPoller::new(api.clone(), settings.query_timeout());
        let fetcher = ResultFetcher::new(
            api.clone(),
            Arc::clone(&credentials),
            settings.download_timeout(),
        );

        Self {
            api,
            poller,
            fetcher,
            credentials,
            settings,
        }
    }

    pub fn service(&self) -> &ServiceEndpoint {
        self.api.service()
    }

    pub fn settings(&self) -> &VideoSettings {
        &self.settings
    }

    /// Creates a job without waiting for it
    pub async fn submit(&self, params: &VideoGenerationParams) -> CoreResult<JobId> {
        let headers = self.credentials.headers().await?;
        self.api
            .submit(params, &headers, self.settings.submit_timeout())
            .await
    }

    /// Waits for an existing job to succeed.
    ///
    /// `timeout` defaults to the configured job timeout.
    pub async fn wait_for_job(&self, job_id: &str, timeout: Option<Duration>) -> CoreResult<Job> {
        let headers = self.credentials.headers().await?;
        self.poller
            .poll(
                job_id,
                &headers,
                timeout.unwrap_or_else(|| self.settings.job_timeout()),
                self.settings.poll_interval(),
            )
            .await
    }

    /// Submits a job, polls it to completion and returns the video bytes.
    ///
    /// Credentials are resolved once for submission and polling. Nothing is
    /// retried except the status queries inside the poll loop, so the first
    /// failing stage decides the error.
    pub async fn generate_video(
        &self,
        params: &VideoGenerationParams,
        timeout: Option<Duration>,
    ) -> CoreResult<Vec<u8>> {
        let headers = self.credentials.headers().await?;

        let job_id = self
            .api
            .submit(params, &headers, self.settings.submit_timeout())
            .await?;

        let job = self
            .poller
            .poll(
                &job_id,
                &headers,
                timeout.unwrap_or_else(|| self.settings.job_timeout()),
                self.settings.poll_interval(),
            )
            .await?;

        let bytes = self.fetcher.fetch(&job).await?;
        info!("Video generation job {} completed", job_id);
        Ok(bytes)
    }

    /// Like [`Self::generate_video`], writing the video to `output` when given
    pub async fn generate_video_to(
        &self,
        params: &VideoGenerationParams,
        timeout: Option<Duration>,
        output: Option<&Path>,
    ) -> CoreResult<MediaOutput> {
        let bytes = self.generate_video(params, timeout).await?;
        MediaOutput::deliver(bytes, output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::{Method, MockTransport};
    use crate::core::CoreError;
    use serde_json::json;
    use tempfile::TempDir;

    fn client(transport: Arc<MockTransport>) -> VideoClient {
        VideoClient::new(
            transport,
            Arc::new(CredentialResolver::from_api_key("test-key").unwrap()),
            ServiceEndpoint::video("https://res.example.com", "sora").unwrap(),
            VideoSettings::default(),
        )
    }

    fn script_success(transport: &MockTransport) {
        transport
            .push_json(201, json!({"id": "abc", "status": "queued"}))
            .push_json(200, json!({"id": "abc", "status": "running"}))
            .push_json(200, json!({"id": "abc", "status": "running"}))
            .push_json(
                200,
                json!({"id": "abc", "status": "succeeded", "generations": [{"id": "g1"}]}),
            )
            .push_bytes(200, b"\x00\x01VIDEO".to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_video_returns_downloaded_bytes() {
        let transport = Arc::new(MockTransport::new());
        script_success(&transport);

        let bytes = client(transport.clone())
            .generate_video(&VideoGenerationParams::new("A red fox"), None)
            .await
            .unwrap();
        assert_eq!(bytes, b"\x00\x01VIDEO".to_vec());

        let requests = transport.requests();
        assert_eq!(requests.len(), 5);
        assert_eq!(requests[0].method, Method::Post);
        assert!(requests[0].url.ends_with("/jobs?api-version=preview"));
        for poll in &requests[1..4] {
            assert_eq!(poll.method, Method::Get);
            assert!(poll.url.contains("/jobs/abc?"));
        }
        assert!(requests[4].url.contains("/generations/g1/content/video?"));
        assert!(requests
            .iter()
            .all(|r| r.header("api-key") == Some("test-key")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_job_stops_workflow() {
        let transport = Arc::new(MockTransport::new());
        transport
            .push_json(201, json!({"id": "abc"}))
            .push_json(
                200,
                json!({"id": "abc", "status": "failed", "error": {"message": "quota exceeded"}}),
            );

        let err = client(transport.clone())
            .generate_video(&VideoGenerationParams::new("A red fox"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::JobFailed { .. }));
        assert!(err.to_string().contains("quota exceeded"));
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_override() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(201, json!({"id": "abc"}));
        for _ in 0..5 {
            transport.push_json(200, json!({"id": "abc", "status": "queued"}));
        }

        let err = client(transport.clone())
            .generate_video(
                &VideoGenerationParams::new("A red fox"),
                Some(Duration::from_secs(30)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::PollTimeout { .. }));
        assert_eq!(transport.request_count(), 4);
    }

    #[tokio::test]
    async fn test_submit_error_is_not_retried() {
        let transport = Arc::new(MockTransport::new());
        transport
            .push_json(
                429,
                json!({"error": {"code": "TooManyRequests", "message": "Rate limit"}}),
            )
            .push_json(201, json!({"id": "abc"}));

        let err = client(transport.clone())
            .generate_video(&VideoGenerationParams::new("A red fox"), None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(429));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_video_to_file() {
        let transport = Arc::new(MockTransport::new());
        script_success(&transport);
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fox.mp4");

        let output = client(transport)
            .generate_video_to(&VideoGenerationParams::new("A red fox"), None, Some(&path))
            .await
            .unwrap();

        assert_eq!(output.path(), Some(path.as_path()));
        assert_eq!(std::fs::read(&path).unwrap(), b"\x00\x01VIDEO");
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_then_wait_separately() {
        let transport = Arc::new(MockTransport::new());
        transport
            .push_json(201, json!({"id": "abc"}))
            .push_json(200, json!({"id": "abc", "status": "expired"}));

        let client = client(transport);
        let job_id = client
            .submit(&VideoGenerationParams::new("A red fox"))
            .await
            .unwrap();
        assert_eq!(job_id, "abc");

        let err = client.wait_for_job(&job_id, None).await.unwrap_err();
        assert!(matches!(err, CoreError::JobTerminal { .. }));
        assert!(err.is_terminal_job_state());
    }
}
