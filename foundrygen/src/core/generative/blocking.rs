//! Blocking Facades
//!
//! Run the async clients to completion on the calling thread. Each facade owns
//! a current-thread runtime, so they must not be used from inside another
//! tokio runtime.

use std::path::Path;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

use super::image::{Flux2EditParams, ImageEditParams, ImageGenerationParams};
use super::image_client::ImageClient;
use super::output::MediaOutput;
use super::video::{Job, VideoGenerationParams};
use super::video_client::VideoClient;
use crate::core::{CoreError, CoreResult, JobId};

fn current_thread_runtime() -> CoreResult<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CoreError::Internal(format!("Failed to start runtime: {}", e)))
}

/// Blocking wrapper around [`VideoClient`]
#[derive(Debug)]
pub struct BlockingVideoClient {
    inner: VideoClient,
    runtime: Runtime,
}

impl BlockingVideoClient {
    pub fn new(inner: VideoClient) -> CoreResult<Self> {
        Ok(Self {
            inner,
            runtime: current_thread_runtime()?,
        })
    }

    pub fn inner(&self) -> &VideoClient {
        &self.inner
    }

    pub fn submit(&self, params: &VideoGenerationParams) -> CoreResult<JobId> {
        self.runtime.block_on(self.inner.submit(params))
    }

    pub fn wait_for_job(&self, job_id: &str, timeout: Option<Duration>) -> CoreResult<Job> {
        self.runtime
            .block_on(self.inner.wait_for_job(job_id, timeout))
    }

    pub fn generate_video(
        &self,
        params: &VideoGenerationParams,
        timeout: Option<Duration>,
    ) -> CoreResult<Vec<u8>> {
        self.runtime
            .block_on(self.inner.generate_video(params, timeout))
    }

    pub fn generate_video_to(
        &self,
        params: &VideoGenerationParams,
        timeout: Option<Duration>,
        output: Option<&Path>,
    ) -> CoreResult<MediaOutput> {
        self.runtime
            .block_on(self.inner.generate_video_to(params, timeout, output))
    }
}

/// Blocking wrapper around [`ImageClient`]
#[derive(Debug)]
pub struct BlockingImageClient {
    inner: ImageClient,
    runtime: Runtime,
}

impl BlockingImageClient {
    pub fn new(inner: ImageClient) -> CoreResult<Self> {
        Ok(Self {
            inner,
            runtime: current_thread_runtime()?,
        })
    }

    pub fn inner(&self) -> &ImageClient {
        &self.inner
    }

    pub fn generate_image(
        &self,
        params: &ImageGenerationParams,
        output: Option<&Path>,
    ) -> CoreResult<MediaOutput> {
        self.runtime
            .block_on(self.inner.generate_image(params, output))
    }

    pub fn edit_image(
        &self,
        params: &ImageEditParams,
        output: Option<&Path>,
    ) -> CoreResult<MediaOutput> {
        self.runtime.block_on(self.inner.edit_image(params, output))
    }

    pub fn flux2_edit_image(
        &self,
        params: &Flux2EditParams,
        output: Option<&Path>,
    ) -> CoreResult<MediaOutput> {
        self.runtime
            .block_on(self.inner.flux2_edit_image(params, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::credentials::CredentialResolver;
    use crate::core::generative::image::{encode_image, ImageModel};
    use crate::core::settings::{ImageSettings, ServiceEndpoint, VideoSettings};
    use crate::core::transport::MockTransport;
    use serde_json::json;
    use std::sync::Arc;

    fn credentials() -> Arc<CredentialResolver> {
        Arc::new(CredentialResolver::from_api_key("k").unwrap())
    }

    #[test]
    fn test_blocking_video_matches_async_workflow() {
        let transport = Arc::new(MockTransport::new());
        transport
            .push_json(201, json!({"id": "abc"}))
            .push_json(200, json!({"id": "abc", "status": "running"}))
            .push_json(
                200,
                json!({"id": "abc", "status": "succeeded", "generations": [{"id": "g1"}]}),
            )
            .push_bytes(200, b"\x00\x01VIDEO".to_vec());

        let settings = VideoSettings {
            poll_interval_secs: 0,
            ..VideoSettings::default()
        };
        let client = BlockingVideoClient::new(VideoClient::new(
            transport.clone(),
            credentials(),
            ServiceEndpoint::video("https://res.example.com", "sora").unwrap(),
            settings,
        ))
        .unwrap();

        let bytes = client
            .generate_video(&VideoGenerationParams::new("A red fox"), None)
            .unwrap();
        assert_eq!(bytes, b"\x00\x01VIDEO".to_vec());
        assert_eq!(transport.request_count(), 4);
    }

    #[test]
    fn test_blocking_image_generation() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, json!({"data": [{"b64_json": encode_image(b"PNG")}]}));

        let client = BlockingImageClient::new(ImageClient::new(
            transport,
            credentials(),
            ServiceEndpoint::image("https://img.example.com", "gpt-image-1").unwrap(),
            ImageModel::GptImage,
            ImageSettings::default(),
        ))
        .unwrap();

        let output = client
            .generate_image(&ImageGenerationParams::new("a lighthouse"), None)
            .unwrap();
        assert_eq!(output.as_bytes(), Some(&b"PNG"[..]));
    }

    #[test]
    fn test_blocking_propagates_errors() {
        let transport = Arc::new(MockTransport::new());
        transport.push_network_error("connection refused");

        let client = BlockingVideoClient::new(VideoClient::new(
            transport,
            credentials(),
            ServiceEndpoint::video("https://res.example.com", "sora").unwrap(),
            VideoSettings::default(),
        ))
        .unwrap();

        let err = client
            .submit(&VideoGenerationParams::new("A red fox"))
            .unwrap_err();
        assert!(matches!(err, CoreError::Network(_)));
    }
}
