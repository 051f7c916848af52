//! Result Fetcher
//!
//! Turns a succeeded job into the bytes of its first generation.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::video::Job;
use super::video_jobs::VideoJobApi;
use crate::core::credentials::CredentialResolver;
use crate::core::{CoreError, CoreResult};

/// Downloads the artifact of a succeeded job
#[derive(Debug, Clone)]
pub struct ResultFetcher {
    api: VideoJobApi,
    credentials: Arc<CredentialResolver>,
    download_timeout: Duration,
}

impl ResultFetcher {
    pub fn new(
        api: VideoJobApi,
        credentials: Arc<CredentialResolver>,
        download_timeout: Duration,
    ) -> Self {
        Self {
            api,
            credentials,
            download_timeout,
        }
    }

    /// Downloads `generations[0]` of `job` in one request.
    ///
    /// A succeeded job without generations is a protocol violation. The
    /// credential is resolved again since a bearer token may have rotated
    /// while the job was being polled.
    pub async fn fetch(&self, job: &Job) -> CoreResult<Vec<u8>> {
        let generation = job.first_generation().ok_or_else(|| {
            CoreError::Protocol(format!(
                "Job {} succeeded but reported no generations",
                job.id
            ))
        })?;

        let headers = self.credentials.headers().await?;
        let bytes = self
            .api
            .download(&generation.generation_id, &headers, self.download_timeout)
            .await?;

        info!(
            "Downloaded generation {} of job {} ({} bytes)",
            generation.generation_id,
            job.id,
            bytes.len()
        );
        Ok(bytes)
    }
}
