//! Generative Media Clients
//!
//! Image generation and editing (one request per call) and asynchronous video
//! generation (submit, poll, fetch).

pub mod blocking;
pub mod fetcher;
pub mod image;
pub mod image_client;
pub mod output;
pub mod poller;
pub mod video;
pub mod video_client;
pub mod video_jobs;

// Re-export main types
pub use blocking::{BlockingImageClient, BlockingVideoClient};
pub use fetcher::ResultFetcher;
pub use image::{
    parse_size, Flux2EditParams, ImageEditParams, ImageGenerationParams, ImageInput, ImageModel,
};
pub use image_client::ImageClient;
pub use output::MediaOutput;
pub use poller::{JobPoller, PollSession, PollState};
pub use video::{ArtifactDescriptor, Job, JobErrorDetail, JobStatus, VideoGenerationParams};
pub use video_client::VideoClient;
pub use video_jobs::VideoJobApi;
