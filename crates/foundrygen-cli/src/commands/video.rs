//! `foundrygen video ...`

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use foundrygen_lib::core::generative::VideoGenerationParams;
use foundrygen_lib::core::settings::{DEFAULT_VIDEO_API_VERSION, DEFAULT_VIDEO_DEPLOYMENT};
use foundrygen_lib::{
    BlockingVideoClient, ReqwestTransport, ServiceEndpoint, Transport, VideoClient,
};

use super::{emit, run_async, RunContext};
use crate::auth::IdentityArgs;

#[derive(Subcommand, Debug)]
pub enum VideoCommand {
    /// Submit a job, wait for it and download the video
    Generate(GenerateArgs),
}

/// Location and key of the video deployment
#[derive(Args, Debug, Clone)]
pub struct VideoServiceArgs {
    /// Resource endpoint URL
    #[arg(long, env = "SORA_ENDPOINT_URL")]
    pub endpoint: String,

    /// Deployment name
    #[arg(long, env = "SORA_DEPLOYMENT_NAME", default_value = DEFAULT_VIDEO_DEPLOYMENT)]
    pub deployment: String,

    #[arg(long, default_value = DEFAULT_VIDEO_API_VERSION)]
    pub api_version: String,

    /// API key (otherwise a federated identity is required)
    #[arg(long, env = "AZURE_OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[command(flatten)]
    pub identity: IdentityArgs,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub service: VideoServiceArgs,

    /// Text prompt describing the video
    #[arg(long)]
    pub prompt: String,

    /// Number of variants to generate
    #[arg(long, default_value_t = 1)]
    pub variants: u32,

    /// Duration in seconds
    #[arg(long, default_value_t = 5)]
    pub seconds: u32,

    #[arg(long, default_value_t = 1080)]
    pub height: u32,

    #[arg(long, default_value_t = 1920)]
    pub width: u32,

    /// Give up waiting for the job after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Write the video here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl VideoCommand {
    pub fn execute(self, ctx: &RunContext) -> Result<()> {
        match self {
            VideoCommand::Generate(args) => generate(args, ctx),
        }
    }
}

fn build_client(service: &VideoServiceArgs, ctx: &RunContext) -> Result<VideoClient> {
    let endpoint = ServiceEndpoint::new(
        service.endpoint.clone(),
        service.deployment.clone(),
        service.api_version.clone(),
    )?;
    let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new()?);
    let credentials = service
        .identity
        .resolver(service.api_key.clone(), &transport)
        .context("No credentials for the video service")?;

    Ok(VideoClient::new(
        transport,
        Arc::new(credentials),
        endpoint,
        ctx.settings.video.clone(),
    ))
}

fn generate(args: GenerateArgs, ctx: &RunContext) -> Result<()> {
    let client = build_client(&args.service, ctx)?;
    let params = VideoGenerationParams::new(args.prompt)
        .with_variants(args.variants)
        .with_duration(args.seconds)
        .with_resolution(args.width, args.height);
    let timeout = args.timeout.map(Duration::from_secs);
    let output = args.output.as_deref();

    let result = if ctx.blocking {
        BlockingVideoClient::new(client)?.generate_video_to(&params, timeout, output)
    } else {
        run_async(client.generate_video_to(&params, timeout, output))?
    };

    emit(result.context("Video generation failed")?)
}
