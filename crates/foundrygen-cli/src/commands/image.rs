//! `foundrygen image ...`

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use foundrygen_lib::core::generative::{
    Flux2EditParams, ImageEditParams, ImageGenerationParams, ImageInput, ImageModel,
};
use foundrygen_lib::core::settings::{DEFAULT_IMAGE_API_VERSION, DEFAULT_IMAGE_DEPLOYMENT};
use foundrygen_lib::{BlockingImageClient, ImageClient, ReqwestTransport, ServiceEndpoint, Transport};

use super::{emit, run_async, RunContext};
use crate::auth::IdentityArgs;

#[derive(Subcommand, Debug)]
pub enum ImageCommand {
    /// Generate an image from a prompt
    Generate(GenerateArgs),

    /// Edit an image with a prompt, optional mask and reference images
    Edit(EditArgs),

    /// Edit up to eight images at once with FLUX.2
    #[command(name = "flux2-edit")]
    Flux2Edit(Flux2EditArgs),
}

/// Location and key of the image deployment
#[derive(Args, Debug, Clone)]
pub struct ImageServiceArgs {
    /// Resource endpoint URL
    #[arg(long, env = "GPTIMAGE_ENDPOINT_URL")]
    pub endpoint: String,

    /// Deployment name
    #[arg(long, env = "GPTIMAGE_DEPLOYMENT_NAME", default_value = DEFAULT_IMAGE_DEPLOYMENT)]
    pub deployment: String,

    #[arg(long, default_value = DEFAULT_IMAGE_API_VERSION)]
    pub api_version: String,

    /// Model family behind the deployment (gpt-image or flux)
    #[arg(long, default_value = "gpt-image")]
    pub model: ImageModel,

    /// API key (otherwise a federated identity is required)
    #[arg(long, env = "GPTIMAGE1KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[command(flatten)]
    pub identity: IdentityArgs,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub service: ImageServiceArgs,

    #[arg(long)]
    pub prompt: String,

    /// WIDTHxHEIGHT
    #[arg(long, default_value = "1024x1024")]
    pub size: String,

    #[arg(long, default_value = "auto")]
    pub quality: String,

    /// Number of images to request
    #[arg(short, default_value_t = 1)]
    pub n: u32,

    #[arg(long)]
    pub output_format: Option<String>,

    /// Write the image here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    #[command(flatten)]
    pub service: ImageServiceArgs,

    /// Image to edit
    #[arg(long)]
    pub image: PathBuf,

    #[arg(long)]
    pub prompt: String,

    /// Mask whose transparent areas mark the region to edit
    #[arg(long)]
    pub mask: Option<PathBuf>,

    /// Additional reference image (repeatable)
    #[arg(long = "reference")]
    pub references: Vec<PathBuf>,

    #[arg(long, default_value = "1024x1024")]
    pub size: String,

    #[arg(long, default_value = "auto")]
    pub quality: String,

    #[arg(long)]
    pub output_format: Option<String>,

    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct Flux2EditArgs {
    #[command(flatten)]
    pub service: ImageServiceArgs,

    /// Input image (repeat for up to eight)
    #[arg(long = "image", required = true)]
    pub images: Vec<PathBuf>,

    #[arg(long)]
    pub prompt: String,

    #[arg(long, default_value = "1024x1024")]
    pub size: String,

    #[arg(long)]
    pub output_format: Option<String>,

    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ImageCommand {
    pub fn execute(self, ctx: &RunContext) -> Result<()> {
        match self {
            ImageCommand::Generate(args) => generate(args, ctx),
            ImageCommand::Edit(args) => edit(args, ctx),
            ImageCommand::Flux2Edit(args) => flux2_edit(args, ctx),
        }
    }
}

fn build_client(
    service: &ImageServiceArgs,
    model: ImageModel,
    ctx: &RunContext,
) -> Result<ImageClient> {
    let endpoint = ServiceEndpoint::new(
        service.endpoint.clone(),
        service.deployment.clone(),
        service.api_version.clone(),
    )?;
    let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new()?);
    let credentials = service
        .identity
        .resolver(service.api_key.clone(), &transport)
        .context("No credentials for the image service")?;

    Ok(ImageClient::new(
        transport,
        Arc::new(credentials),
        endpoint,
        model,
        ctx.settings.image.clone(),
    ))
}

fn generate(args: GenerateArgs, ctx: &RunContext) -> Result<()> {
    let client = build_client(&args.service, args.service.model, ctx)?;
    let mut params = ImageGenerationParams::new(args.prompt)
        .with_size(args.size)
        .with_quality(args.quality)
        .with_count(args.n);
    if let Some(format) = args.output_format {
        params = params.with_output_format(format);
    }
    let output = args.output.as_deref();

    let result = if ctx.blocking {
        BlockingImageClient::new(client)?.generate_image(&params, output)
    } else {
        run_async(client.generate_image(&params, output))?
    };
    emit(result.context("Image generation failed")?)
}

fn edit(args: EditArgs, ctx: &RunContext) -> Result<()> {
    let client = build_client(&args.service, args.service.model, ctx)?;
    let mut params = ImageEditParams::new(args.image, args.prompt)
        .with_size(args.size)
        .with_quality(args.quality);
    if let Some(mask) = args.mask {
        params = params.with_mask(mask);
    }
    for reference in args.references {
        params = params.with_additional_image(reference);
    }
    if let Some(format) = args.output_format {
        params = params.with_output_format(format);
    }
    let output = args.output.as_deref();

    let result = if ctx.blocking {
        BlockingImageClient::new(client)?.edit_image(&params, output)
    } else {
        run_async(client.edit_image(&params, output))?
    };
    emit(result.context("Image edit failed")?)
}

fn flux2_edit(args: Flux2EditArgs, ctx: &RunContext) -> Result<()> {
    let client = build_client(&args.service, ImageModel::Flux, ctx)?;
    let images = args.images.into_iter().map(ImageInput::Path).collect();
    let mut params = Flux2EditParams::new(args.prompt, images).with_size(args.size);
    if let Some(format) = args.output_format {
        params = params.with_output_format(format);
    }
    let output = args.output.as_deref();

    let result = if ctx.blocking {
        BlockingImageClient::new(client)?.flux2_edit_image(&params, output)
    } else {
        run_async(client.flux2_edit_image(&params, output))?
    };
    emit(result.context("FLUX.2 edit failed")?)
}
