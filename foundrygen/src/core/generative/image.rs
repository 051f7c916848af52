//! Image Generation Types
//!
//! Parameters for image generation and editing, model routing rules and the
//! response schema shared by every image route.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::transport::HttpResponse;
use crate::core::{CoreError, CoreResult};

/// Deployment name served by the FLUX.2 provider route
pub const FLUX2_PRO_DEPLOYMENT: &str = "FLUX.2-pro";

/// Provider route for FLUX.2 generation and multi-image edits
pub const FLUX2_ROUTE_PATH: &str = "providers/blackforestlabs/v1/flux-2-pro";

/// API version accepted by the FLUX.2 provider route
pub const FLUX2_API_VERSION: &str = "preview";

/// Maximum number of input images for a FLUX.2 edit
pub const MAX_FLUX2_INPUT_IMAGES: usize = 8;

pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";
pub const DEFAULT_IMAGE_QUALITY: &str = "auto";

/// Output format sent to FLUX models when none is configured
pub const DEFAULT_FLUX_OUTPUT_FORMAT: &str = "png";

const FLUX2_GENERATION_MODEL: &str = "flux.2-pro";
const FLUX2_EDIT_MODEL: &str = "FLUX.2-pro";
const FLUX_KONTEXT_EDIT_MODEL: &str = "flux.1-kontext-pro";

// =============================================================================
// Model
// =============================================================================

/// Image model family behind a deployment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageModel {
    #[default]
    GptImage,
    Flux,
}

impl ImageModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageModel::GptImage => "gpt-image",
            ImageModel::Flux => "flux",
        }
    }

    /// Whether `deployment` of this model is served by the FLUX.2 provider route
    pub fn uses_flux2_route(&self, deployment: &str) -> bool {
        *self == ImageModel::Flux && deployment == FLUX2_PRO_DEPLOYMENT
    }
}

impl std::fmt::Display for ImageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImageModel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gpt-image" | "gpt_image" => Ok(ImageModel::GptImage),
            "flux" => Ok(ImageModel::Flux),
            other => Err(CoreError::ValidationError(format!(
                "Unknown image model '{}' (expected gpt-image or flux)",
                other
            ))),
        }
    }
}

/// Parses a `WIDTHxHEIGHT` size string
pub fn parse_size(size: &str) -> CoreResult<(u32, u32)> {
    let invalid = || {
        CoreError::ValidationError(format!(
            "Invalid image size '{}' (expected WIDTHxHEIGHT)",
            size
        ))
    };

    let (width, height) = size.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
    let width: u32 = width.trim().parse().map_err(|_| invalid())?;
    let height: u32 = height.trim().parse().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}

// =============================================================================
// Inputs
// =============================================================================

/// An input image, read from disk or supplied in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl ImageInput {
    /// Returns the raw image bytes
    pub async fn load(&self) -> CoreResult<Vec<u8>> {
        match self {
            ImageInput::Path(path) => tokio::fs::read(path).await.map_err(|e| {
                CoreError::IoError(std::io::Error::new(
                    e.kind(),
                    format!("Failed to read image {}: {}", path.display(), e),
                ))
            }),
            ImageInput::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

impl From<PathBuf> for ImageInput {
    fn from(path: PathBuf) -> Self {
        ImageInput::Path(path)
    }
}

impl From<&std::path::Path> for ImageInput {
    fn from(path: &std::path::Path) -> Self {
        ImageInput::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for ImageInput {
    fn from(bytes: Vec<u8>) -> Self {
        ImageInput::Bytes(bytes)
    }
}

// =============================================================================
// Parameters
// =============================================================================

/// Parameters for text-to-image generation
#[derive(Debug, Clone, PartialEq)]
pub struct ImageGenerationParams {
    pub prompt: String,
    /// `WIDTHxHEIGHT`
    pub size: String,
    /// Ignored by FLUX models
    pub quality: String,
    /// Number of images requested
    pub n: u32,
    pub output_format: Option<String>,
}

impl ImageGenerationParams {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            size: DEFAULT_IMAGE_SIZE.to_string(),
            quality: DEFAULT_IMAGE_QUALITY.to_string(),
            n: 1,
            output_format: None,
        }
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = size.into();
        self
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = quality.into();
        self
    }

    pub fn with_count(mut self, n: u32) -> Self {
        self.n = n;
        self
    }

    pub fn with_output_format(mut self, output_format: impl Into<String>) -> Self {
        self.output_format = Some(output_format.into());
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("Prompt cannot be empty".to_string());
        }
        if self.n == 0 {
            return Err("Image count must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Parameters for editing an image with a prompt
#[derive(Debug, Clone, PartialEq)]
pub struct ImageEditParams {
    pub prompt: String,
    pub image: ImageInput,
    /// Transparent areas mark the region to edit (GPT image models only)
    pub mask: Option<ImageInput>,
    /// Extra reference images sent after the main one
    pub additional_images: Vec<ImageInput>,
    pub size: String,
    pub quality: String,
    pub n: u32,
    pub output_format: Option<String>,
}

impl ImageEditParams {
    pub fn new(image: impl Into<ImageInput>, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: image.into(),
            mask: None,
            additional_images: Vec::new(),
            size: DEFAULT_IMAGE_SIZE.to_string(),
            quality: DEFAULT_IMAGE_QUALITY.to_string(),
            n: 1,
            output_format: None,
        }
    }

    pub fn with_mask(mut self, mask: impl Into<ImageInput>) -> Self {
        self.mask = Some(mask.into());
        self
    }

    pub fn with_additional_image(mut self, image: impl Into<ImageInput>) -> Self {
        self.additional_images.push(image.into());
        self
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = size.into();
        self
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = quality.into();
        self
    }

    pub fn with_output_format(mut self, output_format: impl Into<String>) -> Self {
        self.output_format = Some(output_format.into());
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("Prompt cannot be empty".to_string());
        }
        if self.n == 0 {
            return Err("Image count must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Parameters for a FLUX.2 multi-image edit
#[derive(Debug, Clone, PartialEq)]
pub struct Flux2EditParams {
    pub prompt: String,
    /// 1 to [`MAX_FLUX2_INPUT_IMAGES`] images
    pub images: Vec<ImageInput>,
    pub size: String,
    pub output_format: Option<String>,
}

impl Flux2EditParams {
    pub fn new(prompt: impl Into<String>, images: Vec<ImageInput>) -> Self {
        Self {
            prompt: prompt.into(),
            images,
            size: DEFAULT_IMAGE_SIZE.to_string(),
            output_format: None,
        }
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = size.into();
        self
    }

    pub fn with_output_format(mut self, output_format: impl Into<String>) -> Self {
        self.output_format = Some(output_format.into());
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("Prompt cannot be empty".to_string());
        }
        if self.images.is_empty() {
            return Err("At least one image is required".to_string());
        }
        if self.images.len() > MAX_FLUX2_INPUT_IMAGES {
            return Err(format!(
                "A maximum of {} images is supported (got {})",
                MAX_FLUX2_INPUT_IMAGES,
                self.images.len()
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Request Payloads
// =============================================================================

fn flux_output_format(output_format: &Option<String>) -> String {
    output_format
        .clone()
        .unwrap_or_else(|| DEFAULT_FLUX_OUTPUT_FORMAT.to_string())
}

/// JSON body for a generation request
pub(crate) fn generation_payload(
    params: &ImageGenerationParams,
    model: ImageModel,
    flux2_route: bool,
) -> CoreResult<serde_json::Value> {
    let mut payload = serde_json::json!({
        "prompt": params.prompt,
        "n": params.n,
    });

    match model {
        ImageModel::GptImage => {
            payload["size"] = params.size.clone().into();
            payload["quality"] = params.quality.clone().into();
            if let Some(format) = &params.output_format {
                payload["output_format"] = format.clone().into();
            }
        }
        ImageModel::Flux => {
            let (width, height) = parse_size(&params.size)?;
            payload["width"] = width.into();
            payload["height"] = height.into();
            payload["output_format"] = flux_output_format(&params.output_format).into();
            if flux2_route {
                payload["model"] = FLUX2_GENERATION_MODEL.into();
            }
        }
    }

    Ok(payload)
}

/// Scalar fields of an edit form, in the order they are sent
pub(crate) fn edit_fields(params: &ImageEditParams, model: ImageModel) -> Vec<(String, String)> {
    let mut fields = vec![
        ("prompt".to_string(), params.prompt.clone()),
        ("size".to_string(), params.size.clone()),
    ];

    match model {
        ImageModel::GptImage => {
            fields.push(("quality".to_string(), params.quality.clone()));
            fields.push(("n".to_string(), params.n.to_string()));
            if let Some(format) = &params.output_format {
                fields.push(("output_format".to_string(), format.clone()));
            }
        }
        ImageModel::Flux => {
            fields.push(("n".to_string(), params.n.to_string()));
            fields.push((
                "output_format".to_string(),
                flux_output_format(&params.output_format),
            ));
            fields.push(("model".to_string(), FLUX_KONTEXT_EDIT_MODEL.to_string()));
        }
    }

    fields
}

/// JSON body for a FLUX.2 edit; `encoded_images` are already base64
pub(crate) fn flux2_edit_payload(
    params: &Flux2EditParams,
    encoded_images: Vec<String>,
) -> CoreResult<serde_json::Value> {
    let (width, height) = parse_size(&params.size)?;
    let mut payload = serde_json::json!({
        "model": FLUX2_EDIT_MODEL,
        "prompt": params.prompt,
        "output_format": flux_output_format(&params.output_format),
        "width": width,
        "height": height,
    });

    for (idx, encoded) in encoded_images.into_iter().enumerate() {
        let key = if idx == 0 {
            "input_image".to_string()
        } else {
            format!("input_image_{}", idx + 1)
        };
        payload[key] = encoded.into();
    }

    Ok(payload)
}

pub(crate) fn encode_image(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

// =============================================================================
// Response Schema
// =============================================================================

/// One element of `data`. The encoded image is read from `b64_json`, then
/// `base64`, then `image_base64`.
#[derive(Debug, Default, Deserialize)]
struct ImageDatum {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    base64: Option<String>,
    #[serde(default)]
    image_base64: Option<String>,
}

impl ImageDatum {
    fn encoded(&self) -> Option<&str> {
        [&self.b64_json, &self.base64, &self.image_base64]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|value| !value.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

/// Decodes the first image of an image response
pub(crate) fn decode_image_response(response: &HttpResponse) -> CoreResult<Vec<u8>> {
    let parsed: ImageResponse = response.json()?;

    let first = parsed
        .data
        .first()
        .ok_or_else(|| CoreError::Protocol("No image data returned from service".to_string()))?;

    let encoded = first.encoded().ok_or_else(|| {
        CoreError::Protocol(
            "Image response has none of b64_json, base64 or image_base64".to_string(),
        )
    })?;

    STANDARD
        .decode(encoded.trim())
        .map_err(|e| CoreError::Protocol(format!("Invalid base64 image data: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: serde_json::Value) -> HttpResponse {
        HttpResponse::new(200, value.to_string())
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024x768").unwrap(), (1024, 768));
        assert_eq!(parse_size(" 512X512 ").unwrap(), (512, 512));
        assert!(matches!(
            parse_size("auto").unwrap_err(),
            CoreError::ValidationError(_)
        ));
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("10x").is_err());
    }

    #[test]
    fn test_model_parsing_and_route() {
        assert_eq!("flux".parse::<ImageModel>().unwrap(), ImageModel::Flux);
        assert_eq!(
            "GPT-IMAGE".parse::<ImageModel>().unwrap(),
            ImageModel::GptImage
        );
        assert!("dall-e".parse::<ImageModel>().is_err());

        assert!(ImageModel::Flux.uses_flux2_route("FLUX.2-pro"));
        assert!(!ImageModel::Flux.uses_flux2_route("FLUX.1-Kontext-pro"));
        assert!(!ImageModel::GptImage.uses_flux2_route("FLUX.2-pro"));
    }

    #[test]
    fn test_gpt_generation_payload() {
        let params = ImageGenerationParams::new("a lighthouse")
            .with_size("1536x1024")
            .with_quality("high")
            .with_count(2);
        let payload = generation_payload(&params, ImageModel::GptImage, false).unwrap();
        assert_eq!(
            payload,
            json!({"prompt": "a lighthouse", "size": "1536x1024", "quality": "high", "n": 2})
        );
    }

    #[test]
    fn test_flux_generation_payload() {
        let params = ImageGenerationParams::new("a lighthouse")
            .with_size("1024x768")
            .with_output_format("jpeg");

        let payload = generation_payload(&params, ImageModel::Flux, false).unwrap();
        assert_eq!(payload["width"], json!(1024));
        assert_eq!(payload["height"], json!(768));
        assert_eq!(payload["output_format"], json!("jpeg"));
        assert!(payload.get("quality").is_none());
        assert!(payload.get("size").is_none());
        assert!(payload.get("model").is_none());

        let payload = generation_payload(&params, ImageModel::Flux, true).unwrap();
        assert_eq!(payload["model"], json!("flux.2-pro"));
    }

    #[test]
    fn test_flux_generation_requires_explicit_size() {
        let params = ImageGenerationParams::new("x").with_size("auto");
        assert!(generation_payload(&params, ImageModel::Flux, false).is_err());
        assert!(generation_payload(&params, ImageModel::GptImage, false).is_ok());
    }

    #[test]
    fn test_edit_fields_per_model() {
        let params = ImageEditParams::new(vec![1u8], "add a hat").with_quality("low");

        let gpt = edit_fields(&params, ImageModel::GptImage);
        assert!(gpt.contains(&("quality".to_string(), "low".to_string())));
        assert!(!gpt.iter().any(|(k, _)| k == "model"));

        let flux = edit_fields(&params, ImageModel::Flux);
        assert!(!flux.iter().any(|(k, _)| k == "quality"));
        assert!(flux.contains(&("model".to_string(), "flux.1-kontext-pro".to_string())));
        assert!(flux.contains(&("output_format".to_string(), "png".to_string())));
    }

    #[test]
    fn test_flux2_payload_numbers_inputs() {
        let params = Flux2EditParams::new("merge", vec![]).with_size("800x600");
        let payload = flux2_edit_payload(
            &params,
            vec!["AAA".to_string(), "BBB".to_string(), "CCC".to_string()],
        )
        .unwrap();

        assert_eq!(payload["model"], json!("FLUX.2-pro"));
        assert_eq!(payload["input_image"], json!("AAA"));
        assert_eq!(payload["input_image_2"], json!("BBB"));
        assert_eq!(payload["input_image_3"], json!("CCC"));
        assert!(payload.get("input_image_1").is_none());
        assert_eq!((payload["width"].clone(), payload["height"].clone()), (json!(800), json!(600)));
    }

    #[test]
    fn test_flux2_params_image_count() {
        assert!(Flux2EditParams::new("x", vec![]).validate().is_err());
        let nine = vec![ImageInput::Bytes(vec![0]); 9];
        assert!(Flux2EditParams::new("x", nine)
            .validate()
            .unwrap_err()
            .contains("maximum of 8"));
        let eight = vec![ImageInput::Bytes(vec![0]); 8];
        assert!(Flux2EditParams::new("x", eight).validate().is_ok());
    }

    #[test]
    fn test_decode_fallback_order() {
        let png = encode_image(b"PNG");
        let other = encode_image(b"OTHER");

        let bytes = decode_image_response(&response(json!({"data": [{"b64_json": png}]}))).unwrap();
        assert_eq!(bytes, b"PNG");

        let bytes = decode_image_response(&response(
            json!({"data": [{"base64": png, "image_base64": other}]}),
        ))
        .unwrap();
        assert_eq!(bytes, b"PNG");

        let bytes =
            decode_image_response(&response(json!({"data": [{"image_base64": other}]}))).unwrap();
        assert_eq!(bytes, b"OTHER");
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        for body in [
            json!({"data": []}),
            json!({"created": 1}),
            json!({"data": [{"url": "https://x"}]}),
            json!({"data": [{"b64_json": "%%%not base64"}]}),
        ] {
            let err = decode_image_response(&response(body)).unwrap_err();
            assert!(matches!(err, CoreError::Protocol(_)), "{:?}", err);
        }
    }
}
