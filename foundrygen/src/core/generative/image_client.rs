//! Image Generation Client
//!
//! Synchronous request/response image operations: one HTTP call each, no
//! retries. Every failure raises; there is no silent empty result.

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::image::{
    decode_image_response, edit_fields, encode_image, flux2_edit_payload, generation_payload,
    Flux2EditParams, ImageEditParams, ImageGenerationParams, ImageModel, FLUX2_API_VERSION,
    FLUX2_ROUTE_PATH,
};
use super::output::MediaOutput;
use crate::core::credentials::CredentialResolver;
use crate::core::settings::{ImageSettings, ServiceEndpoint};
use crate::core::transport::{HttpRequest, MultipartForm, RequestBody, Transport};
use crate::core::{excerpt, CoreError, CoreResult};

const PNG_MIME: &str = "image/png";

/// Client for one image deployment
#[derive(Clone)]
pub struct ImageClient {
    transport: Arc<dyn Transport>,
    credentials: Arc<CredentialResolver>,
    service: ServiceEndpoint,
    model: ImageModel,
    settings: ImageSettings,
}

impl std::fmt::Debug for ImageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageClient")
            .field("service", &self.service)
            .field("model", &self.model)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ImageClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<CredentialResolver>,
        service: ServiceEndpoint,
        model: ImageModel,
        settings: ImageSettings,
    ) -> Self {
        Self {
            transport,
            credentials,
            service,
            model,
            settings,
        }
    }

    pub fn model(&self) -> ImageModel {
        self.model
    }

    pub fn service(&self) -> &ServiceEndpoint {
        &self.service
    }

    fn uses_flux2_route(&self) -> bool {
        self.model.uses_flux2_route(self.service.deployment())
    }

    fn deployment_url(&self, verb: &str) -> String {
        self.service.url(&format!(
            "openai/deployments/{}/images/{}",
            self.service.deployment(),
            verb
        ))
    }

    /// FLUX.2 provider route
    pub fn flux2_url(&self) -> String {
        self.service
            .url_with_version(FLUX2_ROUTE_PATH, FLUX2_API_VERSION)
    }

    /// URL used by [`Self::generate_image`]
    pub fn generations_url(&self) -> String {
        if self.uses_flux2_route() {
            self.flux2_url()
        } else {
            self.deployment_url("generations")
        }
    }

    /// URL used by [`Self::edit_image`]
    pub fn edits_url(&self) -> String {
        self.deployment_url("edits")
    }

    /// Generates an image from a prompt.
    ///
    /// Writes it to `output` when given, otherwise returns the bytes.
    pub async fn generate_image(
        &self,
        params: &ImageGenerationParams,
        output: Option<&Path>,
    ) -> CoreResult<MediaOutput> {
        params.validate().map_err(CoreError::ValidationError)?;
        let payload = generation_payload(params, self.model, self.uses_flux2_route())?;

        info!(
            "Generating image with {} ({}): {}",
            self.model,
            self.service.deployment(),
            excerpt(&params.prompt, 50)
        );

        let headers = self.credentials.headers().await?;
        let request = HttpRequest::post(self.generations_url(), RequestBody::Json(payload))
            .with_headers(&headers)
            .with_timeout(self.settings.request_timeout());

        let response = self.transport.send(request).await?;
        let bytes = decode_image_response(&response)?;
        MediaOutput::deliver(bytes, output).await
    }

    /// Edits an image with a prompt, an optional mask and optional reference images.
    ///
    /// The mask is only honoured by GPT image models.
    pub async fn edit_image(
        &self,
        params: &ImageEditParams,
        output: Option<&Path>,
    ) -> CoreResult<MediaOutput> {
        params.validate().map_err(CoreError::ValidationError)?;

        let mut form = MultipartForm::new();
        for (name, value) in edit_fields(params, self.model) {
            form = form.text(name, value);
        }

        form = form.file("image[]", "image.png", PNG_MIME, params.image.load().await?);
        for (idx, image) in params.additional_images.iter().enumerate() {
            form = form.file(
                "image[]",
                format!("additional_image_{}.png", idx),
                PNG_MIME,
                image.load().await?,
            );
        }

        if let Some(mask) = &params.mask {
            if self.model == ImageModel::GptImage {
                form = form.file("mask", "mask.png", PNG_MIME, mask.load().await?);
            } else {
                warn!("Mask ignored: {} models do not accept masks", self.model);
            }
        }

        info!(
            "Editing image with {} ({}, {} reference images): {}",
            self.model,
            self.service.deployment(),
            params.additional_images.len(),
            excerpt(&params.prompt, 50)
        );

        let headers = self.credentials.headers().await?;
        let request = HttpRequest::post(self.edits_url(), RequestBody::Multipart(form))
            .with_headers(&headers)
            .with_timeout(self.settings.request_timeout());

        let response = self.transport.send(request).await?;
        let bytes = decode_image_response(&response)?;
        MediaOutput::deliver(bytes, output).await
    }

    /// Edits up to eight images at once with FLUX.2.
    ///
    /// Requires a FLUX client. Images travel base64-encoded in a JSON body and
    /// the credential is always sent as a bearer token.
    pub async fn flux2_edit_image(
        &self,
        params: &Flux2EditParams,
        output: Option<&Path>,
    ) -> CoreResult<MediaOutput> {
        if self.model != ImageModel::Flux {
            return Err(CoreError::ValidationError(format!(
                "FLUX.2 edits require a flux client (this client uses {})",
                self.model
            )));
        }
        params.validate().map_err(CoreError::ValidationError)?;

        let mut encoded = Vec::with_capacity(params.images.len());
        for image in &params.images {
            encoded.push(encode_image(&image.load().await?));
        }
        let payload = flux2_edit_payload(params, encoded)?;

        info!(
            "Editing {} images with FLUX.2: {}",
            params.images.len(),
            excerpt(&params.prompt, 50)
        );

        let credential = self.credentials.resolve().await?;
        let request = HttpRequest::post(self.flux2_url(), RequestBody::Json(payload))
            .with_headers(&[credential.bearer_header()])
            .with_timeout(self.settings.request_timeout());

        let response = self.transport.send(request).await?;
        let bytes = decode_image_response(&response)?;
        MediaOutput::deliver(bytes, output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::generative::image::ImageInput;
    use crate::core::transport::{FormPart, MockTransport};
    use serde_json::json;
    use tempfile::TempDir;

    fn client(transport: Arc<MockTransport>, model: ImageModel, deployment: &str) -> ImageClient {
        ImageClient::new(
            transport,
            Arc::new(CredentialResolver::from_api_key("img-key").unwrap()),
            ServiceEndpoint::image("https://img.example.com/", deployment).unwrap(),
            model,
            ImageSettings::default(),
        )
    }

    fn image_reply(bytes: &[u8]) -> serde_json::Value {
        json!({"created": 1, "data": [{"b64_json": encode_image(bytes)}]})
    }

    #[test]
    fn test_routing() {
        let transport = Arc::new(MockTransport::new());
        let gpt = client(transport.clone(), ImageModel::GptImage, "gpt-image-1");
        assert_eq!(
            gpt.generations_url(),
            "https://img.example.com/openai/deployments/gpt-image-1/images/generations?api-version=2025-04-01-preview"
        );
        assert_eq!(
            gpt.edits_url(),
            "https://img.example.com/openai/deployments/gpt-image-1/images/edits?api-version=2025-04-01-preview"
        );

        let flux2 = client(transport, ImageModel::Flux, "FLUX.2-pro");
        assert_eq!(
            flux2.generations_url(),
            "https://img.example.com/providers/blackforestlabs/v1/flux-2-pro?api-version=preview"
        );
    }

    #[tokio::test]
    async fn test_generate_image_returns_bytes() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, image_reply(b"PNGDATA"));

        let output = client(transport.clone(), ImageModel::GptImage, "gpt-image-1")
            .generate_image(&ImageGenerationParams::new("a lighthouse"), None)
            .await
            .unwrap();
        assert_eq!(output.as_bytes(), Some(&b"PNGDATA"[..]));

        let request = &transport.requests()[0];
        assert_eq!(request.header("api-key"), Some("img-key"));
        assert_eq!(request.timeout, None);
        match &request.body {
            RequestBody::Json(body) => assert_eq!(body["quality"], json!("auto")),
            other => panic!("Expected JSON body, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_image_saves_file() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, image_reply(b"PNGDATA"));
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("lighthouse.png");

        let output = client(transport, ImageModel::GptImage, "gpt-image-1")
            .generate_image(&ImageGenerationParams::new("a lighthouse"), Some(&path))
            .await
            .unwrap();
        assert_eq!(output, MediaOutput::Saved(path.clone()));
        assert_eq!(std::fs::read(&path).unwrap(), b"PNGDATA");
    }

    #[tokio::test]
    async fn test_generate_image_failure_raises() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(
            400,
            json!({"error": {"code": "content_policy_violation", "message": "Request rejected"}}),
        );

        let err = client(transport, ImageModel::GptImage, "gpt-image-1")
            .generate_image(&ImageGenerationParams::new("x"), None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(400));
        assert!(err.to_string().contains("content_policy_violation"));
    }

    #[tokio::test]
    async fn test_edit_image_builds_multipart() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, image_reply(b"EDITED"));

        let params = ImageEditParams::new(vec![1u8], "add a hat")
            .with_additional_image(vec![2u8])
            .with_additional_image(vec![3u8])
            .with_mask(vec![9u8]);

        let output = client(transport.clone(), ImageModel::GptImage, "gpt-image-1")
            .edit_image(&params, None)
            .await
            .unwrap();
        assert_eq!(output.as_bytes(), Some(&b"EDITED"[..]));

        let request = &transport.requests()[0];
        assert!(request.url.contains("/images/edits?"));
        let form = match &request.body {
            RequestBody::Multipart(form) => form,
            other => panic!("Expected multipart body, got {:?}", other),
        };
        assert_eq!(form.text_value("prompt"), Some("add a hat"));

        let names: Vec<&str> = form
            .files_named("image[]")
            .map(|part| match part {
                FormPart::File { filename, .. } => filename.as_str(),
                FormPart::Text { .. } => "",
            })
            .collect();
        assert_eq!(
            names,
            vec!["image.png", "additional_image_0.png", "additional_image_1.png"]
        );
        assert_eq!(form.files_named("mask").count(), 1);
    }

    #[tokio::test]
    async fn test_flux_edit_drops_mask_and_quality() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, image_reply(b"EDITED"));

        let params = ImageEditParams::new(vec![1u8], "add a hat").with_mask(vec![9u8]);
        client(transport.clone(), ImageModel::Flux, "FLUX.1-Kontext-pro")
            .edit_image(&params, None)
            .await
            .unwrap();

        match &transport.requests()[0].body {
            RequestBody::Multipart(form) => {
                assert_eq!(form.files_named("mask").count(), 0);
                assert_eq!(form.text_value("quality"), None);
                assert_eq!(form.text_value("model"), Some("flux.1-kontext-pro"));
            }
            other => panic!("Expected multipart body, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_edit_missing_file_is_io_error() {
        let transport = Arc::new(MockTransport::new());
        let params = ImageEditParams::new(
            ImageInput::Path("/definitely/not/here.png".into()),
            "add a hat",
        );

        let err = client(transport.clone(), ImageModel::GptImage, "gpt-image-1")
            .edit_image(&params, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::IoError(_)));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_flux2_edit_uses_bearer_and_base64() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, json!({"data": [{"image_base64": encode_image(b"MERGED")}]}));

        let params = Flux2EditParams::new(
            "merge",
            vec![ImageInput::Bytes(b"one".to_vec()), ImageInput::Bytes(b"two".to_vec())],
        );
        let output = client(transport.clone(), ImageModel::Flux, "FLUX.2-pro")
            .flux2_edit_image(&params, None)
            .await
            .unwrap();
        assert_eq!(output.as_bytes(), Some(&b"MERGED"[..]));

        let request = &transport.requests()[0];
        assert_eq!(request.header("Authorization"), Some("Bearer img-key"));
        assert_eq!(request.header("api-key"), None);
        assert!(request.url.contains("providers/blackforestlabs/v1/flux-2-pro"));
        match &request.body {
            RequestBody::Json(body) => {
                assert_eq!(body["input_image"], json!(encode_image(b"one")));
                assert_eq!(body["input_image_2"], json!(encode_image(b"two")));
            }
            other => panic!("Expected JSON body, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_flux2_edit_requires_flux_model() {
        let transport = Arc::new(MockTransport::new());
        let params = Flux2EditParams::new("merge", vec![ImageInput::Bytes(vec![1])]);
        let err = client(transport.clone(), ImageModel::GptImage, "gpt-image-1")
            .flux2_edit_image(&params, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
        assert_eq!(transport.request_count(), 0);
    }
}
