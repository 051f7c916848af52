//! reqwest-backed Transport

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::{FormPart, HttpRequest, HttpResponse, Method, MultipartForm, RequestBody, Transport};
use crate::core::{CoreError, CoreResult};

/// [`Transport`] over a shared `reqwest::Client`.
///
/// The client has no global or connect timeout unless one is asked for;
/// each request carries its own.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a fresh connection pool
    pub fn new() -> CoreResult<Self> {
        Self::build(reqwest::Client::builder())
    }

    /// Like [`ReqwestTransport::new`], but gives up connecting after `timeout`
    pub fn with_connect_timeout(timeout: Duration) -> CoreResult<Self> {
        Self::build(reqwest::Client::builder().connect_timeout(timeout))
    }

    fn build(builder: reqwest::ClientBuilder) -> CoreResult<Self> {
        let client = builder
            .build()
            .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Wraps an existing client (custom proxies, TLS roots, ...)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build_form(form: MultipartForm) -> CoreResult<reqwest::multipart::Form> {
        let mut out = reqwest::multipart::Form::new();
        for part in form.parts {
            out = match part {
                FormPart::Text { name, value } => out.text(name, value),
                FormPart::File {
                    name,
                    filename,
                    content_type,
                    data,
                } => {
                    let part = reqwest::multipart::Part::bytes(data)
                        .file_name(filename)
                        .mime_str(&content_type)
                        .map_err(|e| {
                            CoreError::ValidationError(format!(
                                "Invalid content type '{}': {}",
                                content_type, e
                            ))
                        })?;
                    out.part(name, part)
                }
            };
        }
        Ok(out)
    }

    fn classify(error: reqwest::Error) -> CoreError {
        if error.is_timeout() {
            CoreError::Network(format!("Request timed out: {}", error))
        } else if error.is_connect() {
            CoreError::Network(format!("Connection failed: {}", error))
        } else if error.is_builder() {
            CoreError::ValidationError(format!("Invalid request: {}", error))
        } else {
            CoreError::Network(error.to_string())
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> CoreResult<HttpResponse> {
        debug!("{} {}", request.method, request.url);

        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(pairs) => builder.form(&pairs),
            RequestBody::Multipart(form) => builder.multipart(Self::build_form(form)?),
        };

        let response = builder.send().await.map_err(Self::classify)?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| CoreError::Network(format!("Failed to read response: {}", e)))?;

        HttpResponse::new(status, body.to_vec()).error_for_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_form_rejects_bad_mime() {
        let form = MultipartForm::new().file("image[]", "image.png", "not a mime", vec![1]);
        let err = ReqwestTransport::build_form(form).unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[test]
    fn test_build_form_accepts_png_parts() {
        let form = MultipartForm::new()
            .text("prompt", "a hat")
            .file("image[]", "image.png", "image/png", vec![1, 2, 3]);
        assert!(ReqwestTransport::build_form(form).is_ok());
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let transport = ReqwestTransport::new().unwrap();
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let request = HttpRequest::get(format!("http://127.0.0.1:{}/", port))
            .with_timeout(Some(Duration::from_secs(5)));
        let err = transport.send(request).await.unwrap_err();
        assert!(matches!(err, CoreError::Network(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_connect_timeout_is_opt_in() {
        let transport = ReqwestTransport::with_connect_timeout(Duration::from_secs(2)).unwrap();
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = transport
            .send(HttpRequest::get(format!("http://127.0.0.1:{}/", port)))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Network(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_request_without_timeout_waits_for_silent_server() {
        // Accepts connections but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());

        let transport = ReqwestTransport::new().unwrap();
        let pending =
            tokio::time::timeout(Duration::from_millis(300), transport.send(HttpRequest::get(url)))
                .await;
        assert!(pending.is_err(), "request should still be waiting");
        drop(listener);
    }
}
