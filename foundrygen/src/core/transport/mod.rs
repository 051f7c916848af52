//! Request Transport
//!
//! One HTTP round trip per call, with failures classified up front:
//! - connection, DNS, TLS and timeout failures become [`CoreError::Network`]
//! - non-2xx statuses become [`CoreError::Remote`] carrying status and body
//!
//! Transports never retry. Retry policy belongs to the caller (the job poller).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::core::{CoreError, CoreResult};

mod mock;
mod reqwest_transport;

pub use mock::{MockReply, MockTransport};
pub use reqwest_transport::ReqwestTransport;

/// Header name/value pairs attached to a request
pub type HeaderSet = Vec<(String, String)>;

/// HTTP method subset used by the clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

// =============================================================================
// Request Body
// =============================================================================

/// One part of a multipart form
#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    /// Scalar field
    Text { name: String, value: String },
    /// File-like part
    File {
        name: String,
        filename: String,
        content_type: String,
        data: Vec<u8>,
    },
}

/// Multipart form body; the transport chooses the boundary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    pub parts: Vec<FormPart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a scalar field
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Adds a file part
    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        });
        self
    }

    /// Value of the first text field called `name`
    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|part| match part {
            FormPart::Text { name: n, value } if n == name => Some(value.as_str()),
            _ => None,
        })
    }

    /// File parts called `name`, in insertion order
    pub fn files_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FormPart> + 'a {
        self.parts
            .iter()
            .filter(move |part| matches!(part, FormPart::File { name: n, .. } if n == name))
    }
}

/// Request body encoding
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// `application/json`
    Json(serde_json::Value),
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
    /// `multipart/form-data`
    Multipart(MultipartForm),
}

// =============================================================================
// Request / Response
// =============================================================================

/// A single HTTP request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderSet,
    pub body: RequestBody,
    /// Per-request timeout; `None` means no client-side limit
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            timeout: None,
        }
    }

    pub fn post(url: impl Into<String>, body: RequestBody) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body,
            timeout: None,
        }
    }

    pub fn with_headers(mut self, headers: &[(String, String)]) -> Self {
        self.headers.extend(headers.iter().cloned());
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Value of the first header called `name` (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A completed HTTP response
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as (lossy) UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Passes 2xx responses through and turns everything else into [`CoreError::Remote`].
    pub fn error_for_status(self) -> CoreResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(CoreError::remote(self.status, &self.text()))
        }
    }

    /// Requires one exact status, e.g. `201` for job creation.
    pub fn expect_status(self, expected: u16) -> CoreResult<Self> {
        if self.status == expected {
            Ok(self)
        } else {
            Err(CoreError::remote(self.status, &self.text()))
        }
    }

    /// Parses the body as JSON; a malformed body is a protocol violation.
    pub fn json<T: DeserializeOwned>(&self) -> CoreResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| CoreError::Protocol(format!("Failed to parse response body: {}", e)))
    }
}

// =============================================================================
// Transport Trait
// =============================================================================

/// Issues HTTP requests for the clients.
///
/// Implementations return `Ok` only for 2xx responses.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request and returns the classified outcome
    async fn send(&self, request: HttpRequest) -> CoreResult<HttpResponse>;
}
