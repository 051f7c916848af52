//! Scripted Transport for Testing
//!
//! Replies are consumed in FIFO order; every request is recorded so tests can
//! assert on what was sent and how many times.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{HttpRequest, HttpResponse, Transport};
use crate::core::{CoreError, CoreResult};

/// One scripted outcome
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Respond with a status and body (non-2xx becomes `CoreError::Remote`)
    Response(HttpResponse),
    /// Fail as if the connection dropped
    NetworkError(String),
    /// Never complete; only a caller-side timeout ends the request
    Hang,
}

/// Mock transport for testing
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply
    pub fn push(&self, reply: MockReply) -> &Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
        self
    }

    /// Queues a JSON response
    pub fn push_json(&self, status: u16, value: serde_json::Value) -> &Self {
        self.push(MockReply::Response(HttpResponse::new(
            status,
            value.to_string(),
        )))
    }

    /// Queues a raw byte response
    pub fn push_bytes(&self, status: u16, body: impl Into<Vec<u8>>) -> &Self {
        self.push(MockReply::Response(HttpResponse::new(status, body)))
    }

    /// Queues a network failure
    pub fn push_network_error(&self, message: impl Into<String>) -> &Self {
        self.push(MockReply::NetworkError(message.into()))
    }

    /// All requests received so far
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .map(|requests| requests.len())
            .unwrap_or_default()
    }

    /// Number of scripted replies not consumed yet
    pub fn remaining(&self) -> usize {
        self.replies
            .lock()
            .map(|replies| replies.len())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> CoreResult<HttpResponse> {
        let reply = {
            let mut requests = self
                .requests
                .lock()
                .map_err(|_| CoreError::Internal("Mock transport poisoned".to_string()))?;
            requests.push(request.clone());

            let mut replies = self
                .replies
                .lock()
                .map_err(|_| CoreError::Internal("Mock transport poisoned".to_string()))?;
            replies.pop_front()
        };

        match reply {
            Some(MockReply::Response(response)) => response.error_for_status(),
            Some(MockReply::NetworkError(message)) => Err(CoreError::Network(message)),
            Some(MockReply::Hang) => std::future::pending().await,
            None => Err(CoreError::Network(format!(
                "No scripted reply for {} {}",
                request.method, request.url
            ))),
        }
    }
}
