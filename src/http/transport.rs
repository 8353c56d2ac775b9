//! HTTP transport abstraction.
//!
//! Provider clients never talk to `reqwest` directly: every outbound request
//! goes through an injectable [`HttpTransport`]. The default
//! [`ReqwestTransport`] is used in production; tests substitute transports that
//! count calls or replay scripted bodies.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use futures_util::StreamExt;
use reqwest::header::HeaderMap;

use crate::error::LlmError;

/// Raw response body as it arrives from the network.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, LlmError>> + Send>>;

/// Request context used for logging and correlation.
#[derive(Debug, Clone)]
pub struct HttpRequestContext {
    pub request_id: String,
    pub provider_id: String,
    pub url: String,
    pub stream: bool,
}

/// Transport-level request data for JSON POST requests.
#[derive(Debug, Clone)]
pub struct HttpTransportRequest {
    pub ctx: HttpRequestContext,
    pub url: String,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

/// Transport-level response for one-shot requests.
#[derive(Debug, Clone)]
pub struct HttpTransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpTransportResponse {
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport-level response for streaming requests.
///
/// The body is consumed incrementally; dropping it releases the connection.
pub struct HttpStreamResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl HttpStreamResponse {
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

impl std::fmt::Debug for HttpStreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStreamResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Network seam for provider clients.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST a JSON body and wait for the whole response.
    async fn execute_json(
        &self,
        request: HttpTransportRequest,
    ) -> Result<HttpTransportResponse, LlmError>;

    /// POST a JSON body and expose the response body as a byte stream.
    async fn execute_stream(
        &self,
        request: HttpTransportRequest,
    ) -> Result<HttpStreamResponse, LlmError>;
}

/// Drain a byte stream into text (used for error bodies).
pub async fn read_body_text(mut body: ByteStream) -> String {
    let mut out = Vec::new();
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => out.extend_from_slice(&bytes),
            Err(e) => {
                tracing::debug!("error body truncated: {e}");
                break;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a default client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing client.
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Create a transport whose connections give up after `timeout` when
    /// establishing. Reading the body has no deadline.
    pub fn with_connect_timeout(timeout: Duration) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| LlmError::ConfigurationError(format!("Invalid HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn build(&self, request: &HttpTransportRequest) -> reqwest::RequestBuilder {
        self.client
            .post(&request.url)
            .headers(request.headers.clone())
            .json(&request.body)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute_json(
        &self,
        request: HttpTransportRequest,
    ) -> Result<HttpTransportResponse, LlmError> {
        tracing::debug!(
            request_id = %request.ctx.request_id,
            provider = %request.ctx.provider_id,
            url = %request.url,
            "sending completion request"
        );
        let response = self
            .build(&request)
            .send()
            .await
            .map_err(|e| LlmError::HttpError(format!("Failed to send request: {e}")))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| LlmError::HttpError(format!("Failed to read response body: {e}")))?;
        Ok(HttpTransportResponse {
            status,
            body: body.to_vec(),
        })
    }

    async fn execute_stream(
        &self,
        request: HttpTransportRequest,
    ) -> Result<HttpStreamResponse, LlmError> {
        tracing::debug!(
            request_id = %request.ctx.request_id,
            provider = %request.ctx.provider_id,
            url = %request.url,
            "opening completion stream"
        );
        let response = self
            .build(&request)
            .send()
            .await
            .map_err(|e| LlmError::HttpError(format!("Failed to send request: {e}")))?;
        let status = response.status().as_u16();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| LlmError::HttpError(format!("Stream error: {e}"))));
        Ok(HttpStreamResponse {
            status,
            body: Box::pin(body),
        })
    }
}
