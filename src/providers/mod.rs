//! Provider clients
//!
//! One [`ProviderClient`] implementation per backend family:
//!
//! - [`openai::OpenAiClient`]: OpenAI, DeepSeek, LM Studio and any other
//!   server speaking the OpenAI chat-completions wire format
//! - [`anthropic::AnthropicClient`]: Anthropic Messages API
//! - [`ollama::OllamaClient`]: Ollama generate API
//!
//! Clients hold no per-request state. `configure` validates a
//! [`ProviderConfig`] and returns an immutable [`ClientSettings`] value that is
//! passed to every call, so one cached client can serve concurrent requests
//! with different credentials.

pub mod anthropic;
pub mod common;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use crate::error::LlmError;
use crate::http::{ByteStream, HttpTransport};
use crate::streaming::{ChunkStream, StreamDecoder, decode_stream};
use crate::types::{
    CompletionOptions, CompletionRequest, CompletionResult, ProviderConfig, ProviderKind,
};

/// Validated, immutable settings for one backend.
#[derive(Clone)]
pub struct ClientSettings {
    pub kind: ProviderKind,
    /// Base URL without a trailing slash
    pub base_url: String,
    pub credential: Option<SecretString>,
    pub model: String,
    pub defaults: CompletionOptions,
}

impl ClientSettings {
    /// Join a path onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Credential text, if one is configured.
    pub fn credential(&self) -> Option<&str> {
        self.credential
            .as_ref()
            .map(|c| c.expose_secret())
            .filter(|c| !c.is_empty())
    }

    /// Request options overlaid on the configured defaults.
    pub fn effective_options(&self, request: &CompletionRequest) -> CompletionOptions {
        request.options.merged_over(&self.defaults)
    }
}

impl std::fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSettings")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("has_credential", &self.credential().is_some())
            .field("defaults", &self.defaults)
            .finish()
    }
}

/// Uniform operation contract implemented once per backend family.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Backend kind served by this instance.
    fn kind(&self) -> ProviderKind;

    /// Format-only credential check. No network call.
    fn validate_credential(&self, text: &str) -> bool {
        common::is_valid_credential(text)
    }

    /// Format-only endpoint check. No network call.
    fn validate_endpoint(&self, text: &str) -> bool {
        common::is_valid_endpoint(text)
    }

    /// Validate a configuration record and produce request settings.
    fn configure(&self, config: &ProviderConfig) -> Result<ClientSettings, LlmError> {
        common::resolve_settings(
            self.kind(),
            config,
            |c| self.validate_credential(c),
            |e| self.validate_endpoint(e),
        )
    }

    /// Non-streaming completion.
    async fn complete(
        &self,
        settings: &ClientSettings,
        request: &CompletionRequest,
    ) -> Result<CompletionResult, LlmError>;

    /// Send a streaming request and return the raw response body.
    ///
    /// Non-success statuses are reported here, before any byte is decoded.
    async fn open_stream(
        &self,
        settings: &ClientSettings,
        request: &CompletionRequest,
    ) -> Result<ByteStream, LlmError>;

    /// Fresh decoder for this backend's wire format.
    fn decoder(&self) -> Box<dyn StreamDecoder>;

    /// Streaming completion as a sequence of decoded chunks.
    async fn stream_complete(
        &self,
        settings: &ClientSettings,
        request: &CompletionRequest,
    ) -> Result<ChunkStream, LlmError> {
        let body = self.open_stream(settings, request).await?;
        Ok(decode_stream(body, self.decoder()))
    }
}

/// Create the client serving `kind` on top of a shared transport.
pub fn create_client(
    kind: ProviderKind,
    transport: Arc<dyn HttpTransport>,
) -> Arc<dyn ProviderClient> {
    match kind {
        ProviderKind::Anthropic => Arc::new(anthropic::AnthropicClient::new(transport)),
        ProviderKind::Ollama => Arc::new(ollama::OllamaClient::new(transport)),
        ProviderKind::OpenAi
        | ProviderKind::DeepSeek
        | ProviderKind::LmStudio
        | ProviderKind::OpenAiCompatible => Arc::new(openai::OpenAiClient::new(kind, transport)),
    }
}
