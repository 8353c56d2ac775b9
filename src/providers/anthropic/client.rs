use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::streaming::AnthropicLineParser;
use super::types::AnthropicMessageResponse;
use super::{API_VERSION, DEFAULT_MAX_TOKENS};
use crate::error::LlmError;
use crate::http::{ByteStream, HttpHeaderBuilder, HttpTransport};
use crate::providers::common;
use crate::providers::{ClientSettings, ProviderClient};
use crate::streaming::StreamDecoder;
use crate::types::{CompletionOptions, CompletionRequest, CompletionResult, ProviderKind, Usage};

/// Anthropic Messages API client.
#[derive(Clone)]
pub struct AnthropicClient {
    transport: Arc<dyn HttpTransport>,
}

impl AnthropicClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    fn headers(settings: &ClientSettings, stream: bool) -> Result<HeaderMap, LlmError> {
        let key = settings.credential().ok_or_else(|| {
            LlmError::ConfigurationError("Anthropic requires an API key".to_string())
        })?;
        let mut builder = HttpHeaderBuilder::new()
            .with_json_content_type()
            .with_user_agent()
            .with_custom_auth("x-api-key", key)?
            .with_static_header("anthropic-version", API_VERSION);
        if stream {
            builder = builder.with_event_stream_accept();
        }
        Ok(builder.build())
    }

    fn body(
        settings: &ClientSettings,
        request: &CompletionRequest,
        options: &CompletionOptions,
        stream: bool,
    ) -> Value {
        let mut body = Map::new();
        body.insert("model".into(), json!(settings.model));
        body.insert(
            "max_tokens".into(),
            json!(options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
        );
        body.insert(
            "messages".into(),
            json!([{ "role": "user", "content": request.prompt }]),
        );
        if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
            body.insert("system".into(), json!(system));
        }
        if stream {
            body.insert("stream".into(), json!(true));
        }
        if let Some(t) = options.temperature {
            body.insert("temperature".into(), json!(t));
        }
        if let Some(p) = options.top_p {
            body.insert("top_p".into(), json!(p));
        }
        if !options.stop_sequences.is_empty() {
            body.insert("stop_sequences".into(), json!(options.stop_sequences));
        }
        Value::Object(body)
    }

    fn parse_response(raw: Value, settings: &ClientSettings) -> Result<CompletionResult, LlmError> {
        let response = AnthropicMessageResponse::deserialize(&raw)
            .map_err(|e| LlmError::ParseError(format!("unexpected messages response shape: {e}")))?;
        let content = response.text();

        Ok(CompletionResult {
            content,
            model: common::reported_model(response.model, settings),
            usage: response.usage.map(Usage::from).unwrap_or_default(),
            raw,
        })
    }
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn complete(
        &self,
        settings: &ClientSettings,
        request: &CompletionRequest,
    ) -> Result<CompletionResult, LlmError> {
        let options = common::validate_request(settings, request)?;
        let raw = common::send_json(
            self.transport.as_ref(),
            settings,
            settings.url("messages"),
            Self::headers(settings, false)?,
            Self::body(settings, request, &options, false),
        )
        .await?;
        Self::parse_response(raw, settings)
    }

    async fn open_stream(
        &self,
        settings: &ClientSettings,
        request: &CompletionRequest,
    ) -> Result<ByteStream, LlmError> {
        let options = common::validate_request(settings, request)?;
        common::open_byte_stream(
            self.transport.as_ref(),
            settings,
            settings.url("messages"),
            Self::headers(settings, true)?,
            Self::body(settings, request, &options, true),
        )
        .await
    }

    fn decoder(&self) -> Box<dyn StreamDecoder> {
        Box::new(AnthropicLineParser::decoder())
    }
}
