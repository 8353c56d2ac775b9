use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::streaming::OpenAiLineParser;
use super::types::OpenAiChatResponse;
use crate::error::LlmError;
use crate::http::{ByteStream, HttpHeaderBuilder, HttpTransport};
use crate::providers::common;
use crate::providers::{ClientSettings, ProviderClient};
use crate::streaming::StreamDecoder;
use crate::types::{CompletionOptions, CompletionRequest, CompletionResult, ProviderKind, Usage};

/// Client for the chat-completions wire format.
#[derive(Clone)]
pub struct OpenAiClient {
    kind: ProviderKind,
    transport: Arc<dyn HttpTransport>,
}

impl OpenAiClient {
    pub fn new(kind: ProviderKind, transport: Arc<dyn HttpTransport>) -> Self {
        Self { kind, transport }
    }

    fn headers(&self, settings: &ClientSettings, stream: bool) -> Result<HeaderMap, LlmError> {
        let mut builder = HttpHeaderBuilder::new()
            .with_json_content_type()
            .with_user_agent();
        if stream {
            builder = builder.with_event_stream_accept();
        }
        // local servers usually run without a key
        if let Some(key) = settings.credential() {
            builder = builder.with_bearer_auth(key)?;
        }
        Ok(builder.build())
    }

    fn body(
        settings: &ClientSettings,
        request: &CompletionRequest,
        options: &CompletionOptions,
        stream: bool,
    ) -> Value {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let mut body = Map::new();
        body.insert("model".into(), json!(settings.model));
        body.insert("messages".into(), Value::Array(messages));
        body.insert("stream".into(), json!(stream));
        if let Some(t) = options.temperature {
            body.insert("temperature".into(), json!(t));
        }
        if let Some(max) = options.max_tokens {
            body.insert("max_tokens".into(), json!(max));
        }
        if let Some(p) = options.top_p {
            body.insert("top_p".into(), json!(p));
        }
        if let Some(penalty) = options.frequency_penalty {
            body.insert("frequency_penalty".into(), json!(penalty));
        }
        if let Some(penalty) = options.presence_penalty {
            body.insert("presence_penalty".into(), json!(penalty));
        }
        if !options.stop_sequences.is_empty() {
            body.insert("stop".into(), json!(options.stop_sequences));
        }
        Value::Object(body)
    }

    fn parse_response(raw: Value, settings: &ClientSettings) -> Result<CompletionResult, LlmError> {
        let response = OpenAiChatResponse::deserialize(&raw)
            .map_err(|e| LlmError::ParseError(format!("unexpected chat completion shape: {e}")))?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                LlmError::ParseError("response has no choices[0].message.content".to_string())
            })?;

        Ok(CompletionResult {
            content,
            model: common::reported_model(response.model, settings),
            usage: response.usage.map(Usage::from).unwrap_or_default(),
            raw,
        })
    }
}

#[async_trait]
impl ProviderClient for OpenAiClient {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn complete(
        &self,
        settings: &ClientSettings,
        request: &CompletionRequest,
    ) -> Result<CompletionResult, LlmError> {
        let options = common::validate_request(settings, request)?;
        let body = Self::body(settings, request, &options, false);
        let raw = common::send_json(
            self.transport.as_ref(),
            settings,
            settings.url("chat/completions"),
            self.headers(settings, false)?,
            body,
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
        let body = Self::body(settings, request, &options, true);
        common::open_byte_stream(
            self.transport.as_ref(),
            settings,
            settings.url("chat/completions"),
            self.headers(settings, true)?,
            body,
        )
        .await
    }

    fn decoder(&self) -> Box<dyn StreamDecoder> {
        Box::new(OpenAiLineParser::decoder())
    }
}
