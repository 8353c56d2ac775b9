use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::streaming::OllamaLineParser;
use super::types::OllamaRecord;
use crate::error::LlmError;
use crate::http::{ByteStream, HttpHeaderBuilder, HttpTransport};
use crate::providers::common;
use crate::providers::{ClientSettings, ProviderClient};
use crate::streaming::StreamDecoder;
use crate::types::{CompletionOptions, CompletionRequest, CompletionResult, ProviderKind};

/// Client for a local Ollama server.
#[derive(Clone)]
pub struct OllamaClient {
    transport: Arc<dyn HttpTransport>,
}

impl OllamaClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    fn headers(settings: &ClientSettings) -> Result<HeaderMap, LlmError> {
        let mut builder = HttpHeaderBuilder::new()
            .with_json_content_type()
            .with_user_agent();
        // reverse proxies in front of Ollama sometimes want a bearer token
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
        let mut model_options = Map::new();
        if let Some(t) = options.temperature {
            model_options.insert("temperature".into(), json!(t));
        }
        if let Some(max) = options.max_tokens {
            model_options.insert("num_predict".into(), json!(max));
        }
        if let Some(p) = options.top_p {
            model_options.insert("top_p".into(), json!(p));
        }
        if let Some(penalty) = options.frequency_penalty {
            model_options.insert("frequency_penalty".into(), json!(penalty));
        }
        if let Some(penalty) = options.presence_penalty {
            model_options.insert("presence_penalty".into(), json!(penalty));
        }
        if !options.stop_sequences.is_empty() {
            model_options.insert("stop".into(), json!(options.stop_sequences));
        }

        let mut body = Map::new();
        body.insert("model".into(), json!(settings.model));
        body.insert("prompt".into(), json!(request.prompt));
        if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
            body.insert("system".into(), json!(system));
        }
        body.insert("stream".into(), json!(stream));
        if !model_options.is_empty() {
            body.insert("options".into(), Value::Object(model_options));
        }
        Value::Object(body)
    }

    fn parse_response(raw: Value, settings: &ClientSettings) -> Result<CompletionResult, LlmError> {
        let mut record = OllamaRecord::deserialize(&raw)
            .map_err(|e| LlmError::ParseError(format!("unexpected generate response shape: {e}")))?;
        if record.error.is_some() {
            return Err(LlmError::upstream(500, raw.to_string()));
        }
        let content = record
            .text()
            .ok_or_else(|| LlmError::ParseError("response has no `response` field".to_string()))?;
        let usage = record.usage();

        Ok(CompletionResult {
            content,
            model: common::reported_model(record.model, settings),
            usage,
            raw,
        })
    }
}

#[async_trait]
impl ProviderClient for OllamaClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
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
            settings.url("api/generate"),
            Self::headers(settings)?,
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
            settings.url("api/generate"),
            Self::headers(settings)?,
            Self::body(settings, request, &options, true),
        )
        .await
    }

    fn decoder(&self) -> Box<dyn StreamDecoder> {
        Box::new(OllamaLineParser::decoder())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ReqwestTransport;
    use crate::types::{ProviderConfig, Usage};

    fn settings() -> ClientSettings {
        OllamaClient::new(Arc::new(ReqwestTransport::new()))
            .configure(
                &ProviderConfig::new(ProviderKind::Ollama)
                    .with_endpoint("http://127.0.0.1:11434/")
                    .with_model("mistral"),
            )
            .unwrap()
    }

    #[test]
    fn options_are_nested_with_ollama_names() {
        let options = CompletionOptions::new()
            .with_max_tokens(128)
            .with_temperature(0.2);
        let body = OllamaClient::body(&settings(), &CompletionRequest::new("hi"), &options, true);
        assert_eq!(body["model"], "mistral");
        assert_eq!(body["stream"], true);
        assert_eq!(body["options"]["num_predict"], 128);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn no_options_object_when_unset() {
        let body = OllamaClient::body(
            &settings(),
            &CompletionRequest::new("hi"),
            &CompletionOptions::new(),
            false,
        );
        assert!(body.get("options").is_none());
    }

    #[test]
    fn usage_defaults_to_zero() {
        let raw = json!({ "model": "mistral", "response": "ok", "done": true });
        let result = OllamaClient::parse_response(raw, &settings()).unwrap();
        assert_eq!(result.content, "ok");
        assert_eq!(result.usage, Usage::default());
    }

    #[test]
    fn eval_counts_become_usage() {
        let raw = json!({ "response": "ok", "prompt_eval_count": 26, "eval_count": 290 });
        let result = OllamaClient::parse_response(raw, &settings()).unwrap();
        assert_eq!(result.usage, Usage::new(26, 290, 316));
        assert_eq!(result.model, "mistral");
    }

    #[test]
    fn error_body_is_upstream_error() {
        let raw = json!({ "error": "model not found" });
        assert!(matches!(
            OllamaClient::parse_response(raw, &settings()),
            Err(LlmError::UpstreamError { status: 500, .. })
        ));
    }

    #[test]
    fn chat_shaped_reply_is_accepted() {
        let raw = json!({
            "model": "mistral:7b",
            "message": { "role": "assistant", "content": "from chat" },
            "done": true
        });
        let result = OllamaClient::parse_response(raw, &settings()).unwrap();
        assert_eq!(result.content, "from chat");
        assert_eq!(result.model, "mistral:7b");
    }
}
