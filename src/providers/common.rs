//! Helpers shared by every provider client: configuration checks, option
//! validation and request execution through the transport.

use reqwest::header::HeaderMap;

use super::ClientSettings;
use crate::error::LlmError;
use crate::http::{
    ByteStream, HttpRequestContext, HttpTransport, HttpTransportRequest, read_body_text,
};
use crate::types::{CompletionOptions, CompletionRequest, ProviderConfig, ProviderKind};

/// Non-empty, printable ASCII, no whitespace.
pub fn is_valid_credential(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_graphic())
}

/// Absolute `http`/`https` URL with a host.
pub fn is_valid_endpoint(text: &str) -> bool {
    match reqwest::Url::parse(text.trim()) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

/// Turn a configuration record into request settings.
///
/// Fails with `ConfigurationError` before any network activity when a
/// required credential/endpoint/model is missing or malformed.
pub fn resolve_settings(
    kind: ProviderKind,
    config: &ProviderConfig,
    validate_credential: impl Fn(&str) -> bool,
    validate_endpoint: impl Fn(&str) -> bool,
) -> Result<ClientSettings, LlmError> {
    if config.kind != kind {
        return Err(LlmError::ConfigurationError(format!(
            "{} client cannot be configured with a {} configuration",
            kind, config.kind
        )));
    }

    let credential = config.credential.clone().filter(|_| config.has_credential());
    match (&credential, kind.requires_credential()) {
        (None, true) => {
            return Err(LlmError::ConfigurationError(format!(
                "{} requires an API key",
                kind.display_name()
            )));
        }
        (Some(secret), _) => {
            use secrecy::ExposeSecret;
            if !validate_credential(secret.expose_secret()) {
                return Err(LlmError::ConfigurationError(format!(
                    "{} API key is malformed",
                    kind.display_name()
                )));
            }
        }
        (None, false) => {}
    }

    let endpoint = config
        .endpoint
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());
    let base_url = match endpoint {
        Some(endpoint) if validate_endpoint(endpoint) => endpoint.trim_end_matches('/').to_string(),
        Some(endpoint) => {
            return Err(LlmError::ConfigurationError(format!(
                "{} endpoint is not a valid http(s) URL: {endpoint}",
                kind.display_name()
            )));
        }
        None => match kind.default_base_url() {
            Some(url) => url.to_string(),
            None => {
                return Err(LlmError::ConfigurationError(format!(
                    "{} requires an endpoint URL",
                    kind.display_name()
                )));
            }
        },
    };

    let model = config
        .model
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .or(kind.default_model())
        .ok_or_else(|| {
            LlmError::ConfigurationError(format!("{} requires a model name", kind.display_name()))
        })?
        .to_string();

    validate_options(kind, &config.request_defaults)?;

    Ok(ClientSettings {
        kind,
        base_url,
        credential,
        model,
        defaults: config.request_defaults.clone(),
    })
}

/// Check option values against what the backend accepts.
pub fn validate_options(kind: ProviderKind, options: &CompletionOptions) -> Result<(), LlmError> {
    let max_temperature = if kind == ProviderKind::Anthropic { 1.0 } else { 2.0 };
    if let Some(t) = options.temperature
        && !(0.0..=max_temperature).contains(&t)
    {
        return Err(LlmError::ValidationError(format!(
            "temperature {t} is outside 0..={max_temperature} for {kind}"
        )));
    }
    if let Some(p) = options.top_p
        && !(0.0..=1.0).contains(&p)
    {
        return Err(LlmError::ValidationError(format!(
            "top_p {p} is outside 0..=1"
        )));
    }
    if options.max_tokens == Some(0) {
        return Err(LlmError::ValidationError(
            "max_tokens must be greater than 0".to_string(),
        ));
    }
    for (name, value) in [
        ("frequency_penalty", options.frequency_penalty),
        ("presence_penalty", options.presence_penalty),
    ] {
        let Some(value) = value else { continue };
        if kind == ProviderKind::Anthropic {
            return Err(LlmError::ValidationError(format!(
                "{name} is not supported by {}",
                kind.display_name()
            )));
        }
        if !(-2.0..=2.0).contains(&value) {
            return Err(LlmError::ValidationError(format!(
                "{name} {value} is outside -2..=2"
            )));
        }
    }
    if kind == ProviderKind::OpenAi && options.stop_sequences.len() > 4 {
        return Err(LlmError::ValidationError(format!(
            "OpenAI accepts at most 4 stop sequences, got {}",
            options.stop_sequences.len()
        )));
    }
    Ok(())
}

/// Reject requests that cannot be sent at all.
pub fn validate_request(
    settings: &ClientSettings,
    request: &CompletionRequest,
) -> Result<CompletionOptions, LlmError> {
    if request.prompt.trim().is_empty() {
        return Err(LlmError::ValidationError("prompt is empty".to_string()));
    }
    let options = settings.effective_options(request);
    validate_options(settings.kind, &options)?;
    Ok(options)
}

fn request_context(settings: &ClientSettings, url: &str, stream: bool) -> HttpRequestContext {
    HttpRequestContext {
        request_id: uuid::Uuid::new_v4().to_string(),
        provider_id: settings.kind.as_str().to_string(),
        url: url.to_string(),
        stream,
    }
}

/// POST a JSON body and parse the JSON response.
pub async fn send_json(
    transport: &dyn HttpTransport,
    settings: &ClientSettings,
    url: String,
    headers: HeaderMap,
    body: serde_json::Value,
) -> Result<serde_json::Value, LlmError> {
    let request = HttpTransportRequest {
        ctx: request_context(settings, &url, false),
        url,
        headers,
        body,
    };
    let response = transport.execute_json(request).await?;
    if !response.is_success() {
        return Err(LlmError::upstream(response.status, response.text()));
    }
    serde_json::from_slice(&response.body)
        .map_err(|e| LlmError::ParseError(format!("Invalid JSON response: {e}")))
}

/// POST a JSON body and return the streaming response body.
pub async fn open_byte_stream(
    transport: &dyn HttpTransport,
    settings: &ClientSettings,
    url: String,
    headers: HeaderMap,
    body: serde_json::Value,
) -> Result<ByteStream, LlmError> {
    let request = HttpTransportRequest {
        ctx: request_context(settings, &url, true),
        url,
        headers,
        body,
    };
    let response = transport.execute_stream(request).await?;
    if !response.is_success() {
        let status = response.status;
        let text = read_body_text(response.body).await;
        return Err(LlmError::upstream(status, text));
    }
    Ok(response.body)
}

/// Model reported by the backend, falling back to the requested one.
pub fn reported_model(reported: Option<String>, settings: &ClientSettings) -> String {
    reported
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| settings.model.clone())
}
