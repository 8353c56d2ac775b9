//! User-facing error helpers

use super::types::LlmError;
use crate::types::ProviderKind;

/// Result alias used across the crate.
pub type LlmResult<T> = Result<T, LlmError>;

impl LlmError {
    /// Render a message suitable for the `{ error }` reply of a caller.
    ///
    /// Always names the backend; stream failures also carry the attempt count.
    pub fn user_message(&self, provider: ProviderKind) -> String {
        let name = provider.display_name();
        match self {
            Self::ConfigurationError(msg) => {
                format!("{name} is not configured correctly: {msg}")
            }
            Self::ValidationError(msg) => format!("{name} rejected the request: {msg}"),
            Self::UpstreamError { status, body } => {
                let detail = upstream_detail(body);
                match *status {
                    401 | 403 => format!("{name} refused the credential (HTTP {status}): {detail}"),
                    404 => format!("{name} endpoint or model not found (HTTP 404): {detail}"),
                    429 => format!("{name} rate limit reached (HTTP 429): {detail}"),
                    _ => format!("{name} returned HTTP {status}: {detail}"),
                }
            }
            Self::ParseError(msg) => format!("{name} sent an unexpected response: {msg}"),
            Self::StreamIntegrityError {
                attempts, chunks, ..
            } => format!(
                "{name} returned no content after {attempts} attempt(s) ({chunks} chunk(s)); the model may still be loading"
            ),
            Self::CancellationError(_) => format!("{name} request was cancelled"),
            Self::HttpError(msg) => format!("Could not reach {name}: {msg}"),
        }
    }
}

/// Extract `error.message` (or `error` as a string) from a JSON error body,
/// falling back to the raw text.
fn upstream_detail(body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let error = &value["error"];
        if let Some(message) = error["message"].as_str() {
            return message.to_string();
        }
        if let Some(message) = error.as_str() {
            return message.to_string();
        }
    }
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.to_string()
    }
}
