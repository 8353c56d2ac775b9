//! Core error types

use thiserror::Error;

use crate::types::ProviderKind;

/// Errors produced by provider clients, decoders and the dispatcher.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// Missing or malformed credential/endpoint. Raised before any network call.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Unsupported model or option value.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Non-success HTTP status returned by the backend.
    #[error("Upstream error {status}: {body}")]
    UpstreamError {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Response body did not match the expected shape.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A stream terminated without producing any content.
    #[error(
        "Stream integrity error: {provider} produced no content after {attempts} attempt(s) ({chunks} chunk(s) received)"
    )]
    StreamIntegrityError {
        /// Backend that produced the empty stream
        provider: ProviderKind,
        /// Total number of attempts issued
        attempts: u32,
        /// Chunks received across all attempts
        chunks: u64,
    },

    /// The caller abandoned the request.
    #[error("Cancelled: {0}")]
    CancellationError(String),

    /// Transport failure before an HTTP status was received.
    #[error("HTTP error: {0}")]
    HttpError(String),
}

/// Coarse error classification used for logging and reply formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Validation,
    Upstream,
    Parse,
    Stream,
    Cancelled,
    Network,
}

impl LlmError {
    /// Build an `UpstreamError` from a status and body.
    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        Self::UpstreamError {
            status,
            body: body.into(),
        }
    }

    /// Classify this error.
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigurationError(_) => ErrorCategory::Configuration,
            Self::ValidationError(_) => ErrorCategory::Validation,
            Self::UpstreamError { .. } => ErrorCategory::Upstream,
            Self::ParseError(_) => ErrorCategory::Parse,
            Self::StreamIntegrityError { .. } => ErrorCategory::Stream,
            Self::CancellationError(_) => ErrorCategory::Cancelled,
            Self::HttpError(_) => ErrorCategory::Network,
        }
    }

    /// Whether repeating the same request could plausibly succeed.
    ///
    /// Configuration and validation failures are never retryable.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::UpstreamError { status, .. } => {
                matches!(*status, 408 | 409 | 429) || *status >= 500
            }
            Self::HttpError(_) => true,
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::UpstreamError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            Self::upstream(status.as_u16(), err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_cover_taxonomy() {
        assert_eq!(
            LlmError::ConfigurationError("x".into()).category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            LlmError::ValidationError("x".into()).category(),
            ErrorCategory::Validation
        );
        assert_eq!(LlmError::upstream(500, "boom").category(), ErrorCategory::Upstream);
        assert_eq!(
            LlmError::CancellationError("gone".into()).category(),
            ErrorCategory::Cancelled
        );
    }

    #[test]
    fn retryability() {
        assert!(LlmError::upstream(503, "").is_retryable());
        assert!(LlmError::upstream(429, "").is_retryable());
        assert!(!LlmError::upstream(401, "").is_retryable());
        assert!(!LlmError::ConfigurationError("no key".into()).is_retryable());
        assert!(!LlmError::ValidationError("bad".into()).is_retryable());
    }

    #[test]
    fn integrity_error_display_includes_context() {
        let err = LlmError::StreamIntegrityError {
            provider: ProviderKind::Ollama,
            attempts: 3,
            chunks: 3,
        };
        let text = err.to_string();
        assert!(text.contains("ollama"));
        assert!(text.contains("3 attempt(s)"));
    }
}
