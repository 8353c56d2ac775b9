//! Backend families

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LlmError;

/// The backend families a request can be dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderKind {
    /// OpenAI hosted API
    #[serde(rename = "openai", alias = "open_ai")]
    OpenAi,
    /// Anthropic Messages API
    #[serde(rename = "anthropic", alias = "claude")]
    Anthropic,
    /// DeepSeek hosted API (OpenAI wire format)
    #[serde(rename = "deepseek")]
    DeepSeek,
    /// Ollama local server
    #[serde(rename = "ollama")]
    Ollama,
    /// LM Studio local server (OpenAI wire format)
    #[serde(rename = "lmstudio", alias = "lm_studio")]
    LmStudio,
    /// Any other local server speaking the OpenAI wire format
    #[serde(rename = "openai_compatible", alias = "custom")]
    OpenAiCompatible,
}

/// Streaming framing used by a backend family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// `data: {...}` lines terminated by `[DONE]` or a finish reason
    LineDelimited,
    /// `data: {"type": ...}` lines terminated by `message_stop`
    EventTagged,
    /// One JSON record per line with a `done` flag
    RecordPerLine,
}

impl ProviderKind {
    /// All supported kinds.
    pub const ALL: [ProviderKind; 6] = [
        Self::OpenAi,
        Self::Anthropic,
        Self::DeepSeek,
        Self::Ollama,
        Self::LmStudio,
        Self::OpenAiCompatible,
    ];

    /// Stable identifier used in messages and configuration keys.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::DeepSeek => "deepseek",
            Self::Ollama => "ollama",
            Self::LmStudio => "lmstudio",
            Self::OpenAiCompatible => "openai_compatible",
        }
    }

    /// Human readable product name.
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::DeepSeek => "DeepSeek",
            Self::Ollama => "Ollama",
            Self::LmStudio => "LM Studio",
            Self::OpenAiCompatible => "OpenAI-compatible server",
        }
    }

    /// Local servers are addressed by endpoint; hosted APIs by credential.
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Ollama | Self::LmStudio | Self::OpenAiCompatible)
    }

    /// Whether a credential must be configured before any request.
    pub const fn requires_credential(&self) -> bool {
        !self.is_local()
    }

    /// Local servers may answer the first request with an empty completion
    /// while the model is still loading.
    pub const fn has_cold_start(&self) -> bool {
        self.is_local()
    }

    /// Base URL of a hosted API, used when the configuration does not name
    /// an endpoint. Local servers have none and must be configured with one.
    pub const fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("https://api.openai.com/v1"),
            Self::Anthropic => Some("https://api.anthropic.com/v1"),
            Self::DeepSeek => Some("https://api.deepseek.com/v1"),
            Self::Ollama | Self::LmStudio | Self::OpenAiCompatible => None,
        }
    }

    /// Address a local server listens on out of the box.
    ///
    /// Only [`EnvConfigStore`](crate::config::EnvConfigStore) falls back to
    /// it, for a backend whose variables are set without a host.
    pub const fn conventional_endpoint(&self) -> Option<&'static str> {
        match self {
            Self::Ollama => Some("http://localhost:11434"),
            Self::LmStudio => Some("http://localhost:1234/v1"),
            Self::OpenAi | Self::Anthropic | Self::DeepSeek | Self::OpenAiCompatible => None,
        }
    }

    /// Model used when the configuration does not name one.
    pub const fn default_model(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("gpt-4o-mini"),
            Self::Anthropic => Some("claude-3-5-haiku-latest"),
            Self::DeepSeek => Some("deepseek-chat"),
            Self::Ollama => Some("llama3.2"),
            Self::LmStudio => Some("local-model"),
            Self::OpenAiCompatible => None,
        }
    }

    /// Streaming framing spoken by this backend.
    pub const fn wire_format(&self) -> WireFormat {
        match self {
            Self::Anthropic => WireFormat::EventTagged,
            Self::Ollama => WireFormat::RecordPerLine,
            Self::OpenAi | Self::DeepSeek | Self::LmStudio | Self::OpenAiCompatible => {
                WireFormat::LineDelimited
            }
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "deepseek" => Ok(Self::DeepSeek),
            "ollama" => Ok(Self::Ollama),
            "lmstudio" | "lm_studio" | "lm-studio" => Ok(Self::LmStudio),
            "openai_compatible" | "openai-compatible" | "custom" => Ok(Self::OpenAiCompatible),
            other => Err(LlmError::ConfigurationError(format!(
                "Unknown provider: {other}"
            ))),
        }
    }
}
