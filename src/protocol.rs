//! Caller-facing message shapes
//!
//! ```json
//! { "kind": "PROCESS_CONTENT", "provider": "ollama", "command": "summarize",
//!   "content": "...", "title": "...", "stream": true }
//! { "kind": "STREAM_CHUNK", "content": "Hel", "done": false }
//! { "kind": "STREAM_ERROR", "error": "Ollama returned HTTP 500: ..." }
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{ProviderConfig, StreamChunk};

/// Message sent by a caller to request work.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind")]
pub enum InboundMessage {
    #[serde(rename = "PROCESS_CONTENT")]
    ProcessContent(ProcessContent),
}

/// Body of a `PROCESS_CONTENT` message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessContent {
    /// Provider kind name or configuration-store key
    pub provider: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub stream: bool,
    /// Inline configuration; takes precedence over the store
    #[serde(default)]
    pub config: Option<ProviderConfig>,
}

impl ProcessContent {
    pub fn new(provider: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            command: command.into(),
            content: String::new(),
            title: String::new(),
            stream: false,
            config: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_config(mut self, config: ProviderConfig) -> Self {
        self.config = Some(config);
        self
    }
}

impl From<ProcessContent> for InboundMessage {
    fn from(value: ProcessContent) -> Self {
        Self::ProcessContent(value)
    }
}

/// Message emitted on the streaming channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum OutboundMessage {
    #[serde(rename = "STREAM_CHUNK")]
    StreamChunk { content: String, done: bool },
    #[serde(rename = "STREAM_ERROR")]
    StreamError { error: String },
}

impl OutboundMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::StreamError {
            error: message.into(),
        }
    }

    /// Text of a `STREAM_ERROR`.
    pub fn error_text(&self) -> Option<&str> {
        match self {
            Self::StreamError { error } => Some(error),
            Self::StreamChunk { .. } => None,
        }
    }

    /// Whether this message ends the stream.
    pub const fn is_terminal(&self) -> bool {
        match self {
            Self::StreamChunk { done, .. } => *done,
            Self::StreamError { .. } => true,
        }
    }
}

impl From<StreamChunk> for OutboundMessage {
    fn from(chunk: StreamChunk) -> Self {
        Self::StreamChunk {
            content: chunk.content,
            done: chunk.done,
        }
    }
}

/// Reply to a non-streaming request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Content { content: String },
    Error { error: String },
}

impl Reply {
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Content { content } => Some(content),
            Self::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error { error } => Some(error),
            Self::Content { .. } => None,
        }
    }
}
