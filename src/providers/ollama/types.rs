//! Generate API record shape
//!
//! The non-streaming reply and every line of a streamed reply share one
//! shape; only the last streamed record carries `done: true` and the counts.

use serde::Deserialize;

use crate::types::Usage;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OllamaRecord {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
    /// Present when a chat-shaped record is returned instead
    #[serde(default)]
    pub message: Option<OllamaMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OllamaMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl OllamaRecord {
    /// Generated text, from `response` or the chat-shaped `message.content`.
    pub fn text(&mut self) -> Option<String> {
        self.response
            .take()
            .or_else(|| self.message.take().and_then(|m| m.content))
    }

    pub fn usage(&self) -> Usage {
        Usage::from_parts(self.prompt_eval_count, self.eval_count, None)
    }
}
