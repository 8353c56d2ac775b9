//! Record-per-line (NDJSON) parsing for the generate stream.
//!
//! ```text
//! {"model":"llama3.2","response":"Hel","done":false}
//! {"model":"llama3.2","response":"lo","done":false}
//! {"model":"llama3.2","response":"","done":true,"eval_count":2}
//! ```

use super::types::OllamaRecord;
use crate::error::LlmError;
use crate::streaming::{FramedDecoder, LineEvent, LineParser};

#[derive(Debug, Default, Clone)]
pub struct OllamaLineParser;

impl OllamaLineParser {
    pub fn decoder() -> FramedDecoder<Self> {
        FramedDecoder::new(Self)
    }
}

impl LineParser for OllamaLineParser {
    fn label(&self) -> &'static str {
        "ollama-ndjson"
    }

    fn parse_line(&mut self, line: &str) -> LineEvent {
        let line = line.trim();
        if line.is_empty() {
            return LineEvent::Ignore;
        }
        let mut record: OllamaRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => return LineEvent::Malformed(e.to_string()),
        };
        if record.error.is_some() {
            return LineEvent::Error(LlmError::upstream(500, line));
        }
        let delta = record.text().unwrap_or_default();
        LineEvent::Content {
            delta,
            terminal: record.done,
        }
    }
}
