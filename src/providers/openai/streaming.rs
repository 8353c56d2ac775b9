//! Line-delimited SSE parsing for the chat-completions stream.
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}
//! data: {"choices":[{"delta":{},"finish_reason":"stop"}]}
//! data: [DONE]
//! ```

use serde::Deserialize;

use crate::streaming::{FramedDecoder, LineEvent, LineParser, sse_data};

#[derive(Debug, Deserialize)]
struct OpenAiStreamEvent {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: Option<OpenAiStreamDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Parser for `data:` lines terminated by `[DONE]` or a `finish_reason`.
#[derive(Debug, Default, Clone)]
pub struct OpenAiLineParser;

impl OpenAiLineParser {
    pub fn decoder() -> FramedDecoder<Self> {
        FramedDecoder::new(Self)
    }
}

impl LineParser for OpenAiLineParser {
    fn label(&self) -> &'static str {
        "openai-sse"
    }

    fn parse_line(&mut self, line: &str) -> LineEvent {
        let payload = match sse_data(line) {
            None | Some("") => return LineEvent::Ignore,
            Some("[DONE]") => return LineEvent::terminal(),
            Some(payload) => payload,
        };

        let event: OpenAiStreamEvent = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(e) => return LineEvent::Malformed(e.to_string()),
        };
        if let Some(error) = event.error {
            return LineEvent::Malformed(format!("error payload in stream: {error}"));
        }

        // usage-only chunks carry no choices
        let Some(choice) = event.choices.into_iter().next() else {
            return LineEvent::Ignore;
        };
        LineEvent::Content {
            delta: choice.delta.and_then(|d| d.content).unwrap_or_default(),
            terminal: choice.finish_reason.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::StreamDecoder;
    use crate::types::StreamChunk;

    fn chunks(decoder: &mut FramedDecoder<OpenAiLineParser>, bytes: &[u8]) -> Vec<StreamChunk> {
        decoder.feed(bytes).into_iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn content_deltas_then_done() {
        let mut decoder = OpenAiLineParser::decoder();
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":null}]}\n\n",
            "data: [DONE]\n\n",
        );
        assert_eq!(
            chunks(&mut decoder, body.as_bytes()),
            vec![
                StreamChunk::delta("Hel"),
                StreamChunk::delta("lo"),
                StreamChunk::terminal()
            ]
        );
    }

    #[test]
    fn finish_reason_is_terminal() {
        let mut decoder = OpenAiLineParser::decoder();
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"end\"},\"finish_reason\":\"stop\"}]}\n";
        assert_eq!(
            chunks(&mut decoder, body.as_bytes()),
            vec![StreamChunk::delta("end"), StreamChunk::terminal()]
        );
        assert!(decoder.is_terminated());
    }

    #[test]
    fn comments_and_event_fields_are_ignored() {
        let mut decoder = OpenAiLineParser::decoder();
        let body = ": ping\nevent: message\nid: 7\ndata: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n";
        assert_eq!(chunks(&mut decoder, body.as_bytes()), vec![StreamChunk::delta("x")]);
        assert_eq!(decoder.skipped_lines(), 0);
    }

    #[test]
    fn malformed_json_is_skipped() {
        let mut decoder = OpenAiLineParser::decoder();
        let body = "data: {not json\ndata: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n";
        assert_eq!(chunks(&mut decoder, body.as_bytes()), vec![StreamChunk::delta("ok")]);
        assert_eq!(decoder.skipped_lines(), 1);
    }

    #[test]
    fn error_payload_counts_as_malformed() {
        let mut decoder = OpenAiLineParser::decoder();
        let out = chunks(
            &mut decoder,
            b"data: {\"error\":{\"message\":\"model loading\"}}\n",
        );
        assert!(out.is_empty());
        assert_eq!(decoder.skipped_lines(), 1);
    }

    #[test]
    fn crlf_lines_and_missing_done() {
        let mut decoder = OpenAiLineParser::decoder();
        let out = chunks(
            &mut decoder,
            b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\r\n\r\n",
        );
        assert_eq!(out, vec![StreamChunk::delta("a")]);
        let tail: Vec<_> = decoder.finish().into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(tail, vec![StreamChunk::terminal()]);
    }
}
