//! Event-tagged SSE parsing for the Messages stream.
//!
//! Only two event types matter: `content_block_delta` carries text and
//! `message_stop` ends the stream. `error` events end it with an upstream
//! error. Everything else (`message_start`, `ping`, ...) is ignored.

use serde::Deserialize;

use crate::error::LlmError;
use crate::streaming::{FramedDecoder, LineEvent, LineParser, sse_data};

#[derive(Debug, Deserialize)]
struct AnthropicStreamEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: Option<AnthropicDelta>,
    #[serde(default)]
    error: Option<AnthropicStreamError>,
}

#[derive(Debug, Deserialize)]
struct AnthropicDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicStreamError {
    #[serde(rename = "type", default)]
    error_type: String,
}

/// HTTP status equivalent of an in-band error type.
pub(crate) fn error_status(error_type: &str) -> u16 {
    match error_type {
        "invalid_request_error" => 400,
        "authentication_error" => 401,
        "permission_error" => 403,
        "not_found_error" => 404,
        "rate_limit_error" => 429,
        "overloaded_error" => 529,
        _ => 500,
    }
}

#[derive(Debug, Default, Clone)]
pub struct AnthropicLineParser;

impl AnthropicLineParser {
    pub fn decoder() -> FramedDecoder<Self> {
        FramedDecoder::new(Self)
    }
}

impl LineParser for AnthropicLineParser {
    fn label(&self) -> &'static str {
        "anthropic-sse"
    }

    fn parse_line(&mut self, line: &str) -> LineEvent {
        let payload = match sse_data(line) {
            None | Some("") => return LineEvent::Ignore,
            Some("[DONE]") => return LineEvent::terminal(),
            Some(payload) => payload,
        };

        let event: AnthropicStreamEvent = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(e) => return LineEvent::Malformed(e.to_string()),
        };

        match event.event_type.as_str() {
            "content_block_delta" => {
                LineEvent::delta(event.delta.and_then(|d| d.text).unwrap_or_default())
            }
            "message_stop" => LineEvent::terminal(),
            "error" => {
                let (status, body) = match event.error {
                    Some(err) => (error_status(&err.error_type), payload.to_string()),
                    None => (500, payload.to_string()),
                };
                LineEvent::Error(LlmError::upstream(status, body))
            }
            _ => LineEvent::Ignore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::StreamDecoder;
    use crate::types::StreamChunk;

    const STREAM: &str = concat!(
        "event: message_start\n",
        "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"model\":\"claude-3-5-haiku-latest\"}}\n\n",
        "event: content_block_start\n",
        "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
        "event: ping\n",
        "data: {\"type\":\"ping\"}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Bonjour\"}}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\" le monde\"}}\n\n",
        "event: content_block_stop\n",
        "data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
        "event: message_delta\n",
        "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":4}}\n\n",
        "event: message_stop\n",
        "data: {\"type\":\"message_stop\"}\n\n",
    );

    #[test]
    fn typed_events_decode_to_deltas() {
        let mut decoder = AnthropicLineParser::decoder();
        let out: Vec<_> = decoder
            .feed(STREAM.as_bytes())
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(
            out,
            vec![
                StreamChunk::delta("Bonjour"),
                StreamChunk::delta(" le monde"),
                StreamChunk::terminal()
            ]
        );
        assert_eq!(decoder.skipped_lines(), 0);
    }

    #[test]
    fn overloaded_error_maps_to_529() {
        let mut decoder = AnthropicLineParser::decoder();
        let out = decoder.feed(
            b"event: error\ndata: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n",
        );
        assert_eq!(out.len(), 1);
        match &out[0] {
            Err(LlmError::UpstreamError { status, body }) => {
                assert_eq!(*status, 529);
                assert!(body.contains("Overloaded"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(decoder.is_terminated());
    }

    #[test]
    fn error_type_mapping() {
        assert_eq!(error_status("rate_limit_error"), 429);
        assert_eq!(error_status("authentication_error"), 401);
        assert_eq!(error_status("api_error"), 500);
        assert_eq!(error_status("something_new"), 500);
    }

    #[test]
    fn done_marker_is_terminal() {
        let mut decoder = AnthropicLineParser::decoder();
        let out: Vec<_> = decoder
            .feed(b"data: [DONE]\n")
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(out, vec![StreamChunk::terminal()]);
    }
}
