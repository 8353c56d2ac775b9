//! Stream decoding
//!
//! Every backend family frames its streamed output differently, but all of
//! them are line oriented. [`FramedDecoder`] frames the body with
//! `tokio_util`'s [`LinesCodec`], owns terminal detection and end-of-stream
//! handling, and delegates the interpretation of each complete line to a
//! per-format [`LineParser`]. SSE `data:` fields are read off those same
//! lines with [`sse_data`]:
//!
//! - `providers::openai::streaming::OpenAiLineParser` for `data:` lines with `[DONE]`
//! - `providers::anthropic::streaming::AnthropicLineParser` for typed events
//! - `providers::ollama::streaming::OllamaLineParser` for one JSON record per line

use bytes::BytesMut;
use futures::Stream;
use futures_util::StreamExt;
use std::pin::Pin;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

use crate::error::LlmError;
use crate::http::ByteStream;
use crate::types::StreamChunk;

/// Stream of decoded chunks. Ends after the terminal chunk or the first error.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, LlmError>> + Send>>;

/// Decoder output for one feed call.
pub type Decoded = Vec<Result<StreamChunk, LlmError>>;

/// Incremental decoder turning raw body bytes into stream chunks.
pub trait StreamDecoder: Send {
    /// Consume a chunk of bytes and return every chunk it completes.
    fn feed(&mut self, bytes: &[u8]) -> Decoded;

    /// Signal end of body: parse a trailing partial line once, then make sure
    /// the stream is terminated.
    fn finish(&mut self) -> Decoded;

    /// Bytes buffered after the last complete line.
    fn remainder(&self) -> &[u8];

    /// Whether a terminal chunk or error has been produced.
    fn is_terminated(&self) -> bool;

    /// Number of lines that failed to parse and were skipped.
    fn skipped_lines(&self) -> u64;
}

/// What a single line means for the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    /// Blank, comment or non-data line
    Ignore,
    /// The line could not be parsed as the expected shape
    Malformed(String),
    /// Content (possibly empty) and whether the stream ends here
    Content { delta: String, terminal: bool },
    /// The backend reported an error in-band
    Error(LlmError),
}

impl LineEvent {
    pub fn delta(text: impl Into<String>) -> Self {
        Self::Content {
            delta: text.into(),
            terminal: false,
        }
    }

    pub fn terminal() -> Self {
        Self::Content {
            delta: String::new(),
            terminal: true,
        }
    }
}

/// Interprets one complete line of a wire format.
pub trait LineParser: Send {
    /// Short label used in log messages.
    fn label(&self) -> &'static str;

    fn parse_line(&mut self, line: &str) -> LineEvent;
}

/// Line-framed decoder state machine shared by every wire format.
#[derive(Debug)]
pub struct FramedDecoder<P> {
    buf: BytesMut,
    codec: LinesCodec,
    parser: P,
    terminated: bool,
    skipped: u64,
}

impl<P: LineParser> FramedDecoder<P> {
    pub fn new(parser: P) -> Self {
        Self {
            buf: BytesMut::new(),
            codec: LinesCodec::new(),
            parser,
            terminated: false,
            skipped: 0,
        }
    }

    fn handle_line(&mut self, line: &str, out: &mut Decoded) {
        match self.parser.parse_line(line) {
            LineEvent::Ignore => {}
            LineEvent::Malformed(reason) => {
                self.skipped += 1;
                tracing::warn!(
                    format = self.parser.label(),
                    line = %truncate(line, 200),
                    "skipping malformed stream line: {reason}"
                );
            }
            LineEvent::Content { delta, terminal } => {
                if !delta.is_empty() {
                    out.push(Ok(StreamChunk::delta(delta)));
                }
                if terminal {
                    out.push(Ok(StreamChunk::terminal()));
                    self.terminate();
                }
            }
            LineEvent::Error(err) => {
                out.push(Err(err));
                self.terminate();
            }
        }
    }

    /// The codec has already consumed the offending line.
    fn skip_undecodable(&mut self, err: &LinesCodecError) {
        self.skipped += 1;
        tracing::warn!(
            format = self.parser.label(),
            "skipping malformed stream line: {err}"
        );
    }

    fn terminate(&mut self) {
        self.terminated = true;
        self.buf.clear();
    }
}

impl<P: LineParser> StreamDecoder for FramedDecoder<P> {
    fn feed(&mut self, bytes: &[u8]) -> Decoded {
        let mut out = Vec::new();
        if self.terminated {
            return out;
        }
        self.buf.extend_from_slice(bytes);
        while !self.terminated {
            match self.codec.decode(&mut self.buf) {
                Ok(Some(line)) => self.handle_line(&line, &mut out),
                Ok(None) => break,
                Err(err) => self.skip_undecodable(&err),
            }
        }
        out
    }

    fn finish(&mut self) -> Decoded {
        let mut out = Vec::new();
        if self.terminated {
            return out;
        }
        while !self.terminated {
            match self.codec.decode_eof(&mut self.buf) {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => self.handle_line(&line, &mut out),
                Ok(None) => break,
                Err(err) => self.skip_undecodable(&err),
            }
        }
        if !self.terminated {
            tracing::debug!(
                format = self.parser.label(),
                "stream body ended without a terminal marker"
            );
            out.push(Ok(StreamChunk::terminal()));
            self.terminate();
        }
        out
    }

    fn remainder(&self) -> &[u8] {
        &self.buf
    }

    fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn skipped_lines(&self) -> u64 {
        self.skipped
    }
}

/// Drive a decoder over a response body.
///
/// Reading stops as soon as the decoder terminates, so the body (and its
/// connection) is dropped without draining the rest.
pub fn decode_stream(mut body: ByteStream, mut decoder: Box<dyn StreamDecoder>) -> ChunkStream {
    let stream = async_stream::stream! {
        loop {
            let decoded = match body.next().await {
                Some(Ok(bytes)) => decoder.feed(&bytes),
                Some(Err(e)) => {
                    yield Err(e);
                    return;
                }
                None => decoder.finish(),
            };
            for item in decoded {
                yield item;
            }
            if decoder.is_terminated() {
                return;
            }
        }
    };
    Box::pin(stream)
}

/// Payload of an SSE `data:` line. Other fields, comments and blank lines
/// yield `None`.
pub fn sse_data(line: &str) -> Option<&str> {
    let payload = line.strip_prefix("data:")?;
    Some(payload.strip_prefix(' ').unwrap_or(payload).trim_end())
}

fn truncate(line: &str, max_chars: usize) -> &str {
    match line.char_indices().nth(max_chars) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `+text` is a delta, `!` terminates, `?` is malformed, `x` is an error.
    struct ToyParser;

    impl LineParser for ToyParser {
        fn label(&self) -> &'static str {
            "toy"
        }

        fn parse_line(&mut self, line: &str) -> LineEvent {
            match line.as_bytes().first() {
                None => LineEvent::Ignore,
                Some(b'+') => LineEvent::delta(&line[1..]),
                Some(b'!') => LineEvent::terminal(),
                Some(b'x') => LineEvent::Error(LlmError::upstream(500, "boom")),
                _ => LineEvent::Malformed("unknown prefix".into()),
            }
        }
    }

    fn ok(items: Decoded) -> Vec<StreamChunk> {
        items.into_iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn emits_deltas_and_single_terminal() {
        let mut decoder = FramedDecoder::new(ToyParser);
        let out = ok(decoder.feed(b"+a\n\n+b\n!\n+ignored\n"));
        assert_eq!(
            out,
            vec![
                StreamChunk::delta("a"),
                StreamChunk::delta("b"),
                StreamChunk::terminal()
            ]
        );
        assert!(decoder.is_terminated());
        assert!(decoder.feed(b"+late\n").is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn malformed_lines_are_counted_and_skipped() {
        let mut decoder = FramedDecoder::new(ToyParser);
        let out = ok(decoder.feed(b"?junk\n+a\n"));
        assert_eq!(out, vec![StreamChunk::delta("a")]);
        assert_eq!(decoder.skipped_lines(), 1);
    }

    #[test]
    #[tracing_test::traced_test]
    fn malformed_lines_are_logged() {
        let mut decoder = FramedDecoder::new(ToyParser);
        assert!(decoder.feed(b"?junk\n").is_empty());
        assert!(logs_contain("skipping malformed stream line"));
        assert!(logs_contain("toy"));
    }

    #[test]
    fn finish_parses_trailing_partial_line() {
        let mut decoder = FramedDecoder::new(ToyParser);
        assert_eq!(ok(decoder.feed(b"+a\n+b")), vec![StreamChunk::delta("a")]);
        assert_eq!(decoder.remainder(), b"+b");
        assert_eq!(
            ok(decoder.finish()),
            vec![StreamChunk::delta("b"), StreamChunk::terminal()]
        );
    }

    #[test]
    fn invalid_utf8_line_is_skipped() {
        let mut decoder = FramedDecoder::new(ToyParser);
        let out = ok(decoder.feed(b"+a\xffb\n+c\n"));
        assert_eq!(out, vec![StreamChunk::delta("c")]);
        assert_eq!(decoder.skipped_lines(), 1);
    }

    #[test]
    #[tracing_test::traced_test]
    fn invalid_utf8_line_is_logged() {
        let mut decoder = FramedDecoder::new(ToyParser);
        assert!(decoder.feed(b"+\xc3\x28\n").is_empty());
        assert!(logs_contain("skipping malformed stream line"));
    }

    #[test]
    fn invalid_utf8_in_trailing_line_is_skipped() {
        let mut decoder = FramedDecoder::new(ToyParser);
        assert!(decoder.feed(b"+\xe4\xb8").is_empty());
        assert_eq!(ok(decoder.finish()), vec![StreamChunk::terminal()]);
        assert_eq!(decoder.skipped_lines(), 1);
    }

    #[test]
    fn crlf_and_multibyte_split_across_feeds() {
        let text = "+h\u{e9}llo \u{4e16}\u{754c}\r\n".as_bytes();
        // cut inside the 3-byte U+4E16
        let cut = "+h\u{e9}llo ".len() + 1;
        let mut decoder = FramedDecoder::new(ToyParser);
        assert!(decoder.feed(&text[..cut]).is_empty());
        assert_eq!(decoder.remainder(), &text[..cut]);
        assert_eq!(
            ok(decoder.feed(&text[cut..])),
            vec![StreamChunk::delta("h\u{e9}llo \u{4e16}\u{754c}")]
        );
        assert!(decoder.remainder().is_empty());
    }

    #[test]
    fn whitespace_remainder_is_not_a_line() {
        let mut decoder = FramedDecoder::new(ToyParser);
        assert_eq!(ok(decoder.feed(b"+a\n  ")), vec![StreamChunk::delta("a")]);
        assert_eq!(ok(decoder.finish()), vec![StreamChunk::terminal()]);
        assert_eq!(decoder.skipped_lines(), 0);
    }

    #[test]
    fn finish_synthesizes_terminal() {
        let mut decoder = FramedDecoder::new(ToyParser);
        assert!(decoder.feed(b"+a").is_empty());
        let out = ok(decoder.finish());
        assert_eq!(out, vec![StreamChunk::delta("a"), StreamChunk::terminal()]);
    }

    #[test]
    fn in_band_error_terminates() {
        let mut decoder = FramedDecoder::new(ToyParser);
        let out = decoder.feed(b"+a\nx\n!\n");
        assert_eq!(out.len(), 2);
        assert!(matches!(out[1], Err(LlmError::UpstreamError { status: 500, .. })));
        assert!(decoder.is_terminated());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn sse_data_extracts_payload() {
        assert_eq!(sse_data("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(sse_data("data:[DONE]"), Some("[DONE]"));
        assert_eq!(sse_data("event: message_stop"), None);
        assert_eq!(sse_data(": keep-alive"), None);
        assert_eq!(sse_data(""), None);
    }

    #[tokio::test]
    async fn decode_stream_stops_reading_after_terminal() {
        use bytes::Bytes;
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let parts = vec!["+a\n", "!\n", "+b\n", "+c\n"];
        let body = futures::stream::iter(parts).map(move |p| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, LlmError>(Bytes::from_static(p.as_bytes()))
        });

        let chunks: Vec<_> = decode_stream(Box::pin(body), Box::new(FramedDecoder::new(ToyParser)))
            .collect()
            .await;

        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].as_ref().unwrap().done);
        assert_eq!(pulled.load(Ordering::SeqCst), 2);
    }
}
