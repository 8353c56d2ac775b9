//! Per-request streaming state

use crate::retry::AttemptOutcome;
use crate::streaming::{Decoded, StreamDecoder};
use crate::types::{ProviderKind, StreamChunk};

/// State of one streaming request, across all of its attempts.
pub struct StreamSession {
    kind: ProviderKind,
    decoder: Option<Box<dyn StreamDecoder>>,
    content: String,
    chunks: u64,
    attempt_chunks: u64,
    attempts: u32,
    skipped_lines: u64,
}

/// What a finished session produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub provider: ProviderKind,
    /// Concatenation of every relayed delta
    pub content: String,
    /// Chunks received across all attempts, terminal chunks included
    pub chunks: u64,
    pub attempts: u32,
    /// Malformed lines skipped across all attempts
    pub skipped_lines: u64,
}

impl StreamSession {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            decoder: None,
            content: String::new(),
            chunks: 0,
            attempt_chunks: 0,
            attempts: 0,
            skipped_lines: 0,
        }
    }

    /// Start a new attempt with a fresh decoder.
    pub fn begin_attempt(&mut self, decoder: Box<dyn StreamDecoder>) {
        self.retire_decoder();
        self.decoder = Some(decoder);
        self.attempt_chunks = 0;
        self.attempts += 1;
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Decoded {
        self.decoder
            .as_mut()
            .map(|d| d.feed(bytes))
            .unwrap_or_default()
    }

    pub fn finish(&mut self) -> Decoded {
        self.decoder
            .as_mut()
            .map(|d| d.finish())
            .unwrap_or_default()
    }

    /// Account for a decoded chunk.
    pub fn record(&mut self, chunk: &StreamChunk) {
        self.chunks += 1;
        self.attempt_chunks += 1;
        self.content.push_str(&chunk.content);
    }

    /// Outcome of the current attempt, evaluated on its terminal chunk.
    pub fn outcome(&self) -> AttemptOutcome {
        AttemptOutcome {
            has_content: !self.content.is_empty(),
            terminal_was_first: self.attempt_chunks <= 1,
        }
    }

    /// Bytes the current decoder holds after its last complete line.
    pub fn remainder(&self) -> &[u8] {
        self.decoder.as_ref().map(|d| d.remainder()).unwrap_or(&[])
    }

    pub const fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub const fn chunks(&self) -> u64 {
        self.chunks
    }

    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn into_summary(mut self) -> StreamSummary {
        self.retire_decoder();
        StreamSummary {
            provider: self.kind,
            content: self.content,
            chunks: self.chunks,
            attempts: self.attempts,
            skipped_lines: self.skipped_lines,
        }
    }

    fn retire_decoder(&mut self) {
        if let Some(decoder) = self.decoder.take() {
            self.skipped_lines += decoder.skipped_lines();
        }
    }
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("kind", &self.kind)
            .field("content_len", &self.content.len())
            .field("chunks", &self.chunks)
            .field("attempts", &self.attempts)
            .field("remainder_len", &self.remainder().len())
            .finish()
    }
}
