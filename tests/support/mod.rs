//! Shared helpers for integration tests: fixtures, decoder drivers and
//! scripted transports.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use llm_relay::LlmError;
use llm_relay::http::{
    HttpStreamResponse, HttpTransport, HttpTransportRequest, HttpTransportResponse,
};
use llm_relay::streaming::StreamDecoder;
use llm_relay::types::StreamChunk;

/// Read a file from `tests/fixtures`.
pub fn fixture(name: &str) -> Vec<u8> {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    std::fs::read(&path).unwrap_or_else(|e| panic!("fixture {path}: {e}"))
}

/// Feed `parts` through `decoder`, then finish it.
pub fn decode_parts(
    mut decoder: Box<dyn StreamDecoder>,
    parts: &[&[u8]],
) -> Vec<Result<StreamChunk, LlmError>> {
    let mut out = Vec::new();
    for part in parts {
        out.extend(decoder.feed(part));
    }
    out.extend(decoder.finish());
    out
}

/// Decode `body` fed as a single chunk.
pub fn decode_whole(decoder: Box<dyn StreamDecoder>, body: &[u8]) -> Vec<Result<StreamChunk, LlmError>> {
    decode_parts(decoder, &[body])
}

/// Concatenated content of decoded chunks.
pub fn joined(chunks: &[Result<StreamChunk, LlmError>]) -> String {
    chunks
        .iter()
        .filter_map(|c| c.as_ref().ok())
        .map(|c| c.content.as_str())
        .collect()
}

/// One scripted reply of a [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    pub status: u16,
    pub parts: Vec<Vec<u8>>,
    /// Keep the body open after the last part instead of ending it
    pub hang: bool,
}

impl ScriptedReply {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            parts: vec![body.into()],
            hang: false,
        }
    }

    pub fn parts(parts: Vec<Vec<u8>>) -> Self {
        Self {
            status: 200,
            parts,
            hang: false,
        }
    }

    pub fn status(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            parts: vec![body.into()],
            hang: false,
        }
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }
}

/// Transport replaying scripted replies in order and recording every request.
///
/// Requests beyond the script fail with `HttpError`.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<HttpTransportRequest>>,
    calls: AtomicUsize,
    bodies_dropped: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        })
    }

    /// A transport that must never be called.
    pub fn empty() -> Arc<Self> {
        Self::new([])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HttpTransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of streaming bodies that have been dropped.
    pub fn bodies_dropped(&self) -> usize {
        self.bodies_dropped.load(Ordering::SeqCst)
    }

    fn next(&self, request: HttpTransportRequest) -> Result<ScriptedReply, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::HttpError("no scripted reply left".into()))
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute_json(
        &self,
        request: HttpTransportRequest,
    ) -> Result<HttpTransportResponse, LlmError> {
        let reply = self.next(request)?;
        Ok(HttpTransportResponse {
            status: reply.status,
            body: reply.parts.concat(),
        })
    }

    async fn execute_stream(
        &self,
        request: HttpTransportRequest,
    ) -> Result<HttpStreamResponse, LlmError> {
        let reply = self.next(request)?;
        let body = ScriptedBody {
            parts: reply.parts.into_iter().map(Bytes::from).collect(),
            hang: reply.hang,
            dropped: Arc::clone(&self.bodies_dropped),
        };
        Ok(HttpStreamResponse {
            status: reply.status,
            body: Box::pin(body),
        })
    }
}

/// Body stream that counts its own drop.
struct ScriptedBody {
    parts: VecDeque<Bytes>,
    hang: bool,
    dropped: Arc<AtomicUsize>,
}

impl Stream for ScriptedBody {
    type Item = Result<Bytes, LlmError>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.parts.pop_front() {
            Some(part) => Poll::Ready(Some(Ok(part))),
            None if self.hang => Poll::Pending,
            None => Poll::Ready(None),
        }
    }
}

impl Drop for ScriptedBody {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Ollama record helpers.
pub fn ollama_line(response: &str, done: bool) -> String {
    format!("{{\"model\":\"llama3.2\",\"response\":{},\"done\":{done}}}\n", serde_json::json!(response))
}

/// An Ollama stream that ends immediately with an empty `done` record.
pub fn ollama_cold_start() -> ScriptedReply {
    ScriptedReply::ok(ollama_line("", true))
}

/// An Ollama stream producing `text` in two deltas.
pub fn ollama_content(text: &str) -> ScriptedReply {
    let mid = text
        .char_indices()
        .nth(text.chars().count() / 2)
        .map_or(text.len(), |(i, _)| i);
    let (a, b) = text.split_at(mid);
    ScriptedReply::parts(vec![
        ollama_line(a, false).into_bytes(),
        ollama_line(b, false).into_bytes(),
        ollama_line("", true).into_bytes(),
    ])
}
