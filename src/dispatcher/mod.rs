//! Request dispatcher
//!
//! Resolves the provider client for a unit of work, configures it and either
//! awaits a one-shot completion or drives a streaming session, relaying every
//! decoded chunk to the caller as it arrives.
//!
//! Streaming requests to local servers go through the cold-start
//! [`RetryPolicy`]: a stream that ends before producing any text is re-issued
//! a bounded number of times. The terminal chunk of an attempt that is retried
//! is never relayed, so the caller sees exactly one terminal message per
//! request.

mod session;

pub use session::{StreamSession, StreamSummary};

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::channel::{STREAM_CHANNEL_NAME, ServicePort};
use crate::config::{ConfigStore, MemoryConfigStore};
use crate::error::LlmError;
use crate::http::ByteStream;
use crate::prompt;
use crate::protocol::{InboundMessage, OutboundMessage, ProcessContent, Reply};
use crate::providers::{ClientSettings, ProviderClient};
use crate::registry::ProviderRegistry;
use crate::retry::{RetryPolicy, RetryState};
use crate::types::{CompletionRequest, CompletionResult, ProviderConfig, ProviderKind, StreamChunk};

/// Where the configuration of a unit of work comes from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Carried by the request itself
    Inline(ProviderConfig),
    /// Looked up in the configuration store; missing keys fall back to the
    /// backend's defaults
    Lookup(String),
}

/// One request handed to the dispatcher.
#[derive(Debug, Clone)]
pub struct UnitOfWork {
    pub kind: ProviderKind,
    pub request: CompletionRequest,
    pub stream: bool,
    pub config: ConfigSource,
}

impl UnitOfWork {
    /// Work configured inline.
    pub fn new(config: ProviderConfig, request: CompletionRequest) -> Self {
        Self {
            kind: config.kind,
            request,
            stream: false,
            config: ConfigSource::Inline(config),
        }
    }

    /// Work whose configuration is looked up under `key`.
    pub fn lookup(kind: ProviderKind, key: impl Into<String>, request: CompletionRequest) -> Self {
        Self {
            kind,
            request,
            stream: false,
            config: ConfigSource::Lookup(key.into()),
        }
    }

    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// Entry point between callers and provider clients.
pub struct Dispatcher {
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn ConfigStore>,
    max_retries: Option<u32>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            store: Arc::new(MemoryConfigStore::new()),
            max_retries: None,
        }
    }

    /// Use `store` for configuration lookups.
    pub fn with_config_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.store = store;
        self
    }

    /// Override the cold-start retry bound (defaults to [`crate::retry::MAX_RETRIES`]).
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    fn retry_policy(&self, kind: ProviderKind) -> RetryPolicy {
        let policy = RetryPolicy::for_kind(kind);
        match self.max_retries {
            Some(max) => policy.with_max_retries(max),
            None => policy,
        }
    }

    fn resolve_config(&self, work: &UnitOfWork) -> ProviderConfig {
        match &work.config {
            ConfigSource::Inline(config) => config.clone(),
            ConfigSource::Lookup(key) => self.store.get(key).unwrap_or_else(|| {
                tracing::debug!(key = %key, provider = %work.kind, "no stored configuration for key");
                ProviderConfig::new(work.kind)
            }),
        }
    }

    /// Resolve and configure the client. Fails before any network activity.
    fn prepare(
        &self,
        work: &UnitOfWork,
    ) -> Result<(Arc<dyn ProviderClient>, ClientSettings), LlmError> {
        let config = self.resolve_config(work);
        let client = self.registry.resolve(work.kind);
        let settings = client.configure(&config)?;
        Ok((client, settings))
    }

    /// One-shot completion.
    pub async fn complete(&self, work: &UnitOfWork) -> Result<CompletionResult, LlmError> {
        let (client, settings) = self.prepare(work)?;
        tracing::debug!(provider = %work.kind, model = %settings.model, "dispatching completion");
        client
            .complete(&settings, &work.request)
            .await
            .inspect_err(|e| tracing::error!(provider = %work.kind, "completion failed: {e}"))
    }

    /// Streaming completion relayed into `sink`.
    ///
    /// On success the real terminal chunk is the last message sent. On failure
    /// exactly one `STREAM_ERROR` is sent in its place. When the caller cancels
    /// or closes the sink nothing further is sent and `CancellationError` is
    /// returned. The response body is dropped on every path.
    pub async fn stream(
        &self,
        work: &UnitOfWork,
        sink: &mpsc::Sender<OutboundMessage>,
        cancel: &CancellationToken,
    ) -> Result<StreamSummary, LlmError> {
        let result = self.run_stream(work, sink, cancel).await;
        match &result {
            Ok(summary) => tracing::debug!(
                provider = %work.kind,
                attempts = summary.attempts,
                chunks = summary.chunks,
                "stream completed"
            ),
            Err(LlmError::CancellationError(reason)) => {
                tracing::debug!(provider = %work.kind, "stream cancelled: {reason}");
            }
            Err(e) => {
                tracing::error!(provider = %work.kind, "stream failed: {e}");
                let message = OutboundMessage::error(e.user_message(work.kind));
                // the caller may already be gone; nothing else to report to
                let _ = relay(sink, cancel, message).await;
            }
        }
        result
    }

    async fn run_stream(
        &self,
        work: &UnitOfWork,
        sink: &mpsc::Sender<OutboundMessage>,
        cancel: &CancellationToken,
    ) -> Result<StreamSummary, LlmError> {
        let (client, settings) = self.prepare(work)?;
        let policy = self.retry_policy(work.kind);
        let mut session = StreamSession::new(work.kind);
        let mut state = RetryState::initial();

        while let RetryState::Attempting(n) = state {
            session.begin_attempt(client.decoder());
            tracing::debug!(provider = %work.kind, model = %settings.model, attempt = n, "opening stream");

            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled("caller cancelled the request")),
                opened = client.open_stream(&settings, &work.request) => opened?,
            };
            let terminal = pump(&mut session, body, sink, cancel).await?;

            state = policy.on_terminal(state, session.outcome());
            match state {
                RetryState::Succeeded => {
                    relay(sink, cancel, terminal.into()).await?;
                }
                RetryState::Attempting(next) => {
                    tracing::warn!(
                        provider = %work.kind,
                        attempt = next,
                        "stream ended without content, retrying"
                    );
                }
                RetryState::Failed => {
                    return Err(RetryPolicy::integrity_error(
                        work.kind,
                        session.attempts(),
                        session.chunks(),
                    ));
                }
            }
        }
        Ok(session.into_summary())
    }

    /// Answer a `PROCESS_CONTENT` message with a `{content}` or `{error}` reply.
    pub async fn handle_message(&self, message: InboundMessage) -> Reply {
        let InboundMessage::ProcessContent(body) = message;
        let provider = body.provider.clone();
        match self.process(body).await {
            Ok(result) => Reply::Content {
                content: result.content,
            },
            Err((kind, e)) => Reply::Error {
                error: error_text(&e, kind.or_else(|| provider.parse().ok())),
            },
        }
    }

    async fn process(
        &self,
        body: ProcessContent,
    ) -> Result<CompletionResult, (Option<ProviderKind>, LlmError)> {
        if body.stream {
            return Err((
                None,
                LlmError::ValidationError(format!(
                    "streaming requests must use the {STREAM_CHANNEL_NAME} channel"
                )),
            ));
        }
        let work = self.work_from_message(body).map_err(|e| (None, e))?;
        self.complete(&work).await.map_err(|e| (Some(work.kind), e))
    }

    /// Serve streaming requests arriving on `port` until the caller goes away.
    pub async fn serve_stream(&self, mut port: ServicePort) {
        while let Some(InboundMessage::ProcessContent(body)) = port.next_request().await {
            let provider = body.provider.clone();
            match self.work_from_message(body) {
                Ok(work) => {
                    let work = work.streaming(true);
                    // failures were already relayed as STREAM_ERROR
                    let _ = self.stream(&work, port.sender(), port.cancellation()).await;
                }
                Err(e) => {
                    let text = error_text(&e, provider.parse().ok());
                    let _ = relay(port.sender(), port.cancellation(), OutboundMessage::error(text))
                        .await;
                }
            }
        }
        tracing::debug!(channel = port.name(), "stream channel closed");
    }

    /// Build a unit of work from a message: inline config first, then the
    /// store, then the provider name as a kind with default settings.
    pub fn work_from_message(&self, body: ProcessContent) -> Result<UnitOfWork, LlmError> {
        let request = prompt::compose(&body.command, &body.content, &body.title)?;
        let work = match body.config {
            Some(config) => UnitOfWork::new(config, request),
            None => {
                let kind = match self.store.get(&body.provider) {
                    Some(config) => config.kind,
                    None => body.provider.parse()?,
                };
                UnitOfWork::lookup(kind, body.provider, request)
            }
        };
        Ok(work.streaming(body.stream))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("config_keys", &self.store.keys())
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

fn error_text(error: &LlmError, kind: Option<ProviderKind>) -> String {
    match kind {
        Some(kind) => error.user_message(kind),
        None => error.to_string(),
    }
}

fn cancelled(reason: &str) -> LlmError {
    LlmError::CancellationError(reason.to_string())
}

/// Send one message, giving up if the caller cancels or goes away.
async fn relay(
    sink: &mpsc::Sender<OutboundMessage>,
    cancel: &CancellationToken,
    message: OutboundMessage,
) -> Result<(), LlmError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(cancelled("caller cancelled the request")),
        sent = sink.send(message) => sent.map_err(|_| cancelled("caller closed the channel")),
    }
}

/// Read one attempt's body until its terminal chunk.
///
/// Deltas are relayed immediately; the terminal chunk is returned so the
/// caller can decide whether to relay it or retry. The body is owned by this
/// scope and dropped on every return.
async fn pump(
    session: &mut StreamSession,
    mut body: ByteStream,
    sink: &mpsc::Sender<OutboundMessage>,
    cancel: &CancellationToken,
) -> Result<StreamChunk, LlmError> {
    loop {
        let (decoded, ended) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled("caller cancelled the request")),
            _ = sink.closed() => return Err(cancelled("caller closed the channel")),
            next = body.next() => match next {
                Some(Ok(bytes)) => (session.feed(&bytes), false),
                Some(Err(e)) => return Err(e),
                None => (session.finish(), true),
            },
        };

        for item in decoded {
            let chunk = item?;
            session.record(&chunk);
            if chunk.is_final() {
                return Ok(chunk);
            }
            relay(sink, cancel, chunk.into()).await?;
        }
        if ended {
            return Err(LlmError::ParseError(format!(
                "{} stream ended without a terminal chunk",
                session.kind()
            )));
        }
    }
}
