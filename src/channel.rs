//! Duplex streaming channel
//!
//! A caller and the dispatcher talk over a pair of bounded queues: the caller
//! sends `PROCESS_CONTENT` requests and receives `STREAM_CHUNK` /
//! `STREAM_ERROR` messages. Only one stream may be in flight per channel; the
//! caller end rejects a second request until the first one has reached its
//! terminal message.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::LlmError;
use crate::protocol::{InboundMessage, OutboundMessage};

/// Name of the streaming channel.
pub const STREAM_CHANNEL_NAME: &str = "llm_stream";

/// Default queue depth for each direction.
pub const DEFAULT_CAPACITY: usize = 64;

/// Open a channel; returns the caller end and the service end.
pub fn duplex(capacity: usize) -> (CallerPort, ServicePort) {
    let (inbound_tx, inbound_rx) = mpsc::channel(capacity.max(1));
    let (outbound_tx, outbound_rx) = mpsc::channel(capacity.max(1));
    let busy = Arc::new(AtomicBool::new(false));
    let cancel = CancellationToken::new();
    (
        CallerPort {
            inbound: inbound_tx,
            outbound: outbound_rx,
            busy,
            cancel: cancel.clone(),
        },
        ServicePort {
            inbound: inbound_rx,
            outbound: outbound_tx,
            cancel,
        },
    )
}

/// Caller end of a streaming channel.
///
/// Dropping it cancels any stream still being served.
#[derive(Debug)]
pub struct CallerPort {
    inbound: mpsc::Sender<InboundMessage>,
    outbound: mpsc::Receiver<OutboundMessage>,
    busy: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl CallerPort {
    pub const fn name(&self) -> &'static str {
        STREAM_CHANNEL_NAME
    }

    /// Submit a request.
    ///
    /// Fails with `ValidationError` while a previous stream on this channel
    /// has not reached its terminal message.
    pub async fn request(&self, message: impl Into<InboundMessage>) -> Result<(), LlmError> {
        if self.cancel.is_cancelled() {
            return Err(LlmError::CancellationError(format!(
                "{STREAM_CHANNEL_NAME} channel was cancelled"
            )));
        }
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(LlmError::ValidationError(format!(
                "{STREAM_CHANNEL_NAME} channel already has an active stream"
            )));
        }
        if self.inbound.send(message.into()).await.is_err() {
            self.busy.store(false, Ordering::Release);
            return Err(LlmError::CancellationError(format!(
                "{STREAM_CHANNEL_NAME} channel is closed"
            )));
        }
        Ok(())
    }

    /// Next message from the service. Returns `None` once the service end is gone.
    pub async fn recv(&mut self) -> Option<OutboundMessage> {
        let message = self.outbound.recv().await?;
        if message.is_terminal() {
            self.busy.store(false, Ordering::Release);
        }
        Some(message)
    }

    /// Abandon the channel. The service stops reading the backend response and
    /// emits nothing further.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for CallerPort {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Service end of a streaming channel, consumed by the dispatcher.
#[derive(Debug)]
pub struct ServicePort {
    inbound: mpsc::Receiver<InboundMessage>,
    outbound: mpsc::Sender<OutboundMessage>,
    cancel: CancellationToken,
}

impl ServicePort {
    pub const fn name(&self) -> &'static str {
        STREAM_CHANNEL_NAME
    }

    /// Wait for the next request. `None` when the caller is gone or cancelled.
    pub async fn next_request(&mut self) -> Option<InboundMessage> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            message = self.inbound.recv() => message,
        }
    }

    /// Sender used to relay messages to the caller.
    pub fn sender(&self) -> &mpsc::Sender<OutboundMessage> {
        &self.outbound
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}
