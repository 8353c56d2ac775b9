//! # llm-relay
//!
//! One completion contract over several interchangeable LLM backends: hosted
//! APIs (OpenAI, Anthropic, DeepSeek) and local servers (Ollama, LM Studio,
//! any OpenAI-compatible server).
//!
//! ## Layout
//!
//! - [`providers`]: one [`ProviderClient`](providers::ProviderClient) per backend family
//! - [`streaming`]: line-framed decoders for the three streaming wire formats
//! - [`retry`]: cold-start re-attempt policy for local servers
//! - [`dispatcher`]: resolves, configures and drives a request end to end
//! - [`registry`]: per-kind client cache
//! - [`channel`] and [`protocol`]: caller-facing message shapes and the `llm_stream` channel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use llm_relay::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), LlmError> {
//!     let dispatcher = Dispatcher::new(Arc::new(ProviderRegistry::default()));
//!
//!     let config = ProviderConfig::new(ProviderKind::Ollama)
//!         .with_endpoint("http://localhost:11434")
//!         .with_model("llama3.2");
//!     let work = UnitOfWork::new(config, CompletionRequest::new("Why is the sky blue?"));
//!     let result = dispatcher.complete(&work).await?;
//!     println!("{} ({} tokens)", result.content, result.usage.total_tokens);
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use llm_relay::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), LlmError> {
//!     // OLLAMA_HOST names the local server
//!     let dispatcher = Arc::new(
//!         Dispatcher::new(Arc::new(ProviderRegistry::default()))
//!             .with_config_store(Arc::new(EnvConfigStore::from_env())),
//!     );
//!     let (mut caller, service) = channel::duplex(channel::DEFAULT_CAPACITY);
//!     tokio::spawn({
//!         let dispatcher = dispatcher.clone();
//!         async move { dispatcher.serve_stream(service).await }
//!     });
//!
//!     caller
//!         .request(ProcessContent::new("ollama", "summarize").with_content("...").with_stream(true))
//!         .await?;
//!     while let Some(message) = caller.recv().await {
//!         let done = message.is_terminal();
//!         println!("{message:?}");
//!         if done {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]

pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod prompt;
pub mod protocol;
pub mod providers;
pub mod registry;
pub mod retry;
pub mod streaming;
pub mod telemetry;
pub mod types;

pub use error::{ErrorCategory, LlmError, LlmResult};

pub mod prelude {
    pub use crate::channel::{self, CallerPort, ServicePort};
    pub use crate::config::{ConfigStore, EnvConfigStore, MemoryConfigStore};
    pub use crate::dispatcher::{ConfigSource, Dispatcher, StreamSummary, UnitOfWork};
    pub use crate::error::{ErrorCategory, LlmError, LlmResult};
    pub use crate::protocol::{InboundMessage, OutboundMessage, ProcessContent, Reply};
    pub use crate::providers::{ClientSettings, ProviderClient};
    pub use crate::registry::ProviderRegistry;
    pub use crate::types::{
        CompletionOptions, CompletionRequest, CompletionResult, ProviderConfig, ProviderKind,
        StreamChunk, Usage,
    };
}
