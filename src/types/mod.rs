//! Core data model
//!
//! Backend-independent request, result and stream types, plus the provider
//! configuration record consumed from the configuration collaborator.

mod completion;
mod config;
mod provider;
mod streaming;

pub use completion::{CompletionOptions, CompletionRequest, CompletionResult, Usage};
pub use config::ProviderConfig;
pub use provider::{ProviderKind, WireFormat};
pub use streaming::StreamChunk;
