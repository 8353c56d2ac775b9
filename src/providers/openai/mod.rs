//! OpenAI chat-completions family
//!
//! Serves OpenAI itself plus every backend that speaks the same wire format:
//! DeepSeek, LM Studio and generic OpenAI-compatible local servers.

mod client;
pub mod streaming;
mod types;

pub use client::OpenAiClient;
pub use streaming::OpenAiLineParser;
