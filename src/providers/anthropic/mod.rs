//! Anthropic Messages API

mod client;
pub mod streaming;
mod types;

pub use client::AnthropicClient;
pub use streaming::AnthropicLineParser;

/// Value sent in the `anthropic-version` header.
pub const API_VERSION: &str = "2023-06-01";

/// `max_tokens` is mandatory for this API; used when neither the request nor
/// the configured defaults set it.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
