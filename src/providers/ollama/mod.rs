//! Ollama generate API

mod client;
pub mod streaming;
mod types;

pub use client::OllamaClient;
pub use streaming::OllamaLineParser;
