//! Error Handling Module
//!
//! This module provides the error taxonomy shared by every layer of the crate:
//! - Core error type (`LlmError`) and its coarse `ErrorCategory`
//! - User-facing message helpers for reply channels
//!
//! # Example
//!
//! ```rust
//! use llm_relay::error::{ErrorCategory, LlmError};
//!
//! let error = LlmError::upstream(404, "Not found");
//! assert_eq!(error.category(), ErrorCategory::Upstream);
//! assert!(!error.is_retryable());
//! ```

pub mod helpers;
pub mod types;

pub use helpers::*;
pub use types::*;
