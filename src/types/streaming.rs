//! Stream chunk type

use serde::{Deserialize, Serialize};

/// One unit of incremental content plus a terminal flag.
///
/// A stream is a finite sequence of chunks terminated by exactly one chunk
/// with `done == true`, or by an error in its place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub content: String,
    pub done: bool,
}

impl StreamChunk {
    /// A non-terminal content delta.
    pub fn delta(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            done: false,
        }
    }

    /// The terminal chunk.
    pub fn terminal() -> Self {
        Self {
            content: String::new(),
            done: true,
        }
    }

    pub const fn is_final(&self) -> bool {
        self.done
    }
}
