//! Cold-start retry policy
//!
//! Local inference servers that are still loading a model can accept a
//! streaming request and immediately report completion without producing any
//! text. The same request usually succeeds a moment later, so for those
//! backends a content-free terminal chunk re-issues the request a bounded
//! number of times.
//!
//! The policy is a pure function over the observed outcome of an attempt; the
//! dispatcher owns the loop that acts on it.

use crate::error::LlmError;
use crate::types::ProviderKind;

/// Maximum number of re-attempts after the first request.
pub const MAX_RETRIES: u32 = 2;

/// Where a streaming request stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Attempt number `n` (0 for the first request) is in flight
    Attempting(u32),
    /// A terminal chunk arrived after some content
    Succeeded,
    /// An empty terminal chunk can no longer be retried
    Failed,
}

impl RetryState {
    pub const fn initial() -> Self {
        Self::Attempting(0)
    }

    pub const fn is_finished(&self) -> bool {
        !matches!(self, Self::Attempting(_))
    }
}

/// What the dispatcher saw when an attempt produced its terminal chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptOutcome {
    /// Any non-empty content accumulated in the session
    pub has_content: bool,
    /// The terminal chunk was the first chunk of this attempt
    pub terminal_was_first: bool,
}

/// Bounded re-attempt policy for a single backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    enabled: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            enabled: true,
        }
    }
}

impl RetryPolicy {
    /// Policy for `kind`: enabled only for backends with a cold start.
    pub fn for_kind(kind: ProviderKind) -> Self {
        Self {
            enabled: kind.has_cold_start(),
            ..Self::default()
        }
    }

    /// A policy that never re-attempts.
    pub const fn disabled() -> Self {
        Self {
            max_retries: 0,
            enabled: false,
        }
    }

    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub const fn max_retries(&self) -> u32 {
        if self.enabled { self.max_retries } else { 0 }
    }

    /// Next state after attempt `state` delivered its terminal chunk.
    ///
    /// Calling this on a finished state returns it unchanged.
    pub fn on_terminal(&self, state: RetryState, outcome: AttemptOutcome) -> RetryState {
        let RetryState::Attempting(n) = state else {
            return state;
        };
        if outcome.has_content {
            RetryState::Succeeded
        } else if outcome.terminal_was_first && n < self.max_retries() {
            RetryState::Attempting(n + 1)
        } else {
            RetryState::Failed
        }
    }

    /// Error reported when the policy ends in `Failed`.
    pub fn integrity_error(kind: ProviderKind, attempts: u32, chunks: u64) -> LlmError {
        LlmError::StreamIntegrityError {
            provider: kind,
            attempts,
            chunks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_FIRST: AttemptOutcome = AttemptOutcome {
        has_content: false,
        terminal_was_first: true,
    };
    const CONTENT: AttemptOutcome = AttemptOutcome {
        has_content: true,
        terminal_was_first: false,
    };

    #[test]
    fn content_succeeds() {
        let policy = RetryPolicy::for_kind(ProviderKind::Ollama);
        assert_eq!(
            policy.on_terminal(RetryState::initial(), CONTENT),
            RetryState::Succeeded
        );
    }

    #[test]
    fn empty_terminal_retries_up_to_max() {
        let policy = RetryPolicy::for_kind(ProviderKind::LmStudio);
        let mut state = RetryState::initial();
        let mut seen = vec![state];
        while !state.is_finished() {
            state = policy.on_terminal(state, EMPTY_FIRST);
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                RetryState::Attempting(0),
                RetryState::Attempting(1),
                RetryState::Attempting(2),
                RetryState::Failed
            ]
        );
    }

    #[test]
    fn empty_terminal_after_other_chunks_fails_immediately() {
        let policy = RetryPolicy::for_kind(ProviderKind::Ollama);
        let outcome = AttemptOutcome {
            has_content: false,
            terminal_was_first: false,
        };
        assert_eq!(
            policy.on_terminal(RetryState::initial(), outcome),
            RetryState::Failed
        );
    }

    #[test]
    fn hosted_backends_never_retry() {
        for kind in [ProviderKind::OpenAi, ProviderKind::Anthropic, ProviderKind::DeepSeek] {
            let policy = RetryPolicy::for_kind(kind);
            assert!(!policy.is_enabled());
            assert_eq!(
                policy.on_terminal(RetryState::initial(), EMPTY_FIRST),
                RetryState::Failed
            );
        }
    }

    #[test]
    fn finished_states_are_sticky() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.on_terminal(RetryState::Succeeded, EMPTY_FIRST),
            RetryState::Succeeded
        );
        assert_eq!(policy.on_terminal(RetryState::Failed, CONTENT), RetryState::Failed);
    }

    #[test]
    fn custom_bound() {
        let policy = RetryPolicy::default().with_max_retries(0);
        assert_eq!(
            policy.on_terminal(RetryState::initial(), EMPTY_FIRST),
            RetryState::Failed
        );
        assert!(RetryPolicy::disabled().max_retries() == 0);
    }
}
