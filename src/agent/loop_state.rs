//! Agent loop state management
//!
//! Tracks iteration count and accumulated usage for one run.

use crate::core::{BuaError, Result};
use crate::llm::TokenUsage;

/// State of the turn loop
#[derive(Debug, Clone, Default)]
pub struct LoopState {
    /// Service calls issued so far
    pub iteration: usize,
    /// Upper bound on service calls, if any
    pub max_iterations: Option<usize>,
    /// Token usage summed over every response
    pub usage: TokenUsage,
}

impl LoopState {
    /// Create a new loop state with the given bound
    pub fn new(max_iterations: Option<usize>) -> Self {
        Self {
            iteration: 0,
            max_iterations,
            usage: TokenUsage::default(),
        }
    }

    /// Count the next service call, failing once the bound is spent
    pub fn begin_iteration(&mut self) -> Result<usize> {
        if let Some(limit) = self.max_iterations {
            if self.iteration >= limit {
                return Err(BuaError::IterationLimitExceeded { limit });
            }
        }
        self.iteration += 1;
        Ok(self.iteration)
    }

    /// Iterations left before the bound trips
    pub fn remaining(&self) -> Option<usize> {
        self.max_iterations
            .map(|limit| limit.saturating_sub(self.iteration))
    }

    pub fn record_usage(&mut self, usage: Option<&TokenUsage>) {
        if let Some(usage) = usage {
            self.usage.accumulate(usage);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_state_new() {
        let state = LoopState::new(Some(10));
        assert_eq!(state.iteration, 0);
        assert_eq!(state.remaining(), Some(10));
    }

    #[test]
    fn test_begin_iteration_stops_at_limit() {
        let mut state = LoopState::new(Some(2));
        assert_eq!(state.begin_iteration().unwrap(), 1);
        assert_eq!(state.begin_iteration().unwrap(), 2);
        assert!(matches!(
            state.begin_iteration(),
            Err(BuaError::IterationLimitExceeded { limit: 2 })
        ));
        assert_eq!(state.iteration, 2);
    }

    #[test]
    fn test_unbounded_by_default() {
        let mut state = LoopState::default();
        for _ in 0..1000 {
            state.begin_iteration().unwrap();
        }
        assert_eq!(state.remaining(), None);
    }

    #[test]
    fn test_usage_accumulates() {
        let mut state = LoopState::new(None);
        let usage = TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
            total_tokens: 15,
        };
        state.record_usage(Some(&usage));
        state.record_usage(None);
        state.record_usage(Some(&usage));
        assert_eq!(state.usage.total_tokens, 30);
    }
}
