//! # Transition Errors

use thiserror::Error;

/// A status transition was attempted that the machine's table does not allow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The move is not in the transition table for the current state.
    #[error("invalid {machine} transition: {from} -> {attempted}")]
    InvalidTransition {
        /// Name of the state machine.
        machine: &'static str,
        /// Current state.
        from: String,
        /// Target state or trigger that was attempted.
        attempted: String,
    },

    /// The machine is in a terminal state and accepts no further moves.
    #[error("{machine} is in terminal state {state}")]
    TerminalState {
        /// Name of the state machine.
        machine: &'static str,
        /// The terminal state.
        state: String,
    },
}

impl TransitionError {
    /// The state the machine was in when the move was rejected.
    pub fn current_state(&self) -> &str {
        match self {
            Self::InvalidTransition { from, .. } => from,
            Self::TerminalState { state, .. } => state,
        }
    }
}
