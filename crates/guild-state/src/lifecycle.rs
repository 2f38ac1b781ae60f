//! # Lifecycle Trait and Transition Log
//!
//! [`Lifecycle`] is implemented by every status enum. It supplies the
//! transition table; the default [`Lifecycle::transition_to`] validates a
//! move against it. [`StateTrail`] carries the current status together with
//! the append-only log of every transition it went through.

use serde::{Deserialize, Serialize};

use guild_core::Timestamp;

use crate::error::TransitionError;

/// A closed status enum with a transition table.
pub trait Lifecycle: Copy + Eq + std::fmt::Debug + 'static {
    /// Machine name used in error messages ("milestone", "escrow", ...).
    const MACHINE: &'static str;

    /// Lowercase wire name of this state.
    fn as_str(&self) -> &'static str;

    /// States reachable from this state in one move.
    fn valid_transitions(&self) -> &'static [Self];

    /// Whether no further transitions are possible.
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }

    /// Whether `self -> to` is in the table.
    fn can_transition_to(&self, to: Self) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Validate `self -> to` and return `to`.
    fn transition_to(self, to: Self) -> Result<Self, TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::TerminalState {
                machine: Self::MACHINE,
                state: self.as_str().to_string(),
            });
        }
        if !self.can_transition_to(to) {
            return Err(TransitionError::InvalidTransition {
                machine: Self::MACHINE,
                from: self.as_str().to_string(),
                attempted: to.as_str().to_string(),
            });
        }
        Ok(to)
    }
}

/// Record of a single status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord<S> {
    /// State before the transition.
    pub from_state: S,
    /// State after the transition.
    pub to_state: S,
    /// When the transition occurred.
    pub timestamp: Timestamp,
    /// Why the transition happened.
    pub reason: String,
}

/// A status together with its ordered transition history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTrail<S> {
    status: S,
    history: Vec<TransitionRecord<S>>,
}

impl<S: Lifecycle> StateTrail<S> {
    /// Start a trail in `initial` with empty history.
    pub fn new(initial: S) -> Self {
        Self {
            status: initial,
            history: Vec::new(),
        }
    }

    /// Current status.
    pub fn status(&self) -> S {
        self.status
    }

    /// All transitions in the order they happened.
    pub fn history(&self) -> &[TransitionRecord<S>] {
        &self.history
    }

    /// Validate and apply `status -> to`, appending a record.
    ///
    /// On error the trail is unchanged.
    pub fn advance(&mut self, to: S, reason: impl Into<String>) -> Result<(), TransitionError> {
        let next = self.status.transition_to(to)?;
        self.history.push(TransitionRecord {
            from_state: self.status,
            to_state: next,
            timestamp: Timestamp::now(),
            reason: reason.into(),
        });
        self.status = next;
        Ok(())
    }

    /// Fail with `TransitionError` unless the current status is one of `allowed`.
    pub fn require(&self, allowed: &[S], attempted: &str) -> Result<(), TransitionError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition {
                machine: S::MACHINE,
                from: self.status.as_str().to_string(),
                attempted: attempted.to_string(),
            })
        }
    }
}
