//! Single-flight gate shared by the AI actions.
//!
//! # Invariants
//! - At most one guarded operation is `InFlight` at a time per gate.
//! - Dropping the guard always returns the gate to `Idle`, on success,
//!   error, or cancellation of the owning future.

use std::sync::{Mutex, PoisonError};

/// Lifecycle state of an engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EngineState {
    #[default]
    Idle,
    InFlight,
}

/// Result of an engine action that may be skipped under re-entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutcome<T> {
    /// The action ran and produced a value.
    Completed(T),
    /// Another action was already in flight; nothing was done.
    Skipped,
}

impl<T> EngineOutcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// Mutex-backed Idle/InFlight flag.
#[derive(Debug, Default)]
pub struct BusyGate {
    state: Mutex<EngineState>,
}

impl BusyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `Idle -> InFlight`, or returns `None` when already busy.
    pub fn try_enter(&self) -> Option<InFlightGuard<'_>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == EngineState::InFlight {
            return None;
        }
        *state = EngineState::InFlight;
        Some(InFlightGuard { gate: self })
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_busy(&self) -> bool {
        self.state() == EngineState::InFlight
    }
}

/// Holds the gate in `InFlight` until dropped.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    gate: &'a BusyGate,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = self
            .gate
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *state = EngineState::Idle;
    }
}
