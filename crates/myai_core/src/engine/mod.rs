//! AI action engines.
//!
//! # Responsibility
//! - Run one expansion or one regeneration against a `CompletionClient`.
//! - Validate every precondition before the network call and every reply
//!   before producing text.
//!
//! # Invariants
//! - Engines never touch persistence; they return the text to store.
//! - Each engine owns its own `BusyGate`; a call made while the engine is
//!   `InFlight` returns `EngineOutcome::Skipped` without side effects.
//!
//! # See also
//! - `crate::session` for persistence and status reporting.

pub mod expand;
pub mod gate;
pub mod regenerate;
pub mod splice;

pub use expand::ExpansionEngine;
pub use gate::{BusyGate, EngineOutcome, EngineState};
pub use regenerate::RegenerationEngine;
pub use splice::{splice, SpliceError};

use crate::ai::error::ProviderError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-level failure. `Display` is the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Note text is empty after trim.
    EmptyNote,
    /// Selection is absent or whitespace-only.
    NoSelection,
    /// Selection text could not be mapped to offsets in the note.
    UnmappableSelection,
    /// Provider call failed.
    Provider(ProviderError),
    /// Provider replied with blank text.
    EmptyResponse,
    /// Located span does not fit the captured context.
    Splice(SpliceError),
}

impl EngineError {
    /// Stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyNote => "empty_note",
            Self::NoSelection => "no_selection",
            Self::UnmappableSelection => "unmappable_selection",
            Self::Provider(err) => err.code(),
            Self::EmptyResponse => "empty_response",
            Self::Splice(_) => "invalid_span",
        }
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyNote => write!(f, "Please write something first."),
            Self::NoSelection => write!(f, "Highlight a portion of the note to regenerate it."),
            Self::UnmappableSelection => write!(
                f,
                "Unable to map the selected text back to the saved note. Try selecting the text from the editor view."
            ),
            Self::Provider(err) => write!(f, "{err}"),
            Self::EmptyResponse => {
                write!(f, "The AI response did not contain any content to insert.")
            }
            Self::Splice(err) => write!(f, "Unable to apply the regenerated section: {err}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Provider(err) => Some(err),
            Self::Splice(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProviderError> for EngineError {
    fn from(value: ProviderError) -> Self {
        Self::Provider(value)
    }
}

impl From<SpliceError> for EngineError {
    fn from(value: SpliceError) -> Self {
        Self::Splice(value)
    }
}
