//! Odontogram editor sessions.
//!
//! Lifecycle: `Loading → Ready → Saving → Ready`, with `Aborted` when the chart cannot be
//! opened and `Closed` once the clinician leaves. All edits stay local to the session until
//! a save succeeds.

mod session;

pub use session::*;

use std::fmt;

use thiserror::Error;

use crate::models::ChartError;
use crate::store::StoreError;

/// Why a session never became editable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// Missing route parameters, or the chart does not exist
    NotFound,
    /// The store could not be reached while loading
    LoadFailed(String),
}

/// Current phase of an editor session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorPhase {
    Loading,
    Ready,
    Saving,
    Aborted(AbortReason),
    Closed,
}

impl EditorPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EditorPhase::Aborted(_) | EditorPhase::Closed)
    }
}

impl fmt::Display for EditorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditorPhase::Loading => f.write_str("loading"),
            EditorPhase::Ready => f.write_str("ready"),
            EditorPhase::Saving => f.write_str("saving"),
            EditorPhase::Aborted(AbortReason::NotFound) => f.write_str("aborted (not found)"),
            EditorPhase::Aborted(AbortReason::LoadFailed(e)) => write!(f, "aborted ({})", e),
            EditorPhase::Closed => f.write_str("closed"),
        }
    }
}

/// Editor errors.
#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Cannot open this chart: {patient_id}/{odontogram_id}")]
    NotFound {
        patient_id: String,
        odontogram_id: String,
    },

    #[error("Editor is {0}, not ready")]
    NotReady(EditorPhase),

    #[error("A save is already in progress")]
    SaveInProgress,

    #[error("Save failed: {0}")]
    SaveFailed(#[source] StoreError),

    #[error("Invalid chart input: {0}")]
    Chart(#[from] ChartError),
}

pub type EditorResult<T> = Result<T, EditorError>;

/// What leaving the editor did to local edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Nothing unsaved
    Clean,
    /// Unsaved local edits were thrown away; the stored chart is unchanged
    DiscardedEdits,
}
