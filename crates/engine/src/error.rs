//! The module contains the errors the engine can return.
//!
//! The errors are:
//!
//! - [`UnknownCell`] when a write targets a pair outside the current grid.
//! - [`Unmapped`] when a save would drop rows with no storage id.
//! - [`SharedStorage`] when a save would write two rows under one storage id.
//! - [`SaveInProgress`] when a second save is requested while one is pending.
//! - [`Backend`] when the planning service call itself failed.
//!
//!  [`UnknownCell`]: EngineError::UnknownCell
//!  [`Unmapped`]: EngineError::Unmapped
//!  [`SharedStorage`]: EngineError::SharedStorage
//!  [`SaveInProgress`]: EngineError::SaveInProgress
//!  [`Backend`]: EngineError::Backend
use std::fmt;

use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug, PartialEq)]
pub enum EngineError {
    #[error("\"{0}\" is not a cell of the current grid")]
    UnknownCell(String),
    #[error("\"{0}\" row not found!")]
    UnknownRow(String),
    #[error("rows without a storage id: {}", UnmappedList(.0))]
    Unmapped(Vec<UnmappedRow>),
    #[error(
        "rows share a storage id, give each a storage override: {}",
        UnmappedList(.0)
    )]
    SharedStorage(Vec<UnmappedRow>),
    #[error("a save is already in progress")]
    SaveInProgress,
    #[error("table is not ready: {0}")]
    NotReady(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// A row named by a refused save.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnmappedRow {
    pub row_id: String,
    pub label: String,
}

struct UnmappedList<'a>(&'a [UnmappedRow]);

impl fmt::Display for UnmappedList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, row) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} ({})", row.label, row.row_id)?;
        }
        Ok(())
    }
}

/// Failures reported by a [`PlanningBackend`](crate::PlanningBackend).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// No bearer token in the session. Not retryable.
    #[error("missing session token")]
    MissingToken,
    /// Connectivity failure; nothing reached the server.
    #[error("server unreachable: {0}")]
    Transport(String),
    /// Non-2xx response, carried verbatim.
    #[error("server rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// Response arrived but could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Whether a load failing this way may fall back to an empty snapshot.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
