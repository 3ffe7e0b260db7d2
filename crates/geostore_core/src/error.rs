//! Core error taxonomy and last-error diagnostics.
//!
//! # Responsibility
//! - Define the operation-outcome kinds shared by catalog, store and map
//!   layers.
//! - Mirror every constructed error into a process-wide slot for
//!   diagnostic retrieval by callers that only see a boolean outcome.
//!
//! # Invariants
//! - Public APIs return `CoreResult`; they never panic across the crate
//!   boundary.
//! - Recoverable conditions (unresolvable path, empty container) degrade
//!   to empty results instead of errors.

use once_cell::sync::Lazy;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Mutex;

pub type CoreResult<T> = Result<T, CoreError>;

/// Outcome kind for failed operations.
///
/// `Warning` is special: it is reported through the progress channel and
/// recorded in the last-error slot, but operations carrying a warning
/// still succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    CreateFailed,
    OpenFailed,
    SaveFailed,
    DeleteFailed,
    RenameFailed,
    MoveFailed,
    CopyFailed,
    Unsupported,
    Canceled,
    Warning,
}

impl ErrorKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::InvalidArgument => "invalid argument",
            Self::CreateFailed => "create failed",
            Self::OpenFailed => "open failed",
            Self::SaveFailed => "save failed",
            Self::DeleteFailed => "delete failed",
            Self::RenameFailed => "rename failed",
            Self::MoveFailed => "move failed",
            Self::CopyFailed => "copy failed",
            Self::Unsupported => "unsupported",
            Self::Canceled => "canceled",
            Self::Warning => "warning",
        }
    }
}

/// Error value carried by every failing core operation.
#[derive(Debug, Clone)]
pub struct CoreError {
    kind: ErrorKind,
    message: String,
}

static LAST_ERROR: Lazy<Mutex<Option<(ErrorKind, String)>>> = Lazy::new(|| Mutex::new(None));

impl CoreError {
    /// Creates an error and records it in the process-wide slot.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        if let Ok(mut slot) = LAST_ERROR.lock() {
            *slot = Some((kind, message.clone()));
        }
        Self { kind, message }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl Error for CoreError {}

/// Returns the most recent error recorded by any core operation.
///
/// The slot is process-wide; callers that receive a bare failure
/// indicator consult it for the human-readable message.
pub fn last_error() -> Option<(ErrorKind, String)> {
    LAST_ERROR.lock().ok().and_then(|slot| slot.clone())
}

/// Clears the last-error slot.
pub fn clear_last_error() {
    if let Ok(mut slot) = LAST_ERROR.lock() {
        *slot = None;
    }
}

/// Maps an SQL transport error onto an operation-specific kind.
///
/// Used with `map_err` so each store operation reports its own failure
/// kind instead of a generic database error.
pub fn sql_error(kind: ErrorKind) -> impl FnOnce(rusqlite::Error) -> CoreError {
    move |err| CoreError::new(kind, err.to_string())
}
