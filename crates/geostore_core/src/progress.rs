//! Progress reporting, cooperative cancellation and change notification.
//!
//! # Responsibility
//! - Define the synchronous callback contracts used by long-running
//!   operations (bulk copy, overview build, map draw) and by catalog/store
//!   mutation observers.
//!
//! # Invariants
//! - Cancellation is cooperative: the callback result is checked at
//!   natural iteration boundaries (per row, per tile, per layer), never
//!   preemptively.
//! - Change notifications are delivered synchronously at the point of
//!   mutation, not queued.

/// Status code passed to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    InProcess,
    Finished,
    Warning,
    Canceled,
}

type ProgressFn = Box<dyn Fn(ProgressStatus, f64, &str) -> bool + Send + Sync>;

/// Progress/cancellation handle for long-running operations.
///
/// The callback receives (status, fractional completion 0..1, message)
/// and returns `true` to continue or `false` to request cancellation.
/// A default handle reports nothing and never cancels.
#[derive(Default)]
pub struct Progress {
    callback: Option<ProgressFn>,
}

impl Progress {
    /// Creates a progress handle with a reporting callback.
    pub fn with(callback: impl Fn(ProgressStatus, f64, &str) -> bool + Send + Sync + 'static) -> Self {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    /// Reports progress; returns `true` when the operation should continue.
    pub fn on_progress(&self, status: ProgressStatus, complete: f64, message: &str) -> bool {
        match &self.callback {
            Some(callback) => callback(status, complete, message),
            None => true,
        }
    }
}

/// Kind of change reported to catalog/store observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCode {
    CreateObject,
    ChangeObject,
    DeleteObject,
    CreateFeature,
    ChangeFeature,
    DeleteFeature,
    CreateAttachment,
    ChangeAttachment,
    DeleteAttachment,
}

/// Change-notification callback: (affected catalog URI, change kind).
pub type NotifyFn = Box<dyn Fn(&str, ChangeCode) + Send + Sync>;
