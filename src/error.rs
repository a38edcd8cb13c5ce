//! Outcomes and errors of a navigation.
//!
//! - [`NavigationOutcome`] — what happened to a navigation that did not fail
//!   (`Refreshed`, `Superseded`, `Canceled`, `Faulted`, `Stale`).
//! - [`NavigationError`] — the one failure that crosses the
//!   [`handle_navigation`](crate::NavigationCoordinator::handle_navigation)
//!   boundary: a callback that canceled itself through a foreign signal.
//! - [`NavigationFailure`] — what an on-navigate callback may fail with.
//! - [`UnhandledFault`] — a callback fault forwarded to the fault sink.
//!
//! # Examples
//!
//! ```
//! use navigation_coordinator::error::{NavigationFailure, NavigationOutcome};
//!
//! let outcome = NavigationOutcome::Refreshed { force_load: false };
//! assert!(outcome.is_refreshed());
//!
//! let failure = NavigationFailure::fault("boom");
//! assert!(failure.is_fault());
//! assert_eq!(failure.to_string(), "boom");
//! ```

use crate::cancellation::Canceled;
use std::fmt;
use thiserror::Error;

/// Boxed error type carried by callback faults.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ============================================================================
// Navigation Outcome
// ============================================================================

/// How a navigation ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Callback succeeded while still current; `refresh` was called.
    Refreshed { force_load: bool },
    /// A newer navigation took over before the callback settled.
    Superseded,
    /// Callback aborted cooperatively through its own signal.
    Canceled,
    /// Callback failed; the fault went to the fault sink.
    Faulted,
    /// Callback succeeded, but a newer navigation had already taken over.
    Stale,
}

impl NavigationOutcome {
    /// Check if `refresh` was called for this navigation
    pub fn is_refreshed(&self) -> bool {
        matches!(self, NavigationOutcome::Refreshed { .. })
    }

    /// Check if the navigation was superseded
    pub fn is_superseded(&self) -> bool {
        matches!(self, NavigationOutcome::Superseded)
    }

    /// Check if the callback canceled itself
    pub fn is_canceled(&self) -> bool {
        matches!(self, NavigationOutcome::Canceled)
    }

    /// Check if the callback faulted
    pub fn is_faulted(&self) -> bool {
        matches!(self, NavigationOutcome::Faulted)
    }

    /// Check if the callback completed after losing the slot
    pub fn is_stale(&self) -> bool {
        matches!(self, NavigationOutcome::Stale)
    }
}

// ============================================================================
// Navigation Error
// ============================================================================

/// Failure returned by
/// [`handle_navigation`](crate::NavigationCoordinator::handle_navigation).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    /// The callback failed with a cancellation that is not tied to the
    /// signal of the context it was given.
    #[error(
        "the navigation callback for '{path}' cannot be canceled except via the provided cancellation signal"
    )]
    CanceledOutsideSignal { path: String },
}

// ============================================================================
// Callback Failure
// ============================================================================

/// Error an on-navigate callback may return.
#[derive(Debug)]
pub enum NavigationFailure {
    /// The callback stopped because of a cancellation.
    Canceled(Canceled),
    /// Any other failure.
    Fault(BoxError),
}

impl NavigationFailure {
    /// Wrap an arbitrary error (or message) as a fault.
    pub fn fault(error: impl Into<BoxError>) -> Self {
        NavigationFailure::Fault(error.into())
    }

    /// Check if this is a cancellation
    pub fn is_canceled(&self) -> bool {
        matches!(self, NavigationFailure::Canceled(_))
    }

    /// Check if this is a fault
    pub fn is_fault(&self) -> bool {
        matches!(self, NavigationFailure::Fault(_))
    }
}

impl From<Canceled> for NavigationFailure {
    fn from(canceled: Canceled) -> Self {
        NavigationFailure::Canceled(canceled)
    }
}

impl fmt::Display for NavigationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationFailure::Canceled(canceled) => write!(f, "{}", canceled),
            NavigationFailure::Fault(error) => write!(f, "{}", error),
        }
    }
}

impl std::error::Error for NavigationFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NavigationFailure::Canceled(canceled) => Some(canceled),
            NavigationFailure::Fault(error) => Some(error.as_ref()),
        }
    }
}

// ============================================================================
// Unhandled Fault
// ============================================================================

/// A callback fault reported to the
/// [`FaultSink`](crate::hooks::FaultSink) instead of the caller.
#[derive(Debug)]
pub struct UnhandledFault {
    path: String,
    error: BoxError,
}

impl UnhandledFault {
    /// Create a fault report for the navigation to `path`.
    pub fn new(path: impl Into<String>, error: impl Into<BoxError>) -> Self {
        Self {
            path: path.into(),
            error: error.into(),
        }
    }

    /// Path of the navigation whose callback faulted
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The callback's error
    pub fn error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.error.as_ref()
    }

    /// The callback's error message
    pub fn message(&self) -> String {
        self.error.to_string()
    }

    /// Take the callback's error
    pub fn into_error(self) -> BoxError {
        self.error
    }
}

impl fmt::Display for UnhandledFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "navigation to '{}' failed: {}", self.path, self.error)
    }
}

impl std::error::Error for UnhandledFault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.error.as_ref())
    }
}

// ============================================================================
// Tests
// ============================================================================
