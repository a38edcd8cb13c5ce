//! The context handed to on-navigate callbacks.

use crate::cancellation::{Canceled, CancellationSignal};
use std::future::Future;

/// What an on-navigate callback gets to see of a navigation.
///
/// Immutable once built. The signal is canceled when a newer navigation
/// supersedes this one; callbacks should stop work and return
/// [`canceled`](Self::canceled) when that happens.
///
/// # Example
///
/// ```
/// use navigation_coordinator::{NavigationContext, NavigationFailure};
///
/// async fn load(context: NavigationContext) -> Result<(), NavigationFailure> {
///     for _chunk in 0..3 {
///         context.check_canceled()?;
///         // fetch the next chunk for context.path()
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct NavigationContext {
    path: String,
    signal: CancellationSignal,
}

impl NavigationContext {
    /// Create a context for a navigation to `path`, observing `signal`.
    pub fn new(path: impl Into<String>, signal: CancellationSignal) -> Self {
        Self {
            path: path.into(),
            signal,
        }
    }

    /// The normalized path being navigated to.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The navigation's cancellation signal.
    pub fn signal(&self) -> &CancellationSignal {
        &self.signal
    }

    /// Check if a newer navigation superseded this one.
    pub fn is_canceled(&self) -> bool {
        self.signal.is_canceled()
    }

    /// `Err` tied to this navigation's signal once it has been superseded.
    pub fn check_canceled(&self) -> Result<(), Canceled> {
        self.signal.check()
    }

    /// A cancellation error tied to this navigation's signal.
    pub fn canceled(&self) -> Canceled {
        self.signal.canceled()
    }

    /// Resolves when this navigation is superseded.
    pub fn cancelled(&self) -> impl Future<Output = ()> + Send + 'static {
        self.signal.cancelled()
    }
}

impl std::fmt::Display for NavigationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NavigationContext({})", self.path)
    }
}

// ============================================================================
// Tests
// ============================================================================
