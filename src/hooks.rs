//! Collaborator seams of the coordinator.
//!
//! | Trait | Role | Closure form |
//! |-------|------|--------------|
//! | [`OnNavigate`] | async callback run for every navigation | [`on_navigate_fn`] |
//! | [`RefreshSink`] | renders the winning navigation | `Fn(bool)` |
//! | [`FaultSink`] | receives callback faults | `Fn(UnhandledFault)` |
//!
//! # Example
//!
//! ```
//! use navigation_coordinator::{on_navigate_fn, NavigationContext, NavigationFailure};
//!
//! let hook = on_navigate_fn(|context: NavigationContext| async move {
//!     if context.path() == "/broken" {
//!         return Err(NavigationFailure::fault("no such page"));
//!     }
//!     Ok(())
//! });
//! ```

use crate::context::NavigationContext;
use crate::error::{NavigationFailure, UnhandledFault};
use crate::{error_log, trace_log};
use futures::channel::mpsc;
use futures::executor::ThreadPool;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::OnceLock;

/// Future returned by an [`OnNavigate`] callback.
pub type NavigateFuture = BoxFuture<'static, Result<(), NavigationFailure>>;

// ============================================================================
// OnNavigate
// ============================================================================

/// Asynchronous callback run for every navigation before it may refresh.
///
/// The returned future is `'static`. It owns the [`NavigationContext`] and
/// may outlive the navigation that started it, since a superseded callback
/// keeps running in the background until it settles.
///
/// # Example
///
/// ```
/// use navigation_coordinator::{NavigateFuture, NavigationContext, OnNavigate};
/// use futures::FutureExt;
///
/// struct Prefetch;
///
/// impl OnNavigate for Prefetch {
///     fn on_navigate(&self, context: NavigationContext) -> NavigateFuture {
///         async move {
///             context.check_canceled()?;
///             Ok::<_, navigation_coordinator::NavigationFailure>(())
///         }
///         .boxed()
///     }
/// }
/// ```
pub trait OnNavigate: Send + Sync + 'static {
    /// Start the callback for one navigation.
    fn on_navigate(&self, context: NavigationContext) -> NavigateFuture;

    /// Callback name for debugging.
    fn name(&self) -> &'static str {
        "OnNavigate"
    }
}

/// Create an [`OnNavigate`] callback from an async closure.
pub const fn on_navigate_fn<F, Fut>(f: F) -> FnOnNavigate<F>
where
    F: Fn(NavigationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), NavigationFailure>> + Send + 'static,
{
    FnOnNavigate { f }
}

/// Callback created from a closure via [`on_navigate_fn`].
pub struct FnOnNavigate<F> {
    f: F,
}

impl<F, Fut> OnNavigate for FnOnNavigate<F>
where
    F: Fn(NavigationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), NavigationFailure>> + Send + 'static,
{
    fn on_navigate(&self, context: NavigationContext) -> NavigateFuture {
        (self.f)(context).boxed()
    }
}

// ============================================================================
// RefreshSink
// ============================================================================

/// The render collaborator: makes the matched view actually appear.
///
/// Calls from one coordinator never overlap across threads. A navigation
/// that wins while another refresh is running waits for it, so views land
/// in the order their navigations started. The sink may start navigations
/// on its own thread, but must not block on one completing elsewhere.
pub trait RefreshSink: Send + Sync + 'static {
    /// Refresh the view. `force_load` is passed through unchanged.
    fn refresh(&self, force_load: bool);
}

impl<F> RefreshSink for F
where
    F: Fn(bool) + Send + Sync + 'static,
{
    fn refresh(&self, force_load: bool) {
        self(force_load);
    }
}

// ============================================================================
// FaultSink
// ============================================================================

/// Receives callback faults that must not unwind the navigation pipeline.
pub trait FaultSink: Send + Sync + 'static {
    /// Report a fault. Must not panic.
    fn report(&self, fault: UnhandledFault);
}

impl<F> FaultSink for F
where
    F: Fn(UnhandledFault) + Send + Sync + 'static,
{
    fn report(&self, fault: UnhandledFault) {
        self(fault);
    }
}

/// Default fault sink: logs every fault at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFaultSink;

impl FaultSink for LogFaultSink {
    fn report(&self, fault: UnhandledFault) {
        error_log!("Unhandled navigation fault: {}", fault);
    }
}

/// Fault sink that forwards into an unbounded channel.
///
/// Created by [`fault_channel`].
#[derive(Debug, Clone)]
pub struct ChannelFaultSink {
    tx: mpsc::UnboundedSender<UnhandledFault>,
}

impl FaultSink for ChannelFaultSink {
    fn report(&self, fault: UnhandledFault) {
        if let Err(err) = self.tx.unbounded_send(fault) {
            // Receiver gone: nobody is listening, fall back to the log.
            error_log!("Unhandled navigation fault: {}", err.into_inner());
        }
    }
}

/// Create a fault sink paired with the receiving end of its channel.
///
/// # Example
///
/// ```
/// use navigation_coordinator::{fault_channel, FaultSink, UnhandledFault};
///
/// let (sink, mut faults) = fault_channel();
/// sink.report(UnhandledFault::new("/a", "boom"));
/// let fault = faults.try_next().unwrap().unwrap();
/// assert_eq!(fault.message(), "boom");
/// ```
pub fn fault_channel() -> (ChannelFaultSink, mpsc::UnboundedReceiver<UnhandledFault>) {
    let (tx, rx) = mpsc::unbounded();
    (ChannelFaultSink { tx }, rx)
}

// ============================================================================
// Abandoned callbacks
// ============================================================================

/// Shared pool that runs superseded callbacks when no spawner is configured.
///
/// Started on first use. Returns `None` if the pool threads could not be
/// created.
pub(crate) fn abandoned_pool() -> Option<ThreadPool> {
    static POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

    POOL.get_or_init(|| {
        match ThreadPool::builder()
            .name_prefix("navigation-abandoned-")
            .create()
        {
            Ok(pool) => {
                trace_log!("Started abandoned-callback pool");
                Some(pool)
            }
            Err(err) => {
                error_log!("Failed to start abandoned-callback pool: {}", err);
                None
            }
        }
    })
    .clone()
}

// ============================================================================
// Tests
// ============================================================================
