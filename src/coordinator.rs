//! The navigation coordinator.
//!
//! [`NavigationCoordinator::handle_navigation`] is called by the host once per
//! navigation event. Each call:
//!
//! 1. Takes over the pending-navigation slot, canceling whatever navigation
//!    held it. This happens **eagerly**, when `handle_navigation` is called,
//!    not when the returned task is first polled.
//! 2. Without an [`OnNavigate`] callback, refreshes right away.
//! 3. Otherwise starts the callback with a fresh [`NavigationContext`] and
//!    races it against the navigation being superseded. A superseded callback
//!    is not awaited any more but keeps running in the background, see
//!    [`CoordinatorBuilder::spawn_abandoned`].
//! 4. Turns whichever side won into a [`NavigationOutcome`]: refresh, stay
//!    silent, report a fault, or fail with [`NavigationError`].
//!
//! # Example
//!
//! ```
//! use navigation_coordinator::{NavigationCoordinator, NavigationContext};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let refreshes = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&refreshes);
//!
//! let coordinator = NavigationCoordinator::builder(move |_force_load: bool| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! })
//! .on_navigate_fn(|_context: NavigationContext| async { Ok(()) })
//! .build();
//!
//! let outcome = pollster::block_on(coordinator.handle_navigation("/home", false)).unwrap();
//! assert!(outcome.is_refreshed());
//! assert_eq!(refreshes.load(Ordering::SeqCst), 1);
//! ```

use crate::cancellation::CancellationSignal;
use crate::context::NavigationContext;
use crate::error::{NavigationError, NavigationFailure, NavigationOutcome, UnhandledFault};
use crate::hooks::{
    abandoned_pool, on_navigate_fn, FaultSink, LogFaultSink, NavigateFuture, OnNavigate,
    RefreshSink,
};
use crate::state::{NavigationId, NavigationSlot, NavigationStats, StatsCounters};
use crate::{debug_log, info_log, trace_log, warn_log};
use futures::future::{self, BoxFuture, Either};
use futures::task::{Spawn, SpawnExt};
use futures::FutureExt;
use parking_lot::ReentrantMutex;
use std::cell::Cell;
use std::future::Future;
use std::sync::Arc;

/// Task returned by [`NavigationCoordinator::handle_navigation`].
pub type NavigationTask = BoxFuture<'static, Result<NavigationOutcome, NavigationError>>;

// ============================================================================
// Builder
// ============================================================================

/// Configures a [`NavigationCoordinator`].
///
/// # Example
///
/// ```
/// use navigation_coordinator::{fault_channel, NavigationCoordinator, NavigationContext};
///
/// let (faults, _receiver) = fault_channel();
/// let coordinator = NavigationCoordinator::builder(|_force_load: bool| {})
///     .on_navigate_fn(|context: NavigationContext| async move {
///         context.check_canceled()?;
///         Ok(())
///     })
///     .fault_sink(faults)
///     .build();
/// assert!(coordinator.has_callback());
/// ```
pub struct CoordinatorBuilder {
    refresh: Arc<dyn RefreshSink>,
    on_navigate: Option<Arc<dyn OnNavigate>>,
    faults: Arc<dyn FaultSink>,
    abandoned: Abandoned,
}

/// What happens to a callback once its navigation is superseded.
enum Abandoned {
    /// Run it to completion on the shared background pool.
    SharedPool,
    /// Run it to completion on a caller-provided executor.
    Spawner(Arc<dyn Spawn + Send + Sync>),
    /// Drop it at its next suspension point.
    Drop,
}

impl CoordinatorBuilder {
    /// Start a builder around the refresh sink.
    pub fn new(refresh: impl RefreshSink) -> Self {
        Self {
            refresh: Arc::new(refresh),
            on_navigate: None,
            faults: Arc::new(LogFaultSink),
            abandoned: Abandoned::SharedPool,
        }
    }

    /// Set the on-navigate callback.
    pub fn on_navigate(mut self, callback: impl OnNavigate) -> Self {
        self.on_navigate = Some(Arc::new(callback));
        self
    }

    /// Set the on-navigate callback from an async closure.
    pub fn on_navigate_fn<F, Fut>(self, f: F) -> Self
    where
        F: Fn(NavigationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), NavigationFailure>> + Send + 'static,
    {
        self.on_navigate(on_navigate_fn(f))
    }

    /// Set where callback faults go. Defaults to [`LogFaultSink`].
    pub fn fault_sink(mut self, sink: impl FaultSink) -> Self {
        self.faults = Arc::new(sink);
        self
    }

    /// Run superseded callbacks on `spawner`.
    ///
    /// By default they run on a background pool shared by all coordinators. Either
    /// way their results are logged and otherwise ignored.
    pub fn spawn_abandoned(mut self, spawner: impl Spawn + Send + Sync + 'static) -> Self {
        self.abandoned = Abandoned::Spawner(Arc::new(spawner));
        self
    }

    /// Drop superseded callbacks instead of letting them finish.
    ///
    /// A dropped callback stops at its next `.await`, so any cleanup after
    /// that point never runs. Only use this when callbacks hold nothing that
    /// needs releasing.
    pub fn drop_abandoned(mut self) -> Self {
        self.abandoned = Abandoned::Drop;
        self
    }

    /// Build the coordinator.
    pub fn build(self) -> NavigationCoordinator {
        NavigationCoordinator {
            inner: Arc::new(Inner {
                refresh: self.refresh,
                on_navigate: self.on_navigate,
                faults: self.faults,
                abandoned: self.abandoned,
                slot: NavigationSlot::new(),
                refresh_gate: ReentrantMutex::new(Cell::new(None)),
                stats: StatsCounters::default(),
            }),
        }
    }
}

// ============================================================================
// NavigationCoordinator
// ============================================================================

/// Decides which navigation may refresh.
///
/// One coordinator per router. Clones share the same pending-navigation
/// slot, so they behave as one coordinator.
#[derive(Clone)]
pub struct NavigationCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    refresh: Arc<dyn RefreshSink>,
    on_navigate: Option<Arc<dyn OnNavigate>>,
    faults: Arc<dyn FaultSink>,
    abandoned: Abandoned,
    slot: NavigationSlot,
    /// Last navigation that refreshed. Held from the ownership check until
    /// the refresh returns; reentrant so the sink may navigate.
    refresh_gate: ReentrantMutex<Cell<Option<NavigationId>>>,
    stats: StatsCounters,
}

impl NavigationCoordinator {
    /// Coordinator without a callback: every navigation refreshes at once.
    pub fn new(refresh: impl RefreshSink) -> Self {
        Self::builder(refresh).build()
    }

    /// Start configuring a coordinator.
    pub fn builder(refresh: impl RefreshSink) -> CoordinatorBuilder {
        CoordinatorBuilder::new(refresh)
    }

    /// Handle one navigation event.
    ///
    /// Supersession of the previous navigation, and the callback invocation,
    /// happen before this returns. The returned task resolves to:
    ///
    /// - `Ok(Refreshed)` — callback succeeded while current; `refresh` called.
    /// - `Ok(Superseded)` — a newer navigation took over first.
    /// - `Ok(Canceled)` — callback aborted through its own signal.
    /// - `Ok(Faulted)` — callback failed; fault sent to the fault sink.
    /// - `Ok(Stale)` — callback succeeded after losing the slot.
    /// - `Err(CanceledOutsideSignal)` — callback canceled through a signal
    ///   other than the one it was given.
    pub fn handle_navigation(&self, path: impl Into<String>, force_load: bool) -> NavigationTask {
        let path = path.into();
        let inner = &self.inner;

        let (id, signal) = inner.slot.begin(&path);
        StatsCounters::bump(&inner.stats.started);
        debug_log!(
            "Navigation {} to '{}' started (force_load: {})",
            id,
            path,
            force_load
        );

        let Some(on_navigate) = inner.on_navigate.as_ref() else {
            let outcome = inner.complete(id, &path, force_load);
            return future::ready(Ok(outcome)).boxed();
        };

        trace_log!("Running {} for navigation {}", on_navigate.name(), id);
        let context = NavigationContext::new(path.clone(), signal.clone());
        let callback = on_navigate.on_navigate(context);
        let inner = Arc::clone(inner);

        async move { inner.resolve(id, path, force_load, signal, callback).await }.boxed()
    }

    /// Cancel the pending navigation, if any, without starting another.
    ///
    /// Its task resolves to [`NavigationOutcome::Superseded`].
    pub fn cancel_pending(&self) -> Option<NavigationId> {
        self.inner.slot.cancel_pending()
    }

    /// Check if a navigation is pending.
    pub fn is_navigating(&self) -> bool {
        self.inner.slot.is_pending()
    }

    /// Path of the pending navigation, if any.
    pub fn pending_path(&self) -> Option<String> {
        self.inner.slot.current_path()
    }

    /// Id of the pending navigation, if any.
    pub fn current_navigation(&self) -> Option<NavigationId> {
        self.inner.slot.current()
    }

    /// Check if an on-navigate callback is configured.
    pub fn has_callback(&self) -> bool {
        self.inner.on_navigate.is_some()
    }

    /// Snapshot of the outcome counters.
    pub fn stats(&self) -> NavigationStats {
        self.inner.stats.snapshot()
    }
}

impl std::fmt::Debug for NavigationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationCoordinator")
            .field("slot", &self.inner.slot)
            .field("has_callback", &self.has_callback())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Inner {
    async fn resolve(
        &self,
        id: NavigationId,
        path: String,
        force_load: bool,
        signal: CancellationSignal,
        callback: NavigateFuture,
    ) -> Result<NavigationOutcome, NavigationError> {
        // Supersession is polled first: once the scope is canceled it wins
        // even if the callback is ready too.
        let superseded = signal.cancelled().boxed();

        match future::select(superseded, callback).await {
            Either::Left(((), callback)) => {
                StatsCounters::bump(&self.stats.superseded);
                debug_log!("Navigation {} to '{}' abandoned", id, path);
                self.abandon(id, path, callback);
                Ok(NavigationOutcome::Superseded)
            }
            Either::Right((Ok(()), _)) => Ok(self.complete(id, &path, force_load)),
            Either::Right((Err(NavigationFailure::Canceled(canceled)), _)) => {
                self.slot.finish(id);
                if canceled.is_from(&signal) {
                    StatsCounters::bump(&self.stats.canceled);
                    debug_log!("Navigation {} to '{}' canceled by its callback", id, path);
                    Ok(NavigationOutcome::Canceled)
                } else {
                    StatsCounters::bump(&self.stats.misuse);
                    warn_log!(
                        "Callback for navigation {} to '{}' was canceled through a foreign signal ({:?})",
                        id,
                        path,
                        canceled.signal_id()
                    );
                    Err(NavigationError::CanceledOutsideSignal { path })
                }
            }
            Either::Right((Err(NavigationFailure::Fault(error)), _)) => {
                self.slot.finish(id);
                StatsCounters::bump(&self.stats.faulted);
                warn_log!("Callback for navigation {} to '{}' failed: {}", id, path, error);
                self.faults.report(UnhandledFault::new(path, error));
                Ok(NavigationOutcome::Faulted)
            }
        }
    }

    /// Refresh if navigation `id` still owns the slot.
    fn complete(&self, id: NavigationId, path: &str, force_load: bool) -> NavigationOutcome {
        let last_refreshed = self.refresh_gate.lock();
        if self.slot.finish(id) && last_refreshed.get() < Some(id) {
            last_refreshed.set(Some(id));
            StatsCounters::bump(&self.stats.refreshed);
            info_log!("Navigation {} to '{}' complete, refreshing", id, path);
            self.refresh.refresh(force_load);
            NavigationOutcome::Refreshed { force_load }
        } else {
            StatsCounters::bump(&self.stats.stale);
            debug_log!(
                "Navigation {} to '{}' completed after being superseded",
                id,
                path
            );
            NavigationOutcome::Stale
        }
    }

    /// Stop waiting on a losing callback.
    ///
    /// Unless dropping was configured, the callback keeps running on a
    /// background executor so it can observe its signal and clean up.
    fn abandon(&self, id: NavigationId, path: String, callback: NavigateFuture) {
        if matches!(self.abandoned, Abandoned::Drop) {
            trace_log!("Dropping callback of navigation {}", id);
            return;
        }

        let task = async move {
            match callback.await {
                Ok(()) => {
                    trace_log!("Abandoned navigation {} to '{}' succeeded", id, path);
                }
                Err(NavigationFailure::Canceled(_)) => {
                    trace_log!("Abandoned navigation {} to '{}' canceled", id, path);
                }
                Err(NavigationFailure::Fault(error)) => {
                    debug_log!(
                        "Abandoned navigation {} to '{}' failed: {}",
                        id,
                        path,
                        error
                    );
                }
            }
        };

        let spawned = match &self.abandoned {
            Abandoned::Spawner(spawner) => spawner.spawn(task),
            Abandoned::SharedPool => match abandoned_pool() {
                Some(pool) => pool.spawn(task),
                None => {
                    warn_log!("No pool for abandoned navigation {}, dropping it", id);
                    return;
                }
            },
            Abandoned::Drop => return,
        };
        if let Err(err) = spawned {
            warn_log!("Failed to spawn abandoned navigation {}: {}", id, err);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
