//! Revocable cancellation scopes.
//!
//! A [`CancellationScope`] is owned by whoever may revoke it (the
//! coordinator, for navigations). Everyone else gets a
//! [`CancellationSignal`], which can only observe:
//!
//! - [`is_canceled`](CancellationSignal::is_canceled) — non-blocking check.
//! - [`cancelled`](CancellationSignal::cancelled) — a future that resolves
//!   when the scope is canceled.
//! - [`on_cancel`](CancellationSignal::on_cancel) — a one-shot reaction run
//!   synchronously by [`CancellationScope::cancel`].
//!
//! A scope is created [`Active`](ScopeState::Active) and ends in exactly one
//! of two permanent states: [`Canceled`](ScopeState::Canceled) when its owner
//! revokes it, or [`Completed`](ScopeState::Completed) when the work it
//! guarded finished first. Completing a scope drops its reactions unfired.
//!
//! # Example
//!
//! ```
//! use navigation_coordinator::cancellation::CancellationScope;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! let scope = CancellationScope::new();
//! let signal = scope.signal();
//!
//! let fired = Arc::new(AtomicBool::new(false));
//! let flag = Arc::clone(&fired);
//! signal.on_cancel(move || flag.store(true, Ordering::SeqCst));
//!
//! assert!(scope.cancel());
//! assert!(signal.is_canceled());
//! assert!(fired.load(Ordering::SeqCst));
//! assert!(signal.canceled().is_from(&signal));
//! ```

use crate::trace_log;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::sync::watch;

static NEXT_SIGNAL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a cancellation scope and its signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(u64);

impl SignalId {
    fn next() -> Self {
        Self(NEXT_SIGNAL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "signal#{}", self.0)
    }
}

/// Lifecycle state of a [`CancellationScope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// Neither canceled nor completed yet.
    Active,
    /// Revoked by the owner. Permanent.
    Canceled,
    /// Finished without being revoked. Permanent; will never cancel.
    Completed,
}

type Reaction = Box<dyn FnOnce() + Send + 'static>;

struct Registry {
    state: ScopeState,
    next_key: u64,
    reactions: Vec<(u64, Reaction)>,
}

struct Shared {
    id: SignalId,
    registry: Mutex<Registry>,
    canceled_tx: watch::Sender<bool>,
}

impl Shared {
    fn state(&self) -> ScopeState {
        self.registry.lock().state
    }
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        f.debug_struct("Shared")
            .field("id", &self.id)
            .field("state", &registry.state)
            .field("reactions", &registry.reactions.len())
            .finish()
    }
}

// ============================================================================
// CancellationScope
// ============================================================================

/// Owned, revocable cancellation scope.
///
/// Not `Clone`: exactly one owner can cancel or complete it. Hand out
/// [`CancellationSignal`]s to observers.
pub struct CancellationScope {
    shared: Arc<Shared>,
}

impl CancellationScope {
    /// Create a new active scope with a fresh [`SignalId`].
    pub fn new() -> Self {
        let (canceled_tx, _canceled_rx) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                id: SignalId::next(),
                registry: Mutex::new(Registry {
                    state: ScopeState::Active,
                    next_key: 0,
                    reactions: Vec::new(),
                }),
                canceled_tx,
            }),
        }
    }

    /// Identity shared by this scope and all of its signals.
    pub fn id(&self) -> SignalId {
        self.shared.id
    }

    /// Observer handle for this scope.
    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Current state.
    pub fn state(&self) -> ScopeState {
        self.shared.state()
    }

    /// Check if the scope has been canceled.
    pub fn is_canceled(&self) -> bool {
        self.state() == ScopeState::Canceled
    }

    /// Revoke the scope.
    ///
    /// Wakes every pending [`cancelled`](CancellationSignal::cancelled) future
    /// and runs registered reactions on the calling thread, in registration
    /// order, before returning. Returns `false` (and does nothing) if the
    /// scope was already canceled or completed.
    pub fn cancel(&self) -> bool {
        let reactions = {
            let mut registry = self.shared.registry.lock();
            if registry.state != ScopeState::Active {
                return false;
            }
            registry.state = ScopeState::Canceled;
            std::mem::take(&mut registry.reactions)
        };

        self.shared.canceled_tx.send_replace(true);
        trace_log!(
            "Canceled {} ({} reaction(s))",
            self.shared.id,
            reactions.len()
        );

        for (_, reaction) in reactions {
            reaction();
        }
        true
    }

    /// Mark the guarded work as finished.
    ///
    /// Registered reactions are dropped without running, and later calls to
    /// [`cancel`](Self::cancel) become no-ops. Returns `false` if the scope
    /// was not active.
    pub fn complete(&self) -> bool {
        let reactions = {
            let mut registry = self.shared.registry.lock();
            if registry.state != ScopeState::Active {
                return false;
            }
            registry.state = ScopeState::Completed;
            std::mem::take(&mut registry.reactions)
        };
        // dropped outside the lock: a reaction's captures may own another signal
        drop(reactions);
        true
    }
}

impl Default for CancellationScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationScope")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .finish()
    }
}

// ============================================================================
// CancellationSignal
// ============================================================================

/// Read-only view of a [`CancellationScope`].
///
/// Cheap to clone. A signal cannot revoke its scope; the only way to produce
/// a cancellation from it is [`canceled`](Self::canceled), which yields an
/// error value tagged with this signal's identity.
#[derive(Clone)]
pub struct CancellationSignal {
    shared: Arc<Shared>,
}

impl CancellationSignal {
    /// Identity of the scope this signal observes.
    pub fn id(&self) -> SignalId {
        self.shared.id
    }

    /// Current state of the scope.
    pub fn state(&self) -> ScopeState {
        self.shared.state()
    }

    /// Check if the scope has been canceled.
    pub fn is_canceled(&self) -> bool {
        self.state() == ScopeState::Canceled
    }

    /// Build a [`Canceled`] error tied to this signal.
    ///
    /// Callbacks return this to abort cooperatively.
    pub fn canceled(&self) -> Canceled {
        Canceled {
            signal: Some(self.shared.id),
        }
    }

    /// `Err(self.canceled())` if the scope is canceled, `Ok(())` otherwise.
    pub fn check(&self) -> Result<(), Canceled> {
        if self.is_canceled() {
            Err(self.canceled())
        } else {
            Ok(())
        }
    }

    /// Future that resolves once the scope is canceled.
    ///
    /// Resolves immediately if it already is. Never resolves for a scope that
    /// completes instead. The future does not borrow the signal.
    pub fn cancelled(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut canceled_rx = self.shared.canceled_tx.subscribe();
        async move {
            if canceled_rx.wait_for(|canceled| *canceled).await.is_err() {
                // Scope dropped while active: it can never be canceled now.
                futures::future::pending::<()>().await;
            }
        }
    }

    /// Register a reaction that runs once, synchronously, when the scope is
    /// canceled.
    ///
    /// - Active scope: the reaction is stored and runs inside
    ///   [`CancellationScope::cancel`].
    /// - Canceled scope: the reaction runs immediately, before this returns.
    /// - Completed scope: the reaction is dropped and never runs.
    pub fn on_cancel<F>(&self, reaction: F) -> CancellationRegistration
    where
        F: FnOnce() + Send + 'static,
    {
        let mut registry = self.shared.registry.lock();
        match registry.state {
            ScopeState::Active => {
                let key = registry.next_key;
                registry.next_key += 1;
                registry.reactions.push((key, Box::new(reaction)));
                CancellationRegistration {
                    shared: Arc::downgrade(&self.shared),
                    key: Some(key),
                }
            }
            ScopeState::Canceled => {
                drop(registry);
                reaction();
                CancellationRegistration::inert()
            }
            ScopeState::Completed => CancellationRegistration::inert(),
        }
    }
}

impl fmt::Debug for CancellationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationSignal")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .finish()
    }
}

impl PartialEq for CancellationSignal {
    fn eq(&self, other: &Self) -> bool {
        self.shared.id == other.shared.id
    }
}

impl Eq for CancellationSignal {}

/// Handle to a reaction registered with [`CancellationSignal::on_cancel`].
///
/// Dropping the handle keeps the reaction registered.
#[derive(Debug)]
pub struct CancellationRegistration {
    shared: Weak<Shared>,
    key: Option<u64>,
}

impl CancellationRegistration {
    fn inert() -> Self {
        Self {
            shared: Weak::new(),
            key: None,
        }
    }

    /// Remove the reaction before it fires.
    ///
    /// Returns `true` if the reaction was still pending and has been removed.
    pub fn unregister(self) -> bool {
        let (Some(key), Some(shared)) = (self.key, self.shared.upgrade()) else {
            return false;
        };
        let removed = {
            let mut registry = shared.registry.lock();
            registry
                .reactions
                .iter()
                .position(|(k, _)| *k == key)
                .map(|index| registry.reactions.remove(index))
        };
        removed.is_some()
    }
}

// ============================================================================
// Canceled
// ============================================================================

/// Error produced by work that stopped because of a cancellation.
///
/// Carries the identity of the signal it is tied to, if any, so receivers can
/// tell a cooperative abort on *their* signal apart from one caused by some
/// unrelated mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("the operation was canceled")]
pub struct Canceled {
    signal: Option<SignalId>,
}

impl Canceled {
    /// A cancellation not tied to any signal.
    pub fn unrelated() -> Self {
        Self { signal: None }
    }

    /// Identity of the signal this cancellation is tied to.
    pub fn signal_id(&self) -> Option<SignalId> {
        self.signal
    }

    /// Check if this cancellation is tied to `signal`.
    pub fn is_from(&self, signal: &CancellationSignal) -> bool {
        self.signal == Some(signal.id())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_new_scope_is_active() {
        let scope = CancellationScope::new();
        assert_eq!(scope.state(), ScopeState::Active);
        assert!(!scope.is_canceled());
        assert!(scope.signal().check().is_ok());
    }

    #[test]
    fn test_scope_ids_are_unique() {
        let a = CancellationScope::new();
        let b = CancellationScope::new();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.signal().id(), a.id());
        assert_eq!(a.signal(), a.signal());
        assert_ne!(a.signal(), b.signal());
    }

    #[test]
    fn test_cancel_only_once() {
        let scope = CancellationScope::new();
        assert!(scope.cancel());
        assert!(!scope.cancel());
        assert!(!scope.complete());
        assert_eq!(scope.state(), ScopeState::Canceled);
    }

    #[test]
    fn test_completed_scope_never_cancels() {
        let scope = CancellationScope::new();
        let signal = scope.signal();
        assert!(scope.complete());
        assert!(!scope.cancel());
        assert_eq!(signal.state(), ScopeState::Completed);
        assert!(!signal.is_canceled());
    }

    #[test]
    fn test_reaction_fires_once_on_cancel() {
        let scope = CancellationScope::new();
        let (count, reaction) = counter();
        let _registration = scope.signal().on_cancel(reaction);

        assert_eq!(count.load(Ordering::SeqCst), 0);
        scope.cancel();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        scope.cancel();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reactions_run_in_registration_order() {
        let scope = CancellationScope::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            scope.signal().on_cancel(move || order.lock().push(i));
        }
        scope.cancel();
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_reaction_on_canceled_scope_runs_immediately() {
        let scope = CancellationScope::new();
        scope.cancel();
        let (count, reaction) = counter();
        let registration = scope.signal().on_cancel(reaction);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!registration.unregister());
    }

    #[test]
    fn test_reaction_dropped_on_complete() {
        let scope = CancellationScope::new();
        let (count, reaction) = counter();
        scope.signal().on_cancel(reaction);
        scope.complete();
        scope.cancel();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        let (late, reaction) = counter();
        scope.signal().on_cancel(reaction);
        assert_eq!(late.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unregister_prevents_reaction() {
        let scope = CancellationScope::new();
        let (count, reaction) = counter();
        let registration = scope.signal().on_cancel(reaction);
        assert!(registration.unregister());
        scope.cancel();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reaction_may_observe_signal() {
        let scope = CancellationScope::new();
        let signal = scope.signal();
        let observed = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&observed);
        let inner = signal.clone();
        signal.on_cancel(move || *slot.lock() = Some(inner.is_canceled()));
        scope.cancel();
        assert_eq!(*observed.lock(), Some(true));
    }

    #[test]
    fn test_cancelled_future_resolves() {
        let scope = CancellationScope::new();
        let waiting = scope.signal().cancelled();
        scope.cancel();
        pollster::block_on(waiting);

        // Already canceled: resolves straight away.
        pollster::block_on(scope.signal().cancelled());
    }

    #[test]
    fn test_cancelled_future_pending_while_active() {
        use futures::FutureExt;

        let scope = CancellationScope::new();
        let mut waiting = Box::pin(scope.signal().cancelled());
        assert!((&mut waiting).now_or_never().is_none());
        scope.complete();
        assert!((&mut waiting).now_or_never().is_none());
    }

    #[test]
    fn test_canceled_error_identity() {
        let scope = CancellationScope::new();
        let other = CancellationScope::new();
        let error = scope.signal().canceled();

        assert!(error.is_from(&scope.signal()));
        assert!(!error.is_from(&other.signal()));
        assert_eq!(error.signal_id(), Some(scope.id()));
        assert!(!Canceled::unrelated().is_from(&scope.signal()));
        assert_eq!(error.to_string(), "the operation was canceled");
    }

    #[test]
    fn test_check_after_cancel() {
        let scope = CancellationScope::new();
        let signal = scope.signal();
        scope.cancel();
        let error = signal.check().unwrap_err();
        assert!(error.is_from(&signal));
    }
}
