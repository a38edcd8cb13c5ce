//! Pending-navigation state owned by a coordinator.
//!
//! [`NavigationSlot`] holds at most one [`PendingNavigation`]: the most
//! recently started navigation that has not finished yet. Starting a new
//! navigation swaps the new entry in and cancels the displaced one.
//!
//! [`NavigationStats`] counts how navigations ended.

use crate::cancellation::{CancellationScope, CancellationSignal};
use crate::{debug_log, trace_log};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Per-coordinator navigation counter value.
///
/// Increases with every started navigation, so a larger id always belongs to
/// a later navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NavigationId(u64);

impl NavigationId {
    /// Raw numeric value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NavigationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The navigation currently allowed to refresh.
#[derive(Debug)]
pub(crate) struct PendingNavigation {
    id: NavigationId,
    path: String,
    scope: CancellationScope,
}

/// Single-slot holder of the pending navigation.
#[derive(Debug, Default)]
pub(crate) struct NavigationSlot {
    pending: Mutex<Option<PendingNavigation>>,
    /// Last issued navigation id; ids start at 1.
    navigation_id: AtomicU64,
}

impl NavigationSlot {
    /// Create an empty slot
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Start a new navigation to `path`.
    ///
    /// The new entry replaces the pending one under the slot lock; the
    /// displaced scope is canceled after the lock is released, so its
    /// reactions may call back into the slot. Returns the new navigation's
    /// id and signal.
    pub(crate) fn begin(&self, path: &str) -> (NavigationId, CancellationSignal) {
        let scope = CancellationScope::new();
        let signal = scope.signal();

        let (id, displaced) = {
            let mut pending = self.pending.lock();
            // Issued under the lock so ids follow slot order.
            let id = NavigationId(self.navigation_id.fetch_add(1, Ordering::SeqCst) + 1);
            let displaced = pending.replace(PendingNavigation {
                id,
                path: path.to_string(),
                scope,
            });
            (id, displaced)
        };

        if let Some(previous) = displaced {
            debug_log!(
                "Navigation {} to '{}' superseded by {} to '{}'",
                previous.id,
                previous.path,
                id,
                path
            );
            previous.scope.cancel();
        }

        (id, signal)
    }

    /// Finish navigation `id`.
    ///
    /// If `id` is still pending, removes it, completes its scope (dropping
    /// any reactions unfired) and returns `true`. Returns `false` if a later
    /// navigation already took the slot.
    pub(crate) fn finish(&self, id: NavigationId) -> bool {
        let finished = {
            let mut pending = self.pending.lock();
            if pending.as_ref().is_some_and(|current| current.id == id) {
                pending.take()
            } else {
                None
            }
        };

        match finished {
            Some(navigation) => {
                navigation.scope.complete();
                trace_log!("Navigation {} finished", id);
                true
            }
            None => false,
        }
    }

    /// Cancel the pending navigation without starting another one.
    pub(crate) fn cancel_pending(&self) -> Option<NavigationId> {
        let canceled = self.pending.lock().take()?;
        debug_log!(
            "Navigation {} to '{}' canceled",
            canceled.id,
            canceled.path
        );
        canceled.scope.cancel();
        Some(canceled.id)
    }

    /// Id of the pending navigation, if any.
    pub(crate) fn current(&self) -> Option<NavigationId> {
        self.pending.lock().as_ref().map(|pending| pending.id)
    }

    /// Path of the pending navigation, if any.
    pub(crate) fn current_path(&self) -> Option<String> {
        self.pending
            .lock()
            .as_ref()
            .map(|pending| pending.path.clone())
    }

    /// Check if a navigation is pending.
    pub(crate) fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }
}

// ============================================================================
// Stats
// ============================================================================

/// Counters describing how navigations ended.
///
/// Every started navigation ends up in at most one of the other counters;
/// navigations still in flight are in none of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationStats {
    /// Navigations started.
    pub started: usize,
    /// Navigations that called `refresh`.
    pub refreshed: usize,
    /// Navigations superseded before their callback settled.
    pub superseded: usize,
    /// Callbacks that canceled themselves through their own signal.
    pub canceled: usize,
    /// Callbacks whose fault was forwarded to the fault sink.
    pub faulted: usize,
    /// Callbacks that succeeded after losing the slot.
    pub stale: usize,
    /// Callbacks canceled through a foreign signal.
    pub misuse: usize,
}

impl NavigationStats {
    /// Navigations that have reached an outcome.
    pub fn settled(&self) -> usize {
        self.refreshed + self.superseded + self.canceled + self.faulted + self.stale + self.misuse
    }
}

/// Lock-free counters behind [`NavigationStats`].
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) started: AtomicUsize,
    pub(crate) refreshed: AtomicUsize,
    pub(crate) superseded: AtomicUsize,
    pub(crate) canceled: AtomicUsize,
    pub(crate) faulted: AtomicUsize,
    pub(crate) stale: AtomicUsize,
    pub(crate) misuse: AtomicUsize,
}

impl StatsCounters {
    pub(crate) fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> NavigationStats {
        NavigationStats {
            started: self.started.load(Ordering::Relaxed),
            refreshed: self.refreshed.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            canceled: self.canceled.load(Ordering::Relaxed),
            faulted: self.faulted.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            misuse: self.misuse.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[test]
    fn test_begin_assigns_increasing_ids() {
        let slot = NavigationSlot::new();
        assert_eq!(slot.current(), None);

        let (first, _) = slot.begin("/a");
        let (second, _) = slot.begin("/b");
        assert!(second > first);
        assert_eq!(first.as_u64(), 1);
        assert_eq!(slot.current(), Some(second));
        assert_eq!(second.to_string(), "#2");
    }

    #[test]
    fn test_begin_supersedes_previous() {
        let slot = NavigationSlot::new();
        let (first, first_signal) = slot.begin("/a");
        assert_eq!(slot.current(), Some(first));
        assert!(!first_signal.is_canceled());

        let (second, second_signal) = slot.begin("/b");
        assert!(first_signal.is_canceled());
        assert!(!second_signal.is_canceled());
        assert_eq!(slot.current(), Some(second));
        assert_eq!(slot.current_path().as_deref(), Some("/b"));
    }

    #[test]
    fn test_supersession_cancels_in_arrival_order() {
        let slot = NavigationSlot::new();
        let (_, a) = slot.begin("/a");
        let (_, b) = slot.begin("/b");
        assert!(a.is_canceled() && !b.is_canceled());
        let (_, c) = slot.begin("/c");
        assert!(b.is_canceled() && !c.is_canceled());
    }

    #[test]
    fn test_finish_current_navigation() {
        let slot = NavigationSlot::new();
        let (id, signal) = slot.begin("/a");
        assert!(slot.finish(id));
        assert!(!slot.is_pending());
        assert!(!slot.finish(id));

        // A finished navigation is never canceled by the next one.
        slot.begin("/b");
        assert!(!signal.is_canceled());
    }

    #[test]
    fn test_finish_stale_navigation() {
        let slot = NavigationSlot::new();
        let (first, _) = slot.begin("/a");
        let (second, _) = slot.begin("/b");
        assert!(!slot.finish(first));
        assert_eq!(slot.current(), Some(second));
    }

    #[test]
    fn test_finish_drops_reactions() {
        let slot = NavigationSlot::new();
        let (id, signal) = slot.begin("/a");
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        signal.on_cancel(move || flag.store(true, Ordering::SeqCst));

        slot.finish(id);
        slot.begin("/b");
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_reaction_can_read_slot() {
        let slot = Arc::new(NavigationSlot::new());
        let (_, signal) = slot.begin("/a");
        let seen = Arc::new(Mutex::new(None));
        let (slot_ref, seen_ref) = (slot.clone(), seen.clone());
        signal.on_cancel(move || *seen_ref.lock() = slot_ref.current_path());

        slot.begin("/b");
        assert_eq!(seen.lock().as_deref(), Some("/b"));
    }

    #[test]
    fn test_cancel_pending() {
        let slot = NavigationSlot::new();
        assert_eq!(slot.cancel_pending(), None);

        let (id, signal) = slot.begin("/a");
        assert_eq!(slot.cancel_pending(), Some(id));
        assert!(signal.is_canceled());
        assert!(!slot.is_pending());
        assert!(!slot.finish(id));
    }

    #[test]
    fn test_stats_settled() {
        let stats = NavigationStats {
            started: 4,
            refreshed: 1,
            superseded: 2,
            faulted: 1,
            ..NavigationStats::default()
        };
        assert_eq!(stats.settled(), 4);
        assert_eq!(NavigationStats::default().settled(), 0);
    }

    #[test]
    fn test_counters_snapshot() {
        let counters = StatsCounters::default();
        StatsCounters::bump(&counters.started);
        StatsCounters::bump(&counters.started);
        StatsCounters::bump(&counters.refreshed);
        let stats = counters.snapshot();
        assert_eq!(stats.started, 2);
        assert_eq!(stats.refreshed, 1);
        assert_eq!(stats.superseded, 0);
    }
}
