//! # navigation-coordinator
//!
//! The part of a client-side router that decides, for a stream of navigation
//! events, which asynchronous "on navigate" callback wins and when the view
//! may refresh.
//!
//! Every navigation event supersedes the one before it. The superseded
//! navigation's [`CancellationSignal`] is canceled, its callback is no longer
//! awaited, and only the latest navigation whose callback succeeds while it
//! is still current calls [`RefreshSink::refresh`]. Callback faults go to a
//! [`FaultSink`] instead of the caller. A superseded callback is never torn
//! down: it keeps running in the background so it can observe its signal and
//! clean up, and its result is discarded.
//!
//! Route matching, history and rendering are left to the host.
//!
//! # Quick start
//!
//! ```
//! use navigation_coordinator::{NavigationContext, NavigationCoordinator, NavigationFailure};
//!
//! let coordinator = NavigationCoordinator::builder(|force_load: bool| {
//!     println!("render (force_load: {force_load})");
//! })
//! .on_navigate_fn(|context: NavigationContext| async move {
//!     // Load data for context.path(), checking the signal between steps.
//!     context.check_canceled()?;
//!     Ok::<_, NavigationFailure>(())
//! })
//! .build();
//!
//! // A rapid second navigation supersedes the first before it is awaited.
//! let first = coordinator.handle_navigation("/inbox", false);
//! let second = coordinator.handle_navigation("/settings", false);
//!
//! assert!(pollster::block_on(first).unwrap().is_superseded());
//! assert!(pollster::block_on(second).unwrap().is_refreshed());
//! ```
//!
//! # Outcomes
//!
//! | Callback result | Outcome | Side effect |
//! |-----------------|---------|-------------|
//! | superseded first | `Ok(Superseded)` | none |
//! | `Ok(())`, still current | `Ok(Refreshed)` | `refresh(force_load)` |
//! | `Ok(())`, no longer current | `Ok(Stale)` | none |
//! | canceled via its own signal | `Ok(Canceled)` | none |
//! | canceled via another signal | `Err(CanceledOutsideSignal)` | none |
//! | any other error | `Ok(Faulted)` | fault sink report |
//!
//! # Feature flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `log` | yes | Logging through the `log` crate |
//! | `tracing` | no | Logging through the `tracing` crate (exclusive with `log`) |

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod cancellation;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod hooks;
pub mod logging;
mod state;

pub use cancellation::{
    Canceled, CancellationRegistration, CancellationScope, CancellationSignal, ScopeState,
    SignalId,
};
pub use context::NavigationContext;
pub use coordinator::{CoordinatorBuilder, NavigationCoordinator, NavigationTask};
pub use error::{BoxError, NavigationError, NavigationFailure, NavigationOutcome, UnhandledFault};
pub use hooks::{
    fault_channel, on_navigate_fn, ChannelFaultSink, FaultSink, FnOnNavigate, LogFaultSink,
    NavigateFuture, OnNavigate, RefreshSink,
};
pub use state::{NavigationId, NavigationStats};
