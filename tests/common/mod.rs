//! Test utilities for coordinator tests
//!
//! Provides recording sinks and small helpers shared by the integration tests.

#![allow(dead_code)]

use futures::channel::mpsc::UnboundedReceiver;
use futures::task::{FutureObj, Spawn, SpawnError};
use navigation_coordinator::*;
use parking_lot::Mutex;
use std::sync::Arc;

/// Route test logging through `env_logger` (`RUST_LOG=debug cargo test`)
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Records every `refresh(force_load)` call
#[derive(Clone, Default)]
pub struct RefreshLog {
    calls: Arc<Mutex<Vec<bool>>>,
}

impl RefreshLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh sink that appends to this log
    pub fn sink(&self) -> impl RefreshSink {
        let calls = self.calls.clone();
        move |force_load: bool| calls.lock().push(force_load)
    }

    pub fn calls(&self) -> Vec<bool> {
        self.calls.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }
}

/// Collect the messages of all faults currently queued in `faults`
pub fn drain_faults(faults: &mut UnboundedReceiver<UnhandledFault>) -> Vec<String> {
    let mut messages = Vec::new();
    while let Ok(Some(fault)) = faults.try_next() {
        messages.push(fault.message());
    }
    messages
}

/// Spawner that hands abandoned callbacks to the current tokio runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl Spawn for TokioSpawner {
    fn spawn_obj(&self, future: FutureObj<'static, ()>) -> Result<(), SpawnError> {
        tokio::spawn(future);
        Ok(())
    }
}
