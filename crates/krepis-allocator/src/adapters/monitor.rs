//! DeadlockMonitor - Periodic Detection Poller
//!
//! A background thread that calls [`ResourceManager::detect_deadlock`] once
//! per interval. On the first non-empty report it hands the report and a
//! snapshot to the callback and exits. Dropping the handle stops it.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use super::manager::ResourceManager;
use crate::domain::{DeadlockReport, ResourceState};

/// Shared stop flag with a condition so `stop` interrupts the sleep
#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    fn raise(&self) {
        *self.stopped.lock() = true;
        self.wake.notify_all();
    }

    /// Sleep up to `interval`; returns `true` if stopped meanwhile
    fn sleep(&self, interval: Duration) -> bool {
        let mut stopped = self.stopped.lock();
        if !*stopped {
            let _ = self.wake.wait_for(&mut stopped, interval);
        }
        *stopped
    }
}

/// Spawner for the polling thread
pub struct DeadlockMonitor;

impl DeadlockMonitor {
    /// Start polling `manager` every `interval`
    ///
    /// The first poll happens immediately.
    pub fn spawn<F>(manager: Arc<ResourceManager>, interval: Duration, on_deadlock: F) -> MonitorHandle
    where
        F: FnOnce(DeadlockReport, ResourceState) + Send + 'static,
    {
        let signal = Arc::new(StopSignal::default());
        let thread_signal = Arc::clone(&signal);

        let thread = thread::spawn(move || {
            loop {
                let report = manager.detect_deadlock();
                if report.is_deadlocked() {
                    let snapshot = manager.snapshot();
                    warn!(
                        deadlocked = report.count(),
                        workers = ?report.deadlocked,
                        "deadlock detected"
                    );
                    on_deadlock(report.clone(), snapshot);
                    return Some(report);
                }
                if thread_signal.sleep(interval) {
                    debug!("deadlock monitor stopped");
                    return None;
                }
            }
        });

        MonitorHandle {
            signal,
            thread: Some(thread),
        }
    }
}

/// Owner of a running monitor
pub struct MonitorHandle {
    signal: Arc<StopSignal>,
    thread: Option<JoinHandle<Option<DeadlockReport>>>,
}

impl MonitorHandle {
    /// Stop polling and wait for the thread
    ///
    /// Returns the report that ended the monitor, if it found a deadlock.
    pub fn stop(mut self) -> Option<DeadlockReport> {
        self.shutdown()
    }

    /// Wait for the monitor to find a deadlock, without stopping it
    pub fn join(mut self) -> Option<DeadlockReport> {
        self.thread.take().and_then(|t| t.join().ok()).flatten()
    }

    /// `true` once the polling thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    fn shutdown(&mut self) -> Option<DeadlockReport> {
        self.signal.raise();
        self.thread.take().and_then(|t| t.join().ok()).flatten()
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
