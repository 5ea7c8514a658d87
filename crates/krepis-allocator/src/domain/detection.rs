//! DeadlockDetector - Reduction over Outstanding Requests
//!
//! Same reduction skeleton as the safety oracle, with two differences:
//!
//! - a worker with no outstanding request is finished from the start
//!   (it is not waiting on anything);
//! - reducibility compares the *pending request*, not the declared need.
//!
//! Workers still unfinished at the fixed point are deadlocked: no order of
//! grants can ever satisfy them.

use serde::Serialize;

use super::safety::reduce;
use super::state::ResourceState;
use super::types::{is_zero, WorkerSlot};

/// Result of one detection pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeadlockReport {
    /// Deadlocked workers in ascending slot order
    pub deadlocked: Vec<WorkerSlot>,
}

impl DeadlockReport {
    /// Number of deadlocked workers (0 = none)
    pub fn count(&self) -> usize {
        self.deadlocked.len()
    }

    /// `true` if at least one worker can never complete
    pub fn is_deadlocked(&self) -> bool {
        !self.deadlocked.is_empty()
    }
}

/// Pure deadlock detector over a (locked or snapshotted) state
pub struct DeadlockDetector;

impl DeadlockDetector {
    /// Find every worker that can never complete
    pub fn detect(state: &ResourceState) -> DeadlockReport {
        let mut finish: Vec<bool> = state
            .workers()
            .map(|s| state.is_finished(s) || is_zero(state.request(s)))
            .collect();

        reduce(state, &mut finish, |slot| state.request(slot));

        DeadlockReport {
            deadlocked: state.workers().filter(|s| !finish[s.as_usize()]).collect(),
        }
    }
}
