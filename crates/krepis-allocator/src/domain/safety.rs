//! SafetyOracle - Banker's Safety Check
//!
//! # Algorithm
//!
//! ```text
//! work   := available
//! finish := finished            (slots that ended or never started)
//! loop:
//!     i := lowest slot with !finish[i] && need[i] <= work
//!     if none: break
//!     work += allocation[i]; finish[i] := true
//! safe  <=> finish is all true
//! ```
//!
//! After every reduction the scan restarts from slot 0. This fixes the
//! reduction order; the reported completion sequence depends on it.
//!
//! Cost is at most N passes of N·M comparisons. Safety is recomputed from
//! scratch on every call and never cached.

use super::state::ResourceState;
use super::types::{add_assign, fits, Units, WorkerSlot};

/// Shared reduction skeleton used by the oracle and the detector
///
/// `finish` is the seed, `demand(i)` the row compared against `work`.
/// Returns the completion order.
pub(crate) fn reduce<'a, F>(state: &'a ResourceState, finish: &mut [bool], demand: F) -> Vec<WorkerSlot>
where
    F: Fn(WorkerSlot) -> &'a [Units],
{
    let mut work = state.available().to_vec();
    let mut order = Vec::new();

    'restart: loop {
        for slot in state.workers() {
            if finish[slot.as_usize()] || !fits(demand(slot), &work) {
                continue;
            }
            add_assign(&mut work, state.allocation(slot));
            finish[slot.as_usize()] = true;
            order.push(slot);
            continue 'restart;
        }
        break;
    }

    order
}

/// Pure safety oracle over a (locked or snapshotted) state
pub struct SafetyOracle;

impl SafetyOracle {
    /// `true` if every unfinished worker can still run to completion
    pub fn is_safe(state: &ResourceState) -> bool {
        Self::safe_sequence(state).is_some()
    }

    /// Completion order witnessing safety, or `None` if the state is unsafe
    ///
    /// Slots that were already finished do not appear in the sequence.
    pub fn safe_sequence(state: &ResourceState) -> Option<Vec<WorkerSlot>> {
        let mut finish: Vec<bool> = state.workers().map(|s| state.is_finished(s)).collect();
        let order = reduce(state, &mut finish, |slot| state.need(slot));

        if finish.iter().all(|&f| f) {
            Some(order)
        } else {
            None
        }
    }
}
