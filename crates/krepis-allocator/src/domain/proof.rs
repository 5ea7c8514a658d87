//! Kani Formal Verification Proofs
//!
//! Bounded to 2 workers x 2 resource types with small unit counts.

#![cfg(kani)]

use super::safety::SafetyOracle;
use super::state::ResourceState;
use super::types::*;

fn any_units(max: Units) -> Units {
    let u: Units = kani::any();
    kani::assume(u <= max);
    u
}

/// A tentative grant followed by its rollback restores the exact state
#[kani::proof]
#[kani::unwind(4)]
fn proof_grant_rollback_is_identity() {
    let existing = vec![any_units(3), any_units(3)];
    let mut state = ResourceState::new(AllocationPolicy::Avoidance, 2, existing.clone());
    let slot = WorkerSlot(0);
    state.bind(slot);
    state.set_claim(slot, &existing);

    let req = vec![any_units(3), any_units(3)];
    kani::assume(fits(&req, state.available()));

    let before = state.clone();
    state.grant(slot, &req);
    kani::assert(state.check_invariants().is_ok(), "grant keeps invariants");
    state.reclaim(slot, &req);

    kani::assert(state == before, "rollback must restore the prior state");
}

/// A single worker whose claim fits the system is always safe
#[kani::proof]
#[kani::unwind(4)]
fn proof_lone_worker_is_safe() {
    let existing = vec![any_units(3), any_units(3)];
    let mut state = ResourceState::new(AllocationPolicy::Avoidance, 2, existing.clone());
    let slot = WorkerSlot(1);
    state.bind(slot);
    state.set_claim(slot, &existing);

    let req = vec![any_units(3), any_units(3)];
    kani::assume(fits(&req, state.available()));
    state.grant(slot, &req);

    kani::assert(SafetyOracle::is_safe(&state), "lone claimant must be safe");
}
