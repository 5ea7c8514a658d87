//! Domain Model: Resource State Store
//!
//! The authoritative vectors and matrices. This type owns data and
//! invariants only; the admission rules live in the manager, which is the
//! single writer and holds it behind one mutex.
//!
//! # Layout
//!
//! ```text
//! existing[M]       total units per type (immutable)
//! available[M]      existing - Σ allocation
//! allocation[N][M]  units held per worker
//! request[N][M]     outstanding, not-yet-granted request
//! max_claim[N][M]   declared maximum demand   (avoidance only)
//! need[N][M]        max_claim - allocation    (avoidance only)
//! finished[N]       lifecycle ended (all slots start finished)
//! ```
//!
//! A cloned `ResourceState` doubles as the read-only snapshot handed to
//! diagnostics: every mutator is crate-private.

use serde::Serialize;

use super::error::{AllocError, AllocResult};
use super::types::{
    add_assign, first_excess, fits, sub_assign, AllocationPolicy, ResourceKind, SlotBinding,
    Units, WorkerSlot,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Invariant Violations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A broken store invariant
///
/// Never produced by a correct manager; surfaced by `check_invariants` for
/// tests and debug assertions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// `available[j] + Σ allocation[i][j] != existing[j]`
    #[error("conservation broken for {kind}: available {available} + allocated {allocated} != existing {existing}")]
    Conservation {
        /// Offending resource type
        kind: ResourceKind,
        /// Units in the pool
        available: Units,
        /// Column sum of the allocation matrix
        allocated: u64,
        /// Configured total
        existing: Units,
    },

    /// `allocation[i][j] > existing[j]`
    #[error("{slot} holds more {kind} than exist")]
    AllocationAboveExisting {
        /// Offending worker
        slot: WorkerSlot,
        /// Offending resource type
        kind: ResourceKind,
    },

    /// `allocation[i][j] > max_claim[i][j]` under avoidance
    #[error("{slot} holds more {kind} than it claimed")]
    AllocationAboveClaim {
        /// Offending worker
        slot: WorkerSlot,
        /// Offending resource type
        kind: ResourceKind,
    },

    /// `need[i][j] != max_claim[i][j] - allocation[i][j]` under avoidance
    #[error("{slot} need for {kind} is stale")]
    NeedMismatch {
        /// Offending worker
        slot: WorkerSlot,
        /// Offending resource type
        kind: ResourceKind,
    },

    /// Pending request larger than the existing vector
    #[error("{slot} pending request for {kind} exceeds existing")]
    RequestAboveExisting {
        /// Offending worker
        slot: WorkerSlot,
        /// Offending resource type
        kind: ResourceKind,
    },

    /// Pending request larger than remaining need under avoidance
    #[error("{slot} pending request for {kind} exceeds need")]
    RequestAboveNeed {
        /// Offending worker
        slot: WorkerSlot,
        /// Offending resource type
        kind: ResourceKind,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resource State
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Owned copy of the state returned by `ResourceManager::snapshot`
pub type StateSnapshot = ResourceState;

/// Shared allocation state for `N` workers and `M` resource types
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceState {
    policy: AllocationPolicy,
    existing: Vec<Units>,
    available: Vec<Units>,
    allocation: Vec<Vec<Units>>,
    request: Vec<Vec<Units>>,
    max_claim: Vec<Vec<Units>>,
    need: Vec<Vec<Units>>,
    finished: Vec<bool>,
    binding: Vec<SlotBinding>,
}

impl ResourceState {
    /// Fresh store: everything available, every slot vacant and finished
    ///
    /// Bounds are validated by the configuration layer before this is called.
    pub(crate) fn new(policy: AllocationPolicy, worker_count: usize, existing: Vec<Units>) -> Self {
        let m = existing.len();
        Self {
            policy,
            available: existing.clone(),
            existing,
            allocation: vec![vec![0; m]; worker_count],
            request: vec![vec![0; m]; worker_count],
            max_claim: vec![vec![0; m]; worker_count],
            need: vec![vec![0; m]; worker_count],
            finished: vec![true; worker_count],
            binding: vec![SlotBinding::Vacant; worker_count],
        }
    }

    /// Rebuild a state from its independent matrices
    ///
    /// `available` and `need` are derived. Slots marked unfinished are
    /// treated as bound. Used to analyse recorded states offline and to
    /// build fixtures.
    pub fn from_matrices(
        policy: AllocationPolicy,
        existing: Vec<Units>,
        allocation: Vec<Vec<Units>>,
        request: Vec<Vec<Units>>,
        max_claim: Option<Vec<Vec<Units>>>,
        finished: Vec<bool>,
    ) -> AllocResult<Self> {
        let n = finished.len();
        let m = existing.len();
        let max_claim = max_claim.unwrap_or_else(|| vec![vec![0; m]; n]);

        let shaped = |rows: &Vec<Vec<Units>>| rows.len() == n && rows.iter().all(|r| r.len() == m);
        if !shaped(&allocation) || !shaped(&request) || !shaped(&max_claim) {
            return Err(AllocError::InvalidConfiguration(format!(
                "matrices must be {}x{}",
                n, m
            )));
        }

        let mut available = existing.clone();
        for row in &allocation {
            if !fits(row, &available) {
                return Err(AllocError::InvalidConfiguration(
                    "allocations exceed existing units".to_string(),
                ));
            }
            sub_assign(&mut available, row);
        }

        let mut need = vec![vec![0; m]; n];
        if policy.is_avoidance() {
            for i in 0..n {
                if let Some((kind, _, _)) = first_excess(&allocation[i], &max_claim[i]) {
                    return Err(AllocError::InvalidConfiguration(format!(
                        "T{} allocation of {} exceeds its claim",
                        i, kind
                    )));
                }
                need[i] = max_claim[i]
                    .iter()
                    .zip(&allocation[i])
                    .map(|(c, a)| c - a)
                    .collect();
            }
        }

        let binding = finished
            .iter()
            .map(|&f| if f { SlotBinding::Ended } else { SlotBinding::Bound })
            .collect();

        let state = Self {
            policy,
            existing,
            available,
            allocation,
            request,
            max_claim,
            need,
            finished,
            binding,
        };
        state
            .check_invariants()
            .map_err(|v| AllocError::InvalidConfiguration(v.to_string()))?;
        Ok(state)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Queries
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Active policy
    pub fn policy(&self) -> AllocationPolicy {
        self.policy
    }

    /// Number of worker slots (N)
    pub fn worker_count(&self) -> usize {
        self.finished.len()
    }

    /// Number of resource types (M)
    pub fn resource_count(&self) -> usize {
        self.existing.len()
    }

    /// All worker slots in ascending order
    pub fn workers(&self) -> impl Iterator<Item = WorkerSlot> {
        (0..self.worker_count()).map(WorkerSlot)
    }

    /// Total units per type
    pub fn existing(&self) -> &[Units] {
        &self.existing
    }

    /// Unallocated units per type
    pub fn available(&self) -> &[Units] {
        &self.available
    }

    /// Units held by `slot`
    pub fn allocation(&self, slot: WorkerSlot) -> &[Units] {
        &self.allocation[slot.0]
    }

    /// Outstanding request of `slot` (all zero when none)
    pub fn request(&self, slot: WorkerSlot) -> &[Units] {
        &self.request[slot.0]
    }

    /// Declared maximum demand of `slot`
    pub fn max_claim(&self, slot: WorkerSlot) -> &[Units] {
        &self.max_claim[slot.0]
    }

    /// Remaining need of `slot`
    pub fn need(&self, slot: WorkerSlot) -> &[Units] {
        &self.need[slot.0]
    }

    /// Whether `slot` has ended (or never started)
    pub fn is_finished(&self, slot: WorkerSlot) -> bool {
        self.finished[slot.0]
    }

    /// Registration state of `slot`
    pub fn binding(&self, slot: WorkerSlot) -> SlotBinding {
        self.binding[slot.0]
    }

    /// Sum of one column of the allocation matrix
    pub fn allocated_total(&self, kind: ResourceKind) -> u64 {
        self.allocation.iter().map(|row| u64::from(row[kind.0])).sum()
    }

    /// Verify every store invariant
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for j in 0..self.resource_count() {
            let kind = ResourceKind(j);
            let allocated = self.allocated_total(kind);
            if u64::from(self.available[j]) + allocated != u64::from(self.existing[j]) {
                return Err(InvariantViolation::Conservation {
                    kind,
                    available: self.available[j],
                    allocated,
                    existing: self.existing[j],
                });
            }
        }

        for slot in self.workers() {
            let i = slot.0;
            if let Some((kind, _, _)) = first_excess(&self.allocation[i], &self.existing) {
                return Err(InvariantViolation::AllocationAboveExisting { slot, kind });
            }
            if let Some((kind, _, _)) = first_excess(&self.request[i], &self.existing) {
                return Err(InvariantViolation::RequestAboveExisting { slot, kind });
            }
            if !self.policy.is_avoidance() {
                continue;
            }
            if let Some((kind, _, _)) = first_excess(&self.allocation[i], &self.max_claim[i]) {
                return Err(InvariantViolation::AllocationAboveClaim { slot, kind });
            }
            for j in 0..self.resource_count() {
                if self.need[i][j] != self.max_claim[i][j] - self.allocation[i][j] {
                    return Err(InvariantViolation::NeedMismatch {
                        slot,
                        kind: ResourceKind(j),
                    });
                }
            }
            if let Some((kind, _, _)) = first_excess(&self.request[i], &self.need[i]) {
                return Err(InvariantViolation::RequestAboveNeed { slot, kind });
            }
        }

        Ok(())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Mutators (manager only)
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Reset the row of `slot` and mark it running
    pub(crate) fn bind(&mut self, slot: WorkerSlot) {
        let i = slot.0;
        // The row is zero for a vacant slot; returning held units keeps
        // conservation intact should that ever change.
        let held = std::mem::take(&mut self.allocation[i]);
        add_assign(&mut self.available, &held);
        let m = self.resource_count();
        self.allocation[i] = vec![0; m];
        self.request[i] = vec![0; m];
        self.max_claim[i] = vec![0; m];
        self.need[i] = vec![0; m];
        self.finished[i] = false;
        self.binding[i] = SlotBinding::Bound;
    }

    /// Mark `slot` as ended
    pub(crate) fn end(&mut self, slot: WorkerSlot) {
        self.finished[slot.0] = true;
        self.binding[slot.0] = SlotBinding::Ended;
    }

    /// Record a claim; `need` follows as `claim - allocation`
    pub(crate) fn set_claim(&mut self, slot: WorkerSlot, claim: &[Units]) {
        self.max_claim[slot.0] = claim.to_vec();
        self.refresh_need(slot);
    }

    /// Recompute `need[slot] = max_claim[slot] - allocation[slot]`
    pub(crate) fn refresh_need(&mut self, slot: WorkerSlot) {
        let i = slot.0;
        for j in 0..self.resource_count() {
            self.need[i][j] = self.max_claim[i][j] - self.allocation[i][j];
        }
    }

    /// Record an outstanding request
    pub(crate) fn set_pending(&mut self, slot: WorkerSlot, request: &[Units]) {
        self.request[slot.0].copy_from_slice(request);
    }

    /// Forget the outstanding request
    pub(crate) fn clear_pending(&mut self, slot: WorkerSlot) {
        self.request[slot.0].iter_mut().for_each(|u| *u = 0);
    }

    /// Move `units` from the pool to `slot`
    ///
    /// Caller guarantees `units <= available` (and `<= need` under avoidance).
    pub(crate) fn grant(&mut self, slot: WorkerSlot, units: &[Units]) {
        let i = slot.0;
        sub_assign(&mut self.available, units);
        add_assign(&mut self.allocation[i], units);
        if self.policy.is_avoidance() {
            sub_assign(&mut self.need[i], units);
        }
    }

    /// Return `units` from `slot` to the pool
    ///
    /// Exact inverse of [`grant`](Self::grant); serves both rollback and
    /// release. Caller guarantees `units <= allocation[slot]`.
    pub(crate) fn reclaim(&mut self, slot: WorkerSlot, units: &[Units]) {
        let i = slot.0;
        add_assign(&mut self.available, units);
        sub_assign(&mut self.allocation[i], units);
        if self.policy.is_avoidance() {
            add_assign(&mut self.need[i], units);
        }
    }
}
