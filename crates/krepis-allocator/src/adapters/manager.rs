//! ResourceManager - Admission Controller
//!
//! The only writer of the [`ResourceState`]. One `parking_lot::Mutex`
//! serializes every read and write, one `Condvar` signals "state changed,
//! re-evaluate". `request` is the only operation that suspends.
//!
//! # Request admission
//!
//! ```text
//! Detection:   pending := req
//!              wait until req <= available
//!              grant; pending := 0
//!
//! Avoidance:   need := claim - allocation;  req <= need or fail
//!              pending := req
//!              loop {
//!                  wait until req <= available
//!                  grant (tentative)
//!                  safe?  -> pending := 0; return
//!                  rollback; wait
//!              }
//! ```
//!
//! Every wake re-validates from scratch: a wake is a hint, never a promise.
//! `release` broadcasts to all waiters on the single shared condition; there
//! is no FIFO ordering among them.

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::domain::types::{first_excess, fits, is_zero};
use crate::domain::{
    AllocError, AllocResult, AllocationPolicy, DeadlockDetector, DeadlockReport, ResourceState,
    SafetyOracle, SlotBinding, StateSnapshot, Units, WorkerSlot,
};
use crate::infrastructure::{ManagerConfig, ManagerLimits};

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Worker Token
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Opaque registration handle returned by [`ResourceManager::register_start`]
///
/// Every later call from the worker presents it. The token is `Send` but not
/// `Sync` and not `Clone`: exactly one thread acts for a slot at a time, and
/// [`ResourceManager::register_end`] consumes it.
#[derive(Debug)]
pub struct WorkerToken {
    manager: u64,
    slot: WorkerSlot,
    _not_sync: PhantomData<Cell<()>>,
}

impl WorkerToken {
    /// Slot this token is bound to
    pub fn slot(&self) -> WorkerSlot {
        self.slot
    }
}

/// Outcome of a successful request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    /// Requesting slot
    pub slot: WorkerSlot,
    /// Times the caller suspended before the grant
    pub waits: u32,
    /// Tentative grants rolled back as unsafe (avoidance only)
    pub rollbacks: u32,
}

impl Grant {
    /// `true` if the grant needed no suspension
    pub fn was_immediate(&self) -> bool {
        self.waits == 0
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resource Manager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Shared resource manager for a fixed population of workers
///
/// Share it across threads with `Arc<ResourceManager>`.
///
/// ```rust
/// use krepis_allocator::adapters::ResourceManager;
/// use krepis_allocator::infrastructure::ManagerConfig;
///
/// let config = ManagerConfig::builder().workers(2).existing([3]).avoidance(true).build();
/// let manager = ResourceManager::new(config).unwrap();
///
/// let token = manager.register_start(0).unwrap();
/// manager.declare_claim(&token, &[2]).unwrap();
/// let grant = manager.request(&token, &[2]).unwrap();
/// assert!(grant.was_immediate());
/// manager.release(&token, &[2]).unwrap();
/// manager.register_end(token).unwrap();
/// ```
pub struct ResourceManager {
    id: u64,
    policy: AllocationPolicy,
    worker_count: usize,
    resource_count: usize,
    state: Mutex<ResourceState>,
    changed: Condvar,
}

impl ResourceManager {
    /// Initialize with the default limits
    pub fn new(config: ManagerConfig) -> AllocResult<Self> {
        Self::with_limits(config, ManagerLimits::default())
    }

    /// Initialize against explicit limits
    pub fn with_limits(config: ManagerConfig, limits: ManagerLimits) -> AllocResult<Self> {
        config.validate(&limits)?;

        let id = NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed);
        let ManagerConfig {
            worker_count,
            existing,
            policy,
        } = config;
        let resource_count = existing.len();

        info!(
            manager = id,
            workers = worker_count,
            resources = resource_count,
            %policy,
            "resource manager initialized"
        );

        Ok(Self {
            id,
            policy,
            worker_count,
            resource_count,
            state: Mutex::new(ResourceState::new(policy, worker_count, existing)),
            changed: Condvar::new(),
        })
    }

    /// Active policy
    pub fn policy(&self) -> AllocationPolicy {
        self.policy
    }

    /// Number of worker slots (N)
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Number of resource types (M)
    pub fn resource_count(&self) -> usize {
        self.resource_count
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Registration
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Bind the caller to `slot` and reset its row
    pub fn register_start(&self, slot: usize) -> AllocResult<WorkerToken> {
        if slot >= self.worker_count {
            return Err(AllocError::InvalidSlot {
                slot,
                worker_count: self.worker_count,
            });
        }
        let slot = WorkerSlot::new(slot);

        let mut state = self.state.lock();
        if state.binding(slot) != SlotBinding::Vacant {
            return Err(AllocError::SlotOccupied(slot));
        }
        state.bind(slot);
        self.debug_check(&state);
        drop(state);

        info!(manager = self.id, %slot, "worker started");
        Ok(WorkerToken {
            manager: self.id,
            slot,
            _not_sync: PhantomData,
        })
    }

    /// Mark the worker finished and retire its token
    pub fn register_end(&self, token: WorkerToken) -> AllocResult<()> {
        let mut state = self.state.lock();
        let slot = self.resolve(&state, &token)?;

        if !is_zero(state.allocation(slot)) {
            warn!(
                manager = self.id,
                %slot,
                held = ?state.allocation(slot),
                "worker ended while still holding units"
            );
        }
        state.end(slot);
        self.debug_check(&state);
        drop(state);

        // A finished worker no longer blocks the safety reduction.
        self.changed.notify_all();
        info!(manager = self.id, %slot, "worker ended");
        Ok(())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Claim / Request / Release
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Declare the worker's maximum demand (avoidance only)
    ///
    /// Wakes every waiter. The claim itself is not checked for safety.
    pub fn declare_claim(&self, token: &WorkerToken, claim: &[Units]) -> AllocResult<()> {
        if !self.policy.is_avoidance() {
            return Err(AllocError::PolicyMismatch);
        }

        let mut state = self.state.lock();
        let slot = self.resolve(&state, token)?;
        self.check_dimension(claim)?;

        if let Some((kind, claimed, existing)) = first_excess(claim, state.existing()) {
            return Err(AllocError::ClaimExceedsExisting {
                kind,
                claimed,
                existing,
            });
        }
        if let Some((kind, allocated, claimed)) = first_excess(state.allocation(slot), claim) {
            return Err(AllocError::ClaimBelowAllocation {
                kind,
                claimed,
                allocated,
            });
        }

        state.set_claim(slot, claim);
        self.debug_check(&state);
        drop(state);

        // A lowered claim can turn a rolled-back grant safe.
        self.changed.notify_all();
        debug!(manager = self.id, %slot, ?claim, "claim declared");
        Ok(())
    }

    /// Acquire `request` units, blocking until they can be granted
    ///
    /// Under avoidance the grant only happens into a safe global state. No
    /// timeout: a request that can never be satisfied blocks forever.
    pub fn request(&self, token: &WorkerToken, request: &[Units]) -> AllocResult<Grant> {
        let mut state = self.state.lock();
        let slot = self.resolve(&state, token)?;
        self.check_dimension(request)?;

        if let Some((kind, requested, existing)) = first_excess(request, state.existing()) {
            return Err(AllocError::RequestExceedsExisting {
                kind,
                requested,
                existing,
            });
        }

        if self.policy.is_avoidance() {
            state.refresh_need(slot);
            if let Some((kind, requested, need)) = first_excess(request, state.need(slot)) {
                return Err(AllocError::RequestExceedsNeed {
                    kind,
                    requested,
                    need,
                });
            }
        }

        let mut grant = Grant {
            slot,
            waits: 0,
            rollbacks: 0,
        };
        // Under avoidance even an empty request returns only into a safe state.
        if is_zero(request) && !self.policy.is_avoidance() {
            return Ok(grant);
        }

        state.set_pending(slot, request);
        match self.policy {
            AllocationPolicy::Detection => {
                self.wait_for_units(&mut state, slot, request, &mut grant);
                state.grant(slot, request);
            }
            AllocationPolicy::Avoidance => loop {
                self.wait_for_units(&mut state, slot, request, &mut grant);
                state.grant(slot, request);
                if SafetyOracle::is_safe(&state) {
                    break;
                }
                state.reclaim(slot, request);
                grant.rollbacks += 1;
                grant.waits += 1;
                debug!(manager = self.id, %slot, ?request, "unsafe grant rolled back");
                self.changed.wait(&mut state);
            },
        }
        state.clear_pending(slot);
        self.debug_check(&state);

        debug!(
            manager = self.id,
            %slot,
            ?request,
            waits = grant.waits,
            rollbacks = grant.rollbacks,
            "request granted"
        );
        Ok(grant)
    }

    /// Return units to the pool and wake every waiter
    ///
    /// A zero vector is a no-op.
    pub fn release(&self, token: &WorkerToken, release: &[Units]) -> AllocResult<()> {
        let mut state = self.state.lock();
        let slot = self.resolve(&state, token)?;
        self.check_dimension(release)?;

        if let Some((kind, released, allocated)) = first_excess(release, state.allocation(slot)) {
            return Err(AllocError::ReleaseExceedsAllocation {
                kind,
                released,
                allocated,
            });
        }
        if is_zero(release) {
            return Ok(());
        }

        state.reclaim(slot, release);
        self.debug_check(&state);
        drop(state);

        self.changed.notify_all();
        debug!(manager = self.id, %slot, ?release, "units released");
        Ok(())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Queries
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Run the detection engine on the current state
    pub fn detect_deadlock(&self) -> DeadlockReport {
        let state = self.state.lock();
        DeadlockDetector::detect(&state)
    }

    /// Run the safety oracle on the current state
    pub fn is_safe(&self) -> bool {
        let state = self.state.lock();
        SafetyOracle::is_safe(&state)
    }

    /// Read-only copy of every vector and matrix
    pub fn snapshot(&self) -> StateSnapshot {
        self.state.lock().clone()
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Internals
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn resolve(&self, state: &ResourceState, token: &WorkerToken) -> AllocResult<WorkerSlot> {
        let slot = token.slot;
        if token.manager != self.id
            || slot.as_usize() >= self.worker_count
            || !state.binding(slot).is_bound()
        {
            return Err(AllocError::UnknownCaller);
        }
        Ok(slot)
    }

    fn check_dimension(&self, vector: &[Units]) -> AllocResult<()> {
        if vector.len() != self.resource_count {
            return Err(AllocError::DimensionMismatch {
                expected: self.resource_count,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Suspend until `request <= available`, re-checking after every wake
    fn wait_for_units(
        &self,
        state: &mut MutexGuard<'_, ResourceState>,
        slot: WorkerSlot,
        request: &[Units],
        grant: &mut Grant,
    ) {
        while !fits(request, state.available()) {
            grant.waits += 1;
            debug!(manager = self.id, %slot, ?request, available = ?state.available(), "request blocked");
            self.changed.wait(state);
        }
    }

    fn debug_check(&self, state: &ResourceState) {
        debug_assert_eq!(state.check_invariants(), Ok(()));
    }
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("id", &self.id)
            .field("policy", &self.policy)
            .field("worker_count", &self.worker_count)
            .field("resource_count", &self.resource_count)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ResourceKind;

    fn manager(workers: usize, existing: Vec<Units>, avoid: bool) -> ResourceManager {
        let config = ManagerConfig::builder()
            .workers(workers)
            .existing(existing)
            .avoidance(avoid)
            .build();
        ResourceManager::new(config).unwrap()
    }

    #[test]
    fn test_invalid_configuration() {
        let config = ManagerConfig::new(0, vec![1], AllocationPolicy::Detection);
        assert!(matches!(
            ResourceManager::new(config),
            Err(AllocError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_register_out_of_range() {
        let rm = manager(2, vec![1], false);
        assert_eq!(
            rm.register_start(2).unwrap_err(),
            AllocError::InvalidSlot {
                slot: 2,
                worker_count: 2
            }
        );
    }

    #[test]
    fn test_slots_are_one_shot() {
        let rm = manager(1, vec![1], false);
        let token = rm.register_start(0).unwrap();
        assert_eq!(
            rm.register_start(0).unwrap_err(),
            AllocError::SlotOccupied(WorkerSlot(0))
        );
        rm.register_end(token).unwrap();
        assert_eq!(
            rm.register_start(0).unwrap_err(),
            AllocError::SlotOccupied(WorkerSlot(0))
        );
    }

    #[test]
    fn test_registration_clears_finished_flag() {
        let rm = manager(2, vec![1], false);
        let token = rm.register_start(1).unwrap();
        let snap = rm.snapshot();
        assert!(!snap.is_finished(WorkerSlot(1)));
        assert!(snap.is_finished(WorkerSlot(0)));
        rm.register_end(token).unwrap();
        assert!(rm.snapshot().is_finished(WorkerSlot(1)));
    }

    #[test]
    fn test_foreign_token_is_unknown_caller() {
        let a = manager(1, vec![1], false);
        let b = manager(1, vec![1], false);
        let token = a.register_start(0).unwrap();
        assert_eq!(b.request(&token, &[1]).unwrap_err(), AllocError::UnknownCaller);
        assert_eq!(b.release(&token, &[0]).unwrap_err(), AllocError::UnknownCaller);
        assert_eq!(b.register_end(token).unwrap_err(), AllocError::UnknownCaller);
    }

    #[test]
    fn test_claim_requires_avoidance() {
        let rm = manager(1, vec![3], false);
        let token = rm.register_start(0).unwrap();
        assert_eq!(rm.declare_claim(&token, &[1]).unwrap_err(), AllocError::PolicyMismatch);
    }

    #[test]
    fn test_claim_exceeding_existing_leaves_state_untouched() {
        let rm = manager(1, vec![3, 3], true);
        let token = rm.register_start(0).unwrap();
        rm.declare_claim(&token, &[1, 1]).unwrap();
        let before = rm.snapshot();

        assert_eq!(
            rm.declare_claim(&token, &[2, 4]).unwrap_err(),
            AllocError::ClaimExceedsExisting {
                kind: ResourceKind(1),
                claimed: 4,
                existing: 3
            }
        );
        assert_eq!(rm.snapshot(), before);
    }

    #[test]
    fn test_claim_recomputes_need_after_allocation() {
        let rm = manager(1, vec![5], true);
        let token = rm.register_start(0).unwrap();
        rm.declare_claim(&token, &[2]).unwrap();
        rm.request(&token, &[2]).unwrap();

        rm.declare_claim(&token, &[4]).unwrap();
        assert_eq!(rm.snapshot().need(WorkerSlot(0)), &[2]);
        assert!(matches!(
            rm.declare_claim(&token, &[1]),
            Err(AllocError::ClaimBelowAllocation { .. })
        ));
    }

    #[test]
    fn test_request_exceeding_existing() {
        let rm = manager(1, vec![2], false);
        let token = rm.register_start(0).unwrap();
        assert!(matches!(
            rm.request(&token, &[3]),
            Err(AllocError::RequestExceedsExisting { .. })
        ));
        assert_eq!(rm.snapshot().request(WorkerSlot(0)), &[0]);
    }

    #[test]
    fn test_request_exceeding_need_leaves_state_untouched() {
        let rm = manager(1, vec![5], true);
        let token = rm.register_start(0).unwrap();
        rm.declare_claim(&token, &[2]).unwrap();
        let before = rm.snapshot();
        assert_eq!(
            rm.request(&token, &[3]).unwrap_err(),
            AllocError::RequestExceedsNeed {
                kind: ResourceKind(0),
                requested: 3,
                need: 2
            }
        );
        assert_eq!(rm.snapshot(), before);
    }

    #[test]
    fn test_dimension_mismatch() {
        let rm = manager(1, vec![2, 2], false);
        let token = rm.register_start(0).unwrap();
        assert_eq!(
            rm.request(&token, &[1]).unwrap_err(),
            AllocError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_detection_request_and_release() {
        let rm = manager(2, vec![3, 1], false);
        let token = rm.register_start(0).unwrap();
        let grant = rm.request(&token, &[2, 1]).unwrap();
        assert!(grant.was_immediate());

        let snap = rm.snapshot();
        assert_eq!(snap.available(), &[1, 0]);
        assert_eq!(snap.allocation(WorkerSlot(0)), &[2, 1]);
        assert_eq!(snap.request(WorkerSlot(0)), &[0, 0]);

        rm.release(&token, &[2, 1]).unwrap();
        assert_eq!(rm.snapshot().available(), &[3, 1]);
    }

    #[test]
    fn test_release_more_than_held() {
        let rm = manager(1, vec![3], false);
        let token = rm.register_start(0).unwrap();
        rm.request(&token, &[1]).unwrap();
        assert_eq!(
            rm.release(&token, &[2]).unwrap_err(),
            AllocError::ReleaseExceedsAllocation {
                kind: ResourceKind(0),
                released: 2,
                allocated: 1
            }
        );
    }

    #[test]
    fn test_zero_release_is_noop() {
        let rm = manager(1, vec![3], true);
        let token = rm.register_start(0).unwrap();
        let before = rm.snapshot();
        rm.release(&token, &[0]).unwrap();
        assert_eq!(rm.snapshot(), before);
    }

    #[test]
    fn test_release_restores_need() {
        let rm = manager(1, vec![4], true);
        let token = rm.register_start(0).unwrap();
        rm.declare_claim(&token, &[3]).unwrap();
        rm.request(&token, &[3]).unwrap();
        assert_eq!(rm.snapshot().need(WorkerSlot(0)), &[0]);
        rm.release(&token, &[2]).unwrap();
        assert_eq!(rm.snapshot().need(WorkerSlot(0)), &[2]);
    }
}
