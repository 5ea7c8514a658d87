//! Core Types for Resource Allocation
//!
//! Identifiers are thin newtypes over `usize` so that a worker slot can never
//! be confused with a resource column. Unit counts are unsigned: a negative
//! allocation or availability is unrepresentable rather than merely checked.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Countable units of a single resource type
pub type Units = u32;

/// Worker slot index in `0..worker_count`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerSlot(pub usize);

impl WorkerSlot {
    /// Create a new worker slot
    #[inline(always)]
    pub const fn new(slot: usize) -> Self {
        Self(slot)
    }

    /// Get the underlying index
    #[inline(always)]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for WorkerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Resource type column in `0..resource_type_count`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKind(pub usize);

impl ResourceKind {
    /// Create a new resource kind
    #[inline(always)]
    pub const fn new(kind: usize) -> Self {
        Self(kind)
    }

    /// Get the underlying index
    #[inline(always)]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Deadlock handling policy, fixed for the lifetime of a manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPolicy {
    /// Banker's algorithm: grant only into safe states
    Avoidance,
    /// Grant greedily; deadlocks are found after the fact
    Detection,
}

impl AllocationPolicy {
    /// Map the classic `avoid` flag onto a policy
    pub fn from_flag(avoid: bool) -> Self {
        if avoid {
            Self::Avoidance
        } else {
            Self::Detection
        }
    }

    /// `true` for the Banker's policy
    pub fn is_avoidance(self) -> bool {
        matches!(self, Self::Avoidance)
    }
}

impl fmt::Display for AllocationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Avoidance => write!(f, "avoidance"),
            Self::Detection => write!(f, "detection"),
        }
    }
}

/// Registration state of a worker slot
///
/// Slots are one-shot: `Vacant -> Bound -> Ended`, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotBinding {
    /// No worker has registered on this slot yet
    Vacant,
    /// A worker holds a live token for this slot
    Bound,
    /// The worker signalled lifecycle end
    Ended,
}

impl SlotBinding {
    /// `true` while a token for this slot is live
    pub fn is_bound(self) -> bool {
        matches!(self, Self::Bound)
    }
}

/// First column where `demand[j] > bound[j]`
///
/// Returns the offending column with both values, or `None` when the demand
/// fits element-wise. Slices are assumed to have equal length.
pub fn first_excess(demand: &[Units], bound: &[Units]) -> Option<(ResourceKind, Units, Units)> {
    demand
        .iter()
        .zip(bound)
        .enumerate()
        .find(|(_, (d, b))| d > b)
        .map(|(j, (d, b))| (ResourceKind(j), *d, *b))
}

/// Element-wise `demand <= supply`
#[inline]
pub fn fits(demand: &[Units], supply: &[Units]) -> bool {
    demand.iter().zip(supply).all(|(d, s)| d <= s)
}

/// `true` if every entry is zero
#[inline]
pub fn is_zero(vector: &[Units]) -> bool {
    vector.iter().all(|&u| u == 0)
}

/// `target += delta`, element-wise
#[inline]
pub fn add_assign(target: &mut [Units], delta: &[Units]) {
    for (t, d) in target.iter_mut().zip(delta) {
        *t += d;
    }
}

/// `target -= delta`, element-wise
///
/// Callers check `fits(delta, target)` first; underflow is a logic error.
#[inline]
pub fn sub_assign(target: &mut [Units], delta: &[Units]) {
    for (t, d) in target.iter_mut().zip(delta) {
        debug_assert!(*t >= *d, "unit underflow: {} - {}", t, d);
        *t -= d;
    }
}
