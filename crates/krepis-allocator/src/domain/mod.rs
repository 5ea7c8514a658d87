//! Domain Layer - Allocation State and Pure Algorithms
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Domain Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  types       WorkerSlot, ResourceKind, Units, vector ops    │
//! │  error       AllocError taxonomy                            │
//! │  state       ResourceState (vectors, matrices, invariants)  │
//! │  safety      SafetyOracle     (need <= work reduction)      │
//! │  detection   DeadlockDetector (request <= work reduction)   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here locks or blocks. The oracle and the detector are pure
//! functions over a `ResourceState`; the adapters decide whether that is
//! the live, lock-protected store or a cloned snapshot.

pub mod detection;
pub mod error;
pub mod safety;
pub mod state;
pub mod types;

#[cfg(kani)]
mod proof;

pub use detection::{DeadlockDetector, DeadlockReport};
pub use error::{AllocError, AllocResult};
pub use safety::SafetyOracle;
pub use state::{InvariantViolation, ResourceState, StateSnapshot};
pub use types::{AllocationPolicy, ResourceKind, SlotBinding, Units, WorkerSlot};
