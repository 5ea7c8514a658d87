//! Krepis Allocator
//!
//! # Overview
//!
//! `krepis-allocator` is a deadlock-aware resource manager shared by a fixed
//! population of worker threads competing for `M` types of countable
//! resources. It runs under one of two policies chosen at startup:
//!
//! - **Avoidance** (Banker's algorithm): workers declare a maximum claim; a
//!   request is granted only if the resulting global state is safe.
//!   Unsafe tentative grants are rolled back and the caller waits.
//! - **Detection**: requests are granted as soon as units are available;
//!   [`ResourceManager::detect_deadlock`] reports workers that can never
//!   complete.
//!
//! # Trinity Architecture
//!
//! - **Domain**: state store, safety oracle, detector (pure, lock-free)
//! - **Adapters**: the concurrent manager, monitor, and reporter
//! - **Infrastructure**: configuration and limits
//!
//! # Invariants
//!
//! - **Conservation**: `available[j] + Σ allocation[i][j] == existing[j]`
//! - **Claim bound**: `allocation[i] <= max_claim[i]` under avoidance
//! - **Need**: `need[i] == max_claim[i] - allocation[i]` under avoidance
//! - **Safety**: under avoidance every state observable outside the lock is
//!   safe
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//!
//! use krepis_allocator::{ManagerConfig, ResourceManager};
//!
//! let config = ManagerConfig::builder().workers(2).existing([4, 2]).avoidance(true).build();
//! let manager = Arc::new(ResourceManager::new(config).unwrap());
//!
//! let workers: Vec<_> = (0..2)
//!     .map(|slot| {
//!         let rm = Arc::clone(&manager);
//!         thread::spawn(move || {
//!             let token = rm.register_start(slot).unwrap();
//!             rm.declare_claim(&token, &[2, 1]).unwrap();
//!             rm.request(&token, &[2, 1]).unwrap();
//!             rm.release(&token, &[2, 1]).unwrap();
//!             rm.register_end(token).unwrap();
//!         })
//!     })
//!     .collect();
//!
//! for w in workers {
//!     w.join().unwrap();
//! }
//! assert_eq!(manager.snapshot().available(), &[4, 2]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod infrastructure;

pub use adapters::{DeadlockMonitor, Grant, MonitorHandle, ResourceManager, StateReport, WorkerToken};
pub use domain::{
    AllocError, AllocResult, AllocationPolicy, DeadlockDetector, DeadlockReport, ResourceKind,
    ResourceState, SafetyOracle, StateSnapshot, Units, WorkerSlot,
};
pub use infrastructure::{ManagerConfig, ManagerLimits};
