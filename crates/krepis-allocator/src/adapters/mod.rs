//! Adapters Layer - Concurrent Surface over the Domain
//!
//! - `manager`: lock + condition wrapper; the only writer of the state
//! - `monitor`: background detection poller
//! - `report`: text rendering of snapshots

pub mod manager;
pub mod monitor;
pub mod report;

pub use manager::{Grant, ResourceManager, WorkerToken};
pub use monitor::{DeadlockMonitor, MonitorHandle};
pub use report::StateReport;
