//! Infrastructure Layer
//!
//! Startup configuration: bounds, policy, and loading from JSON documents.

pub mod config;

pub use config::{ManagerConfig, ManagerConfigBuilder, ManagerLimits, MAX_RESOURCE_TYPES, MAX_WORKERS};
