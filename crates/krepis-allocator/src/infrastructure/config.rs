//! # Manager Configuration
//!
//! Parameters fixed once at initialization: worker count, the existing
//! vector, and the policy. Bounds are startup constants, never grown at
//! runtime.
//!
//! ```json
//! { "worker_count": 4, "existing": [8, 6, 7, 5, 9, 4], "policy": "avoidance" }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{AllocError, AllocResult, AllocationPolicy, Units};

/// Hard upper bound on worker slots
pub const MAX_WORKERS: usize = 64;

/// Hard upper bound on resource types
pub const MAX_RESOURCE_TYPES: usize = 64;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Limits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configured maxima, at most the compile-time constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerLimits {
    /// Maximum worker count accepted at initialization
    pub max_workers: usize,
    /// Maximum resource type count accepted at initialization
    pub max_resource_types: usize,
}

impl ManagerLimits {
    /// Reject limits above the compile-time ceiling
    pub fn validate(&self) -> AllocResult<()> {
        if self.max_workers > MAX_WORKERS || self.max_resource_types > MAX_RESOURCE_TYPES {
            return Err(AllocError::InvalidConfiguration(format!(
                "limits {}x{} exceed ceiling {}x{}",
                self.max_workers, self.max_resource_types, MAX_WORKERS, MAX_RESOURCE_TYPES
            )));
        }
        Ok(())
    }
}

impl Default for ManagerLimits {
    fn default() -> Self {
        Self {
            max_workers: MAX_WORKERS,
            max_resource_types: MAX_RESOURCE_TYPES,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Manager Config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Startup parameters of a resource manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Number of worker slots (N)
    pub worker_count: usize,

    /// Total units per resource type; its length is M
    pub existing: Vec<Units>,

    /// Deadlock handling policy
    #[serde(default = "default_policy")]
    pub policy: AllocationPolicy,
}

fn default_policy() -> AllocationPolicy {
    AllocationPolicy::Avoidance
}

impl ManagerConfig {
    /// Create a configuration
    pub fn new(worker_count: usize, existing: Vec<Units>, policy: AllocationPolicy) -> Self {
        Self {
            worker_count,
            existing,
            policy,
        }
    }

    /// Start a builder
    pub fn builder() -> ManagerConfigBuilder {
        ManagerConfigBuilder::new()
    }

    /// Number of resource types (M)
    pub fn resource_count(&self) -> usize {
        self.existing.len()
    }

    /// Check counts against `limits`
    pub fn validate(&self, limits: &ManagerLimits) -> AllocResult<()> {
        limits.validate()?;

        if self.worker_count == 0 || self.worker_count > limits.max_workers {
            return Err(AllocError::InvalidConfiguration(format!(
                "worker_count {} outside 1..={}",
                self.worker_count, limits.max_workers
            )));
        }

        let m = self.resource_count();
        if m == 0 || m > limits.max_resource_types {
            return Err(AllocError::InvalidConfiguration(format!(
                "resource type count {} outside 1..={}",
                m, limits.max_resource_types
            )));
        }

        Ok(())
    }

    /// Parse a JSON document
    ///
    /// Negative or non-integer unit counts fail here, as do unknown policies.
    pub fn from_json_str(json: &str) -> AllocResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| AllocError::InvalidConfiguration(format!("malformed config: {}", e)))?;
        config.validate(&ManagerLimits::default())?;
        Ok(config)
    }

    /// Read and parse a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> AllocResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AllocError::InvalidConfiguration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Builder
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Builder for [`ManagerConfig`]
///
/// Defaults: 1 worker, no resource types, avoidance policy. Validation is
/// deferred to manager construction.
///
/// ```rust
/// use krepis_allocator::infrastructure::ManagerConfig;
///
/// let config = ManagerConfig::builder()
///     .workers(3)
///     .existing([10])
///     .avoidance(true)
///     .build();
/// assert_eq!(config.resource_count(), 1);
/// ```
pub struct ManagerConfigBuilder {
    worker_count: usize,
    existing: Vec<Units>,
    policy: AllocationPolicy,
}

impl ManagerConfigBuilder {
    /// Create new builder with default configuration
    pub fn new() -> Self {
        Self {
            worker_count: 1,
            existing: Vec::new(),
            policy: AllocationPolicy::Avoidance,
        }
    }

    /// Set number of worker slots
    pub fn workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the existing vector
    pub fn existing(mut self, existing: impl IntoIterator<Item = Units>) -> Self {
        self.existing = existing.into_iter().collect();
        self
    }

    /// Set the policy
    pub fn policy(mut self, policy: AllocationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shorthand for the classic avoid flag
    pub fn avoidance(self, avoid: bool) -> Self {
        self.policy(AllocationPolicy::from_flag(avoid))
    }

    /// Build the configuration
    pub fn build(self) -> ManagerConfig {
        ManagerConfig::new(self.worker_count, self.existing, self.policy)
    }
}

impl Default for ManagerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
