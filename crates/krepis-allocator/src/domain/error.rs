//! Domain Model: Allocation Error Types
//!
//! Every failure is detected and reported before the store is touched, so
//! an `Err` from the manager always means "nothing changed".

use super::types::{ResourceKind, Units, WorkerSlot};

/// Convenience alias used across the crate
pub type AllocResult<T> = Result<T, AllocError>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Allocation Error Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Errors raised by the resource manager
///
/// # Categories
///
/// - 1000-1099: Configuration (fatal, the manager was never built)
/// - 2000-2099: Identity resolution (caller bug)
/// - 3000-3099: Policy misuse (caller bug)
/// - 4000-4099: Value bounds (caller bug)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Configuration Errors (1000-1099)
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Bad startup parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Identity Errors (2000-2099)
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Slot index outside `0..worker_count`
    #[error("Invalid slot {slot}: manager has {worker_count} worker slots")]
    InvalidSlot {
        /// Requested slot
        slot: usize,
        /// Configured worker count
        worker_count: usize,
    },

    /// Slot already registered during this run
    #[error("Slot {0} is already bound or has ended")]
    SlotOccupied(WorkerSlot),

    /// Token does not resolve to a live slot of this manager
    #[error("Unknown caller: token is not bound to this manager")]
    UnknownCaller,

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Policy Errors (3000-3099)
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Claim declared while the manager runs in detection mode
    #[error("Claims are only accepted under the avoidance policy")]
    PolicyMismatch,

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Value Bound Errors (4000-4099)
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Claim larger than the system total
    #[error("Claim of {claimed} {kind} exceeds existing {existing}")]
    ClaimExceedsExisting {
        /// Offending resource type
        kind: ResourceKind,
        /// Claimed units
        claimed: Units,
        /// Existing units
        existing: Units,
    },

    /// Claim smaller than what the worker already holds
    #[error("Claim of {claimed} {kind} is below current allocation {allocated}")]
    ClaimBelowAllocation {
        /// Offending resource type
        kind: ResourceKind,
        /// Claimed units
        claimed: Units,
        /// Currently allocated units
        allocated: Units,
    },

    /// Request larger than the system total
    #[error("Request of {requested} {kind} exceeds existing {existing}")]
    RequestExceedsExisting {
        /// Offending resource type
        kind: ResourceKind,
        /// Requested units
        requested: Units,
        /// Existing units
        existing: Units,
    },

    /// Request larger than the remaining declared need
    #[error("Request of {requested} {kind} exceeds remaining need {need}")]
    RequestExceedsNeed {
        /// Offending resource type
        kind: ResourceKind,
        /// Requested units
        requested: Units,
        /// Remaining need
        need: Units,
    },

    /// Release of units the worker does not hold
    #[error("Release of {released} {kind} exceeds allocation {allocated}")]
    ReleaseExceedsAllocation {
        /// Offending resource type
        kind: ResourceKind,
        /// Released units
        released: Units,
        /// Currently allocated units
        allocated: Units,
    },

    /// Vector length differs from the configured resource type count
    #[error("Vector has {actual} entries, expected {expected}")]
    DimensionMismatch {
        /// Configured resource type count
        expected: usize,
        /// Length of the supplied vector
        actual: usize,
    },
}

impl AllocError {
    /// Stable numeric code
    pub fn code(&self) -> u32 {
        match self {
            Self::InvalidConfiguration(_) => 1001,

            Self::InvalidSlot { .. } => 2001,
            Self::SlotOccupied(_) => 2002,
            Self::UnknownCaller => 2003,

            Self::PolicyMismatch => 3001,

            Self::ClaimExceedsExisting { .. } => 4001,
            Self::ClaimBelowAllocation { .. } => 4002,
            Self::RequestExceedsExisting { .. } => 4003,
            Self::RequestExceedsNeed { .. } => 4004,
            Self::ReleaseExceedsAllocation { .. } => 4005,
            Self::DimensionMismatch { .. } => 4006,
        }
    }

    /// Error category label
    pub fn category(&self) -> &'static str {
        match self.code() / 1000 {
            1 => "CONFIGURATION",
            2 => "IDENTITY",
            3 => "POLICY",
            _ => "VALUE_BOUND",
        }
    }

    /// Only configuration errors are fatal: the caller must not proceed
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidConfiguration(_))
    }

    /// Everything else is a call-site bug; retrying unchanged will fail again
    pub fn is_caller_bug(&self) -> bool {
        !self.is_fatal()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AllocError::InvalidConfiguration("x".into()).code(), 1001);
        assert_eq!(AllocError::UnknownCaller.code(), 2003);
        assert_eq!(AllocError::PolicyMismatch.code(), 3001);
        assert_eq!(
            AllocError::ReleaseExceedsAllocation {
                kind: ResourceKind(0),
                released: 2,
                allocated: 1
            }
            .code(),
            4005
        );
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(AllocError::InvalidConfiguration("x".into()).category(), "CONFIGURATION");
        assert_eq!(AllocError::SlotOccupied(WorkerSlot(1)).category(), "IDENTITY");
        assert_eq!(AllocError::PolicyMismatch.category(), "POLICY");
        assert_eq!(
            AllocError::DimensionMismatch { expected: 3, actual: 2 }.category(),
            "VALUE_BOUND"
        );
    }

    #[test]
    fn test_fatality() {
        assert!(AllocError::InvalidConfiguration("x".into()).is_fatal());
        assert!(!AllocError::UnknownCaller.is_fatal());
        assert!(AllocError::PolicyMismatch.is_caller_bug());
    }

    #[test]
    fn test_error_display() {
        let err = AllocError::RequestExceedsNeed {
            kind: ResourceKind(2),
            requested: 5,
            need: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("R2"));
        assert!(msg.contains('5'));
        assert!(msg.contains('3'));
    }
}
