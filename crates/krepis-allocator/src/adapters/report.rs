//! StateReport - Human-readable State Dump
//!
//! ```text
//! #########################################
//! Initial State
//! #########################################
//! Exist:
//!       R0   R1   R2
//!       8    6    7
//!
//! Allocation:
//!       R0   R1   R2
//! T0:   0    0    0
//! ...
//! ```
//!
//! Render a [`ResourceState`] snapshot, so the tables are mutually
//! consistent without holding the manager lock while formatting.

use std::fmt;

use crate::domain::{ResourceState, Units, WorkerSlot};

const BANNER: &str = "#########################################";

/// Banner plus Exist / Available / Allocation / Request / MaxDemand / Need
pub struct StateReport<'a> {
    header: &'a str,
    state: &'a ResourceState,
}

impl<'a> StateReport<'a> {
    /// Pair a banner header with a snapshot
    pub fn new(header: &'a str, state: &'a ResourceState) -> Self {
        Self { header, state }
    }

    fn column_labels(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "      ")?;
        for j in 0..self.state.resource_count() {
            write!(f, "R{:<4}", j)?;
        }
        writeln!(f)
    }

    fn vector(&self, f: &mut fmt::Formatter<'_>, title: &str, values: &[Units]) -> fmt::Result {
        writeln!(f, "{}:", title)?;
        self.column_labels(f)?;
        for (j, v) in values.iter().enumerate() {
            let width = if j == 0 { 7 } else { 5 };
            write!(f, "{:>width$}", v, width = width)?;
        }
        writeln!(f)?;
        writeln!(f)
    }

    fn matrix(
        &self,
        f: &mut fmt::Formatter<'_>,
        title: &str,
        row: impl Fn(WorkerSlot) -> &'a [Units],
    ) -> fmt::Result {
        writeln!(f, "{}:", title)?;
        self.column_labels(f)?;
        for slot in self.state.workers() {
            write!(f, "{:<5}", format!("{}:", slot))?;
            for (j, v) in row(slot).iter().enumerate() {
                let width = if j == 0 { 2 } else { 5 };
                write!(f, "{:>width$}", v, width = width)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for StateReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state;
        writeln!(f, "{}", BANNER)?;
        writeln!(f, "{}", self.header)?;
        writeln!(f, "{}", BANNER)?;

        self.vector(f, "Exist", state.existing())?;
        self.vector(f, "Available", state.available())?;

        self.matrix(f, "Allocation", |s| state.allocation(s))?;
        writeln!(f)?;
        self.matrix(f, "Request", |s| state.request(s))?;
        writeln!(f)?;
        self.matrix(f, "MaxDemand", |s| state.max_claim(s))?;
        writeln!(f)?;
        self.matrix(f, "Need", |s| state.need(s))?;
        writeln!(f, "{}", BANNER)
    }
}
