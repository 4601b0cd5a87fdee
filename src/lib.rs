//! Workspace root crate.
//!
//! This crate re-exports the main building blocks so integration tests can depend on a single crate.

pub use alarms::*;
pub use reactivity::*;
pub use sim::*;
