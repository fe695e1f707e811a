//! Version parsing and constraint matching for Strata packages.
//!
//! This crate provides the version model and the constraint predicates the
//! resolver uses to decide whether a candidate package satisfies a
//! requirement. Constraints are simple predicates over [`Version`] values;
//! compound constraints are conjunctions of their children.

pub mod constraint;
mod version;

pub use constraint::{Constraint, ConstraintError, Operator};
pub use version::Version;
