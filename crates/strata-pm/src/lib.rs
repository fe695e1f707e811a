//! Dependency resolver core for the Strata package manager.
//!
//! Given the currently installed packages, candidate packages from remote
//! repositories, and a request of user jobs (install, remove, update, lock,
//! fix), the solver computes a transaction: an ordered list of installs and
//! removals that satisfies every hard constraint, or a set of problems
//! explaining why no such transaction exists.

pub mod error;
pub mod package;
pub mod repository;
pub mod solver;

pub use error::{Result, SolverError};
pub use package::{Link, LinkType, Package};
pub use repository::{Repository, RepositoryId};
pub use solver::{
    DefaultPolicy, Operation, Policy, Pool, Request, Solver, Transaction,
};
