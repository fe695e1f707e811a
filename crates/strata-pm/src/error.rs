use thiserror::Error;

use crate::solver::SolverProblems;

#[derive(Error, Debug)]
pub enum SolverError {
    /// The request has no solution. The attached problems name the jobs and
    /// rules whose simultaneous enablement made the request unsatisfiable.
    /// This is the normal failure mode, not a bug.
    #[error("dependency resolution failed: {0}")]
    Unsolvable(SolverProblems),

    /// An internal invariant was breached. Always a solver bug.
    #[error("internal solver error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SolverError>;
