use std::fmt;

use super::pool::Pool;
use super::request::{Job, JobCommand};
use super::rule::{literal_package, Literal, RuleReason, RuleType};

/// One cause contributing to a problem: either a user job or a rule.
///
/// Rule causes are self-contained snapshots so problems stay meaningful
/// after the solver that produced them is gone.
#[derive(Debug, Clone)]
pub enum ProblemCause {
    /// A job from the request
    Job {
        /// Index of the job in the request
        index: usize,
        job: Job,
    },
    /// A solver rule
    Rule {
        rule_type: RuleType,
        reason: RuleReason,
        reason_data: Option<String>,
        literals: Vec<Literal>,
    },
}

/// A minimal set of jobs and rules whose simultaneous enablement made the
/// request unsatisfiable.
#[derive(Debug, Clone, Default)]
pub struct Problem {
    pub causes: Vec<ProblemCause>,
}

impl Problem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, cause: ProblemCause) {
        self.causes.push(cause);
    }

    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }

    /// Render the problem against a pool for package names
    pub fn describe(&self, pool: &Pool) -> String {
        let mut lines = Vec::new();
        for cause in &self.causes {
            lines.push(format!("  - {}", describe_cause(pool, cause)));
        }
        lines.join("\n")
    }
}

fn describe_cause(pool: &Pool, cause: &ProblemCause) -> String {
    match cause {
        ProblemCause::Job { job, .. } => {
            let name = job.package_name.as_deref().unwrap_or("*");
            match job.command {
                JobCommand::Install => format!("install request for {}", name),
                JobCommand::Remove => format!("removal request for {}", name),
                JobCommand::Update => format!("update request for {}", name),
                JobCommand::UpdateAll => "update request for all packages".to_string(),
                JobCommand::Fix => format!("fix request for {}", name),
                JobCommand::FixAll => "fix request for all packages".to_string(),
                JobCommand::Lock => format!("lock request for {}", name),
            }
        }
        ProblemCause::Rule {
            reason,
            reason_data,
            literals,
            ..
        } => {
            let packages: Vec<String> = literals
                .iter()
                .map(|&l| {
                    pool.package(literal_package(l))
                        .map(|p| p.pretty_string())
                        .unwrap_or_else(|| format!("#{}", literal_package(l)))
                })
                .collect();
            let subject = packages.first().cloned().unwrap_or_else(|| "?".to_string());
            let data = reason_data.as_deref().unwrap_or("?");
            match reason {
                RuleReason::NotInstallable => format!("{} cannot be installed", subject),
                RuleReason::NothingProvides => {
                    format!("{} requires {} but no package provides it", subject, data)
                }
                RuleReason::PackageRequires => format!("{} requires {}", subject, data),
                RuleReason::PackageConflict => {
                    format!("{} conflicts with {}", subject, packages.get(1).unwrap_or(&"?".to_string()))
                }
                RuleReason::PackageObsoletes | RuleReason::InstalledPackageObsoletes => {
                    format!("{} replaces {}", subject, data)
                }
                RuleReason::PackageSameName => {
                    format!("only one version of {} can be installed", data)
                }
                RuleReason::JobInstall => format!("install request for {}", data),
                RuleReason::JobRemove => format!("removal request for {}", data),
                RuleReason::JobLock => format!("lock request for {}", data),
                RuleReason::InternalAllowUpdate => format!("update rule for {}", data),
                RuleReason::Learned => "learned constraint from conflict analysis".to_string(),
            }
        }
    }
}

/// All problems a failed solve accumulated, across reset cycles.
#[derive(Debug, Clone, Default)]
pub struct SolverProblems {
    pub problems: Vec<Problem>,
}

impl SolverProblems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, problem: Problem) {
        self.problems.push(problem);
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    /// Render every problem against a pool
    pub fn describe(&self, pool: &Pool) -> String {
        self.problems
            .iter()
            .enumerate()
            .map(|(i, p)| format!("Problem {}:\n{}", i + 1, p.describe(pool)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for SolverProblems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} problem(s) prevent a solution", self.problems.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Package;
    use crate::repository::Repository;

    #[test]
    fn test_problem_describe_job() {
        let pool = Pool::new();
        let mut problem = Problem::new();
        problem.add(ProblemCause::Job {
            index: 0,
            job: Job::new(JobCommand::Install, Some("foo".to_string()), vec![]),
        });

        let text = problem.describe(&pool);
        assert!(text.contains("install request for foo"));
    }

    #[test]
    fn test_problem_describe_rule() {
        let mut repo = Repository::new("test");
        repo.add_package(Package::new("a", "1.0"));
        repo.add_package(Package::new("b", "1.0"));
        let mut pool = Pool::new();
        pool.add_repository(repo);

        let mut problem = Problem::new();
        problem.add(ProblemCause::Rule {
            rule_type: RuleType::Package,
            reason: RuleReason::PackageConflict,
            reason_data: Some("b".to_string()),
            literals: vec![-1, -2],
        });

        let text = problem.describe(&pool);
        assert!(text.contains("a-1.0 conflicts with b-1.0"));
    }

    #[test]
    fn test_solver_problems_accumulate() {
        let mut problems = SolverProblems::new();
        assert!(problems.is_empty());

        problems.add(Problem::new());
        problems.add(Problem::new());
        assert_eq!(problems.len(), 2);
    }
}
