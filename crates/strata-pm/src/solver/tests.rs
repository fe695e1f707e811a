//! End-to-end solver tests: whole requests against small package universes.

use strata_semver::Constraint;

use crate::error::SolverError;
use crate::package::Package;
use crate::repository::{Repository, RepositoryId};

use super::policy::DefaultPolicy;
use super::pool::Pool;
use super::problem::ProblemCause;
use super::request::Request;
use super::rule::RuleReason;
use super::solver::Solver;
use super::transaction::{Operation, Transaction};

fn c(input: &str) -> Constraint {
    Constraint::parse(input).unwrap()
}

/// Build a pool from an installed and a remote repository.
fn setup(installed: Vec<Package>, remote: Vec<Package>) -> (Pool, RepositoryId) {
    let mut installed_repo = Repository::new("installed");
    for package in installed {
        installed_repo.add_package(package);
    }
    let mut remote_repo = Repository::new("remote");
    for package in remote {
        remote_repo.add_package(package);
    }

    let mut pool = Pool::new();
    let installed_id = pool.add_repository(installed_repo);
    pool.add_repository(remote_repo);
    (pool, installed_id)
}

fn ops(transaction: &Transaction) -> Vec<String> {
    transaction
        .operations
        .iter()
        .map(|op| match op {
            Operation::Install(p) => format!("install {}", p.pretty_string()),
            Operation::Remove(p) => format!("remove {}", p.pretty_string()),
        })
        .collect()
}

#[test]
fn test_install_single_package() {
    let (pool, installed) = setup(vec![], vec![Package::new("foo", "1")]);

    let mut request = Request::new();
    request.install("foo", pool.what_provides("foo", None));

    let policy = DefaultPolicy::new();
    let transaction = Solver::new(&pool, &policy, installed)
        .solve(&request)
        .unwrap();

    assert_eq!(ops(&transaction), vec!["install foo-1"]);
}

#[test]
fn test_install_orders_dependencies_first() {
    let (pool, installed) = setup(
        vec![],
        vec![
            Package::new("a", "1").require("b", c("*")),
            Package::new("b", "1"),
        ],
    );

    let mut request = Request::new();
    request.install("a", pool.what_provides("a", None));

    let policy = DefaultPolicy::new();
    let transaction = Solver::new(&pool, &policy, installed)
        .solve(&request)
        .unwrap();

    assert_eq!(ops(&transaction), vec!["install b-1", "install a-1"]);
}

#[test]
fn test_conflicting_installs_are_unsolvable() {
    let (pool, installed) = setup(
        vec![],
        vec![
            Package::new("a", "1").conflict("b", c("*")),
            Package::new("b", "1"),
        ],
    );

    let mut request = Request::new();
    request.install("a", pool.what_provides("a", None));
    request.install("b", pool.what_provides("b", None));

    let policy = DefaultPolicy::new();
    let result = Solver::new(&pool, &policy, installed).solve(&request);

    let Err(SolverError::Unsolvable(problems)) = result else {
        panic!("expected an unsolvable request");
    };
    assert_eq!(problems.len(), 1);

    let causes = &problems.problems[0].causes;
    let jobs = causes
        .iter()
        .filter(|cause| matches!(cause, ProblemCause::Job { .. }))
        .count();
    let conflict_rules = causes
        .iter()
        .filter(|cause| {
            matches!(
                cause,
                ProblemCause::Rule {
                    reason: RuleReason::PackageConflict,
                    ..
                }
            )
        })
        .count();
    assert_eq!(jobs, 2, "both install jobs belong to the problem");
    assert_eq!(conflict_rules, 1, "the conflict rule belongs to the problem");
}

#[test]
fn test_update_to_newer_version() {
    let (pool, installed) = setup(
        vec![Package::new("foo", "1")],
        vec![Package::new("foo", "1"), Package::new("foo", "2")],
    );

    let mut request = Request::new();
    request.update("foo", pool.what_provides("foo", None));

    let policy = DefaultPolicy::new();
    let transaction = Solver::new(&pool, &policy, installed)
        .solve(&request)
        .unwrap();

    assert_eq!(ops(&transaction), vec!["remove foo-1", "install foo-2"]);
}

#[test]
fn test_remove_installed_package() {
    let (pool, installed) = setup(vec![Package::new("foo", "1")], vec![Package::new("foo", "1")]);

    let mut request = Request::new();
    request.remove("foo", pool.what_provides("foo", None));

    let policy = DefaultPolicy::new();
    let transaction = Solver::new(&pool, &policy, installed)
        .solve(&request)
        .unwrap();

    assert_eq!(ops(&transaction), vec!["remove foo-1"]);
}

#[test]
fn test_empty_request_is_an_empty_transaction() {
    let (pool, installed) = setup(vec![], vec![]);

    let policy = DefaultPolicy::new();
    let transaction = Solver::new(&pool, &policy, installed)
        .solve(&Request::new())
        .unwrap();

    assert!(transaction.is_empty());
}

#[test]
fn test_install_without_candidates_reports_the_job() {
    let (pool, installed) = setup(vec![], vec![]);

    let mut request = Request::new();
    request.install("ghost", vec![]);

    let policy = DefaultPolicy::new();
    let result = Solver::new(&pool, &policy, installed).solve(&request);

    let Err(SolverError::Unsolvable(problems)) = result else {
        panic!("expected an unsolvable request");
    };
    assert_eq!(problems.len(), 1);
    assert!(matches!(
        &problems.problems[0].causes[0],
        ProblemCause::Job { job, .. } if job.package_name.as_deref() == Some("ghost")
    ));
}

#[test]
fn test_self_require_produces_no_rule() {
    // a package satisfying its own requirement is a tautology, not a cycle
    let (pool, installed) = setup(
        vec![],
        vec![Package::new("a", "1").require("a", c("*"))],
    );

    let mut request = Request::new();
    request.install("a", pool.what_provides("a", None));

    let policy = DefaultPolicy::new();
    let transaction = Solver::new(&pool, &policy, installed)
        .solve(&request)
        .unwrap();

    assert_eq!(ops(&transaction), vec!["install a-1"]);
}

#[test]
fn test_installing_an_installed_package_changes_nothing() {
    let (pool, installed) = setup(vec![Package::new("foo", "1")], vec![Package::new("foo", "1")]);

    let mut request = Request::new();
    request.install("foo", pool.what_provides("foo", None));

    let policy = DefaultPolicy::new();
    let transaction = Solver::new(&pool, &policy, installed)
        .solve(&request)
        .unwrap();

    assert!(transaction.is_empty());
}

#[test]
fn test_solving_is_deterministic() {
    let build = || {
        setup(
            vec![Package::new("keep", "1")],
            vec![
                Package::new("a", "1").require("b", c("*")),
                Package::new("b", "1"),
                Package::new("b", "2"),
                Package::new("keep", "1"),
            ],
        )
    };

    let mut results = Vec::new();
    for _ in 0..2 {
        let (pool, installed) = build();
        let mut request = Request::new();
        request.install("a", pool.what_provides("a", None));

        let policy = DefaultPolicy::new();
        let transaction = Solver::new(&pool, &policy, installed)
            .solve(&request)
            .unwrap();
        results.push(ops(&transaction));
    }

    assert_eq!(results[0], results[1]);
}

#[test]
fn test_install_via_provider() {
    let (pool, installed) = setup(
        vec![],
        vec![Package::new("lib-a", "1").provide("virt", c("*"))],
    );

    let mut request = Request::new();
    request.install("virt", pool.what_provides("virt", None));

    let policy = DefaultPolicy::new();
    let transaction = Solver::new(&pool, &policy, installed)
        .solve(&request)
        .unwrap();

    assert_eq!(ops(&transaction), vec!["install lib-a-1"]);
}

#[test]
fn test_replacer_conflicts_with_replaced_package() {
    let (pool, installed) = setup(
        vec![],
        vec![
            Package::new("new-pkg", "1").replace("old-pkg", c("*")),
            Package::new("old-pkg", "1"),
        ],
    );

    let mut request = Request::new();
    request.install("new-pkg", pool.what_provides("new-pkg", None));
    request.install("old-pkg", vec![pool.what_provides("old-pkg", None)[1]]);

    let policy = DefaultPolicy::new();
    let result = Solver::new(&pool, &policy, installed).solve(&request);

    assert!(matches!(result, Err(SolverError::Unsolvable(_))));
}

#[test]
fn test_broken_installed_dependency_is_tolerated() {
    // the installed package requires something nothing provides; without a
    // fix job the solver must not enforce the broken link
    let (pool, installed) = setup(
        vec![Package::new("a", "1").require("missing", c("*"))],
        vec![],
    );

    let policy = DefaultPolicy::new();
    let transaction = Solver::new(&pool, &policy, installed)
        .solve(&Request::new())
        .unwrap();

    assert!(transaction.is_empty());
}

#[test]
fn test_fix_enforces_broken_dependency() {
    let (pool, installed) = setup(
        vec![Package::new("a", "1").require("missing", c("*"))],
        vec![],
    );

    // without permission to uninstall, fixing the broken package fails
    let mut request = Request::new();
    request.fix("a", pool.what_provides("a", None));

    let strict = DefaultPolicy::new();
    let result = Solver::new(&pool, &strict, installed).solve(&request);
    assert!(matches!(result, Err(SolverError::Unsolvable(_))));

    // allowing uninstalls drops the broken package instead
    let lenient = DefaultPolicy::new().with_allow_uninstall(true);
    let transaction = Solver::new(&pool, &lenient, installed)
        .solve(&request)
        .unwrap();
    assert_eq!(ops(&transaction), vec!["remove a-1"]);
}

#[test]
fn test_conflicting_install_may_uninstall_when_allowed() {
    let build_request = |pool: &Pool| {
        let mut request = Request::new();
        request.install("b", pool.what_provides("b", None));
        request
    };

    let (pool, installed) = setup(
        vec![Package::new("a", "1")],
        vec![Package::new("b", "1").conflict("a", c("*"))],
    );

    let strict = DefaultPolicy::new();
    let result = Solver::new(&pool, &strict, installed).solve(&build_request(&pool));
    assert!(matches!(result, Err(SolverError::Unsolvable(_))));

    let lenient = DefaultPolicy::new().with_allow_uninstall(true);
    let transaction = Solver::new(&pool, &lenient, installed)
        .solve(&build_request(&pool))
        .unwrap();
    assert_eq!(ops(&transaction), vec!["remove a-1", "install b-1"]);
}

#[test]
fn test_solver_learns_from_conflict_and_recovers() {
    // the preferred candidate m-2 drags in n-1 which conflicts with the
    // other job; the solver must learn the conflict and fall back to m-1
    let (pool, installed) = setup(
        vec![],
        vec![
            Package::new("m", "1"),
            Package::new("m", "2").require("n", c("*")),
            Package::new("n", "1").conflict("o", c("*")),
            Package::new("o", "1"),
        ],
    );

    let mut request = Request::new();
    request.install("o", pool.what_provides("o", None));
    request.install("m", pool.what_provides("m", None));

    let policy = DefaultPolicy::new();
    let transaction = Solver::new(&pool, &policy, installed)
        .solve(&request)
        .unwrap();

    let mut installs: Vec<String> = transaction
        .installs()
        .map(|p| p.pretty_string())
        .collect();
    installs.sort();
    assert_eq!(installs, vec!["m-1", "o-1"]);
}

#[test]
fn test_watch_replacement_across_long_clauses() {
    // x pulls in c, c rules out the preferred dep provider a, so the
    // requirement clause has to re-watch and settle on b
    let (pool, installed) = setup(
        vec![],
        vec![
            Package::new("x", "1")
                .require("dep", c("*"))
                .require("cc", c("*")),
            Package::new("a", "2").provide("dep", c("*")),
            Package::new("b", "1").provide("dep", c("*")),
            Package::new("cc", "1").conflict("a", c("*")),
        ],
    );

    let mut request = Request::new();
    request.install("x", pool.what_provides("x", None));

    let policy = DefaultPolicy::new();
    let transaction = Solver::new(&pool, &policy, installed)
        .solve(&request)
        .unwrap();

    let mut installs: Vec<String> = transaction
        .installs()
        .map(|p| p.pretty_string())
        .collect();
    installs.sort();
    assert_eq!(installs, vec!["b-1", "cc-1", "x-1"]);
}

#[test]
fn test_update_all() {
    let (pool, installed) = setup(
        vec![Package::new("a", "1"), Package::new("b", "1")],
        vec![Package::new("a", "2"), Package::new("b", "2")],
    );

    let mut request = Request::new();
    request.update_all();

    let policy = DefaultPolicy::new();
    let transaction = Solver::new(&pool, &policy, installed)
        .solve(&request)
        .unwrap();

    let mut installs: Vec<String> = transaction.installs().map(|p| p.pretty_string()).collect();
    let mut removals: Vec<String> = transaction.removals().map(|p| p.pretty_string()).collect();
    installs.sort();
    removals.sort();
    assert_eq!(installs, vec!["a-2", "b-2"]);
    assert_eq!(removals, vec!["a-1", "b-1"]);
}

#[test]
fn test_lock_pins_package_during_update() {
    let (pool, installed) = setup(
        vec![Package::new("foo", "1")],
        vec![Package::new("foo", "2")],
    );

    let mut request = Request::new();
    request.update_all();
    request.lock("foo", pool.what_provides("foo", None));

    let policy = DefaultPolicy::new();
    let transaction = Solver::new(&pool, &policy, installed)
        .solve(&request)
        .unwrap();

    assert!(transaction.is_empty(), "locked package must stay at foo-1");
}

#[test]
fn test_spontaneous_updates_do_not_happen() {
    // a newer version exists but nothing asked for it
    let (pool, installed) = setup(
        vec![Package::new("foo", "1")],
        vec![Package::new("foo", "2"), Package::new("bar", "1")],
    );

    let mut request = Request::new();
    request.install("bar", pool.what_provides("bar", None));

    let policy = DefaultPolicy::new();
    let transaction = Solver::new(&pool, &policy, installed)
        .solve(&request)
        .unwrap();

    assert_eq!(ops(&transaction), vec!["install bar-1"]);
}

#[test]
fn test_problems_render_against_the_pool() {
    let (pool, installed) = setup(
        vec![],
        vec![
            Package::new("a", "1").conflict("b", c("*")),
            Package::new("b", "1"),
        ],
    );

    let mut request = Request::new();
    request.install("a", pool.what_provides("a", None));
    request.install("b", pool.what_provides("b", None));

    let policy = DefaultPolicy::new();
    let Err(SolverError::Unsolvable(problems)) =
        Solver::new(&pool, &policy, installed).solve(&request)
    else {
        panic!("expected an unsolvable request");
    };

    let text = problems.describe(&pool);
    assert!(text.contains("install request for a"));
    assert!(text.contains("install request for b"));
    assert!(text.contains("conflicts with"));
}
