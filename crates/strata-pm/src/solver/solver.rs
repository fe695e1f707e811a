use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::{Result, SolverError};
use crate::repository::RepositoryId;

use super::decisions::Decisions;
use super::policy::Policy;
use super::pool::{PackageId, Pool};
use super::problem::{Problem, ProblemCause, SolverProblems};
use super::request::{JobCommand, Request};
use super::rule::{literal_package, Literal, Rule, RuleId, RuleReason, RuleType};
use super::rule_set::RuleSet;
use super::transaction::Transaction;
use super::watches::Watches;

/// Why a decision or problem exists: a rule, or the user job behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Why {
    Rule(RuleId),
    Job(usize),
}

/// A saved alternative decision for later minimization
#[derive(Debug)]
struct Branch {
    /// Remaining alternative literals, in preference order
    literals: Vec<Literal>,
    /// Level the branching decision was made at
    level: i32,
    /// Rule that caused the branch
    rule: RuleId,
}

/// The CDCL dependency solver.
///
/// Translates packages and user jobs into rules, runs a watch-driven SAT
/// search over them, and extracts the resulting transaction. A solver is
/// single-use: construct one per [`Solver::solve`] call.
pub struct Solver<'a> {
    pool: &'a Pool,
    policy: &'a dyn Policy,

    rules: RuleSet,
    watches: Watches,
    decisions: Decisions,
    /// Cursor into the decision queue; decisions before it are propagated
    propagate_index: usize,

    /// Packages of the installed repository, in repository order
    installed: Vec<PackageId>,
    installed_map: HashSet<PackageId>,
    /// Installed packages the request wants updated
    update_map: HashSet<PackageId>,
    /// Installed packages whose broken dependencies must be re-enforced
    fix_map: HashSet<PackageId>,

    /// Packages already covered by rule generation
    added_packages: HashSet<PackageId>,

    /// Job rule id -> index of the job in the request
    rule_to_job: IndexMap<RuleId, usize>,
    package_update_rule: HashMap<PackageId, RuleId>,
    package_feature_rule: HashMap<PackageId, RuleId>,

    branches: Vec<Branch>,
    /// Ancestor rules per learned rule
    learned_pool: Vec<Vec<RuleId>>,
    /// Learned rule id -> index into `learned_pool`
    learned_why: HashMap<RuleId, usize>,

    /// Problem groups accumulated across reset cycles
    problems: Vec<Vec<Why>>,
}

impl<'a> Solver<'a> {
    /// Create a solver over a pool. `installed` names the repository whose
    /// packages count as currently installed.
    pub fn new(pool: &'a Pool, policy: &'a dyn Policy, installed: RepositoryId) -> Self {
        let installed_packages = pool.repository_packages(installed);
        let installed_map = installed_packages.iter().copied().collect();

        Self {
            pool,
            policy,
            rules: RuleSet::new(),
            watches: Watches::new(),
            decisions: Decisions::new(),
            propagate_index: 0,
            installed: installed_packages,
            installed_map,
            update_map: HashSet::new(),
            fix_map: HashSet::new(),
            added_packages: HashSet::new(),
            rule_to_job: IndexMap::new(),
            package_update_rule: HashMap::new(),
            package_feature_rule: HashMap::new(),
            branches: Vec::new(),
            learned_pool: Vec::new(),
            learned_why: HashMap::new(),
            problems: Vec::new(),
        }
    }

    /// Resolve a request into a transaction.
    ///
    /// On failure returns [`SolverError::Unsolvable`] carrying every
    /// problem accumulated while disabling rule sets and retrying.
    pub fn solve(&mut self, request: &Request) -> Result<Transaction> {
        self.setup_job_maps(request);

        // rules for the installed packages and everything they can update to
        for package in self.installed.clone() {
            self.add_rules_for_update_packages(package, true);
        }

        // rules for install job candidates
        for job in &request.jobs {
            if job.command == JobCommand::Install {
                for &package in &job.packages {
                    self.add_rules_for_package(package);
                }
            }
        }

        self.add_update_and_feature_rules();
        self.add_job_rules(request);

        debug!(
            rules = self.rules.len(),
            installed = self.installed.len(),
            "generated rules"
        );

        // a removal implies the package no longer has to be kept
        for job in &request.jobs {
            if job.command == JobCommand::Remove {
                for &package in &job.packages {
                    if self.installed_map.contains(&package) {
                        self.disable_update_rule(package);
                    }
                }
            }
        }

        for id in 0..self.rules.len() as RuleId {
            if self.rules[id].literals().len() >= 2 {
                self.watches.watch_rule(&mut self.rules, id);
            }
        }

        self.make_assertion_rule_decisions()?;
        self.run_sat(true)?;

        if !self.problems.is_empty() {
            return Err(SolverError::Unsolvable(self.export_problems(request)));
        }

        Ok(self.extract_transaction())
    }

    fn setup_job_maps(&mut self, request: &Request) {
        for job in &request.jobs {
            match job.command {
                JobCommand::Update => {
                    for &package in &job.packages {
                        if self.installed_map.contains(&package) {
                            self.update_map.insert(package);
                        }
                    }
                }
                JobCommand::UpdateAll => {
                    self.update_map.extend(self.installed.iter().copied());
                }
                JobCommand::Fix => {
                    for &package in &job.packages {
                        if self.installed_map.contains(&package) {
                            self.fix_map.insert(package);
                        }
                    }
                }
                JobCommand::FixAll => {
                    self.fix_map.extend(self.installed.iter().copied());
                }
                _ => {}
            }
        }
    }

    // ---- rule construction -------------------------------------------------

    /// `(-P | Q1 | ... | Qn)`: if P is installed, one of its providers must
    /// be. Returns `None` when P provides for itself (tautology). With no
    /// providers the clause reduces to `(-P)`.
    fn create_require_rule(
        &self,
        package: PackageId,
        providers: &[PackageId],
        reason: RuleReason,
        reason_data: &str,
    ) -> Option<Rule> {
        let mut literals = vec![-package];
        for &provider in providers {
            if provider == package {
                return None;
            }
            literals.push(provider);
        }
        Some(Rule::new(literals, RuleType::Package, reason).with_reason_data(reason_data))
    }

    /// `(P | U1 | ... | Um)`: keep P installed or move to one of its
    /// update candidates.
    fn create_update_rule(
        &self,
        package: PackageId,
        updates: &[PackageId],
        rule_type: RuleType,
        reason_data: &str,
    ) -> Rule {
        let mut literals = vec![package];
        literals.extend_from_slice(updates);
        Rule::new(literals, rule_type, RuleReason::InternalAllowUpdate).with_reason_data(reason_data)
    }

    /// `(P1 | ... | Pn)`: one of the candidates must be installed. An empty
    /// candidate set produces the impossible (empty) rule.
    fn create_install_one_of_rule(
        &self,
        packages: &[PackageId],
        reason_data: &str,
    ) -> Rule {
        let literals: Vec<Literal> = packages.to_vec();
        Rule::new(literals, RuleType::Job, RuleReason::JobInstall).with_reason_data(reason_data)
    }

    /// `(-A | -B)`: A and B cannot both be installed. Returns `None` when
    /// A and B are the same package.
    fn create_conflict_rule(
        &self,
        a: PackageId,
        b: PackageId,
        reason: RuleReason,
        reason_data: &str,
    ) -> Option<Rule> {
        if a == b {
            return None;
        }
        Some(Rule::new(vec![-a, -b], RuleType::Package, reason).with_reason_data(reason_data))
    }

    fn add_rule(&mut self, rule: Option<Rule>) -> Option<RuleId> {
        rule.and_then(|r| self.rules.add(r))
    }

    // ---- rule generation ---------------------------------------------------

    /// Generate package rules for `package` and, transitively, for every
    /// provider reachable through its links.
    fn add_rules_for_package(&mut self, package: PackageId) {
        let pool = self.pool;
        let mut work: VecDeque<PackageId> = VecDeque::new();
        work.push_back(package);

        while let Some(current) = work.pop_front() {
            if !self.added_packages.insert(current) {
                continue;
            }
            let Some(pkg) = pool.package(current) else {
                continue;
            };
            let pkg = Arc::clone(pkg);

            let is_installed = self.installed_map.contains(&current);
            // installed packages keep their (possibly broken) state unless
            // the request asked to fix them
            let dont_fix = is_installed && !self.fix_map.contains(&current);

            if !dont_fix && !self.policy.installable(pool, current) {
                let rule = Rule::new(
                    vec![-current],
                    RuleType::Package,
                    RuleReason::NotInstallable,
                )
                .with_reason_data(pkg.pretty_string());
                self.add_rule(Some(rule));
                continue;
            }

            for link in &pkg.requires {
                let providers = pool.what_provides(&link.target, Some(&link.constraint));

                // an installed package with an already-broken requirement
                // keeps it broken; don't enforce what wasn't satisfied
                if dont_fix && !providers.iter().any(|q| self.installed_map.contains(q)) {
                    continue;
                }

                let reason = if providers.is_empty() {
                    RuleReason::NothingProvides
                } else {
                    RuleReason::PackageRequires
                };
                let rule = self.create_require_rule(current, &providers, reason, &link.target);
                self.add_rule(rule);

                for &provider in &providers {
                    work.push_back(provider);
                }
            }

            for link in &pkg.conflicts {
                let candidates = pool.what_provides(&link.target, Some(&link.constraint));
                for candidate in candidates {
                    if dont_fix && self.installed_map.contains(&candidate) {
                        continue;
                    }
                    let rule = self.create_conflict_rule(
                        current,
                        candidate,
                        RuleReason::PackageConflict,
                        &link.target,
                    );
                    self.add_rule(rule);
                }
            }

            // a package obsoletes whatever it replaces
            for link in &pkg.replaces {
                let candidates = pool.what_provides(&link.target, Some(&link.constraint));
                for candidate in candidates {
                    if dont_fix && self.installed_map.contains(&candidate) {
                        continue;
                    }
                    let reason = if is_installed {
                        RuleReason::InstalledPackageObsoletes
                    } else {
                        RuleReason::PackageObsoletes
                    };
                    let rule = self.create_conflict_rule(current, candidate, reason, &link.target);
                    self.add_rule(rule);
                }
            }

            // at most one package under the same name
            for other in pool.what_provides(&pkg.name, None) {
                if is_installed && self.installed_map.contains(&other) {
                    continue;
                }
                let rule = self.create_conflict_rule(
                    current,
                    other,
                    RuleReason::PackageSameName,
                    &pkg.name,
                );
                self.add_rule(rule);
            }

            // recommendations and suggestions create no rules but their
            // providers still join the traversal
            for link in pkg.recommends.iter().chain(pkg.suggests.iter()) {
                for provider in pool.what_provides(&link.target, Some(&link.constraint)) {
                    work.push_back(provider);
                }
            }
        }
    }

    /// Generate rules for a package and for all its update candidates.
    fn add_rules_for_update_packages(&mut self, package: PackageId, allow_all: bool) {
        self.add_rules_for_package(package);

        let updates =
            self.policy
                .find_update_packages(self.pool, &self.installed_map, package, allow_all);
        for update in updates {
            self.add_rules_for_package(update);
        }
    }

    /// Per installed package: an update rule (no downgrades) and a feature
    /// rule (downgrades allowed). Which of the two are registered, and
    /// whether they are weak, depends on the policy's `allow_uninstall`.
    fn add_update_and_feature_rules(&mut self) {
        let allow_uninstall = self.policy.allow_uninstall();

        for package in self.installed.clone() {
            let name = self
                .pool
                .package(package)
                .map(|p| p.pretty_string())
                .unwrap_or_default();

            let feature_updates = self.policy.find_update_packages(
                self.pool,
                &self.installed_map,
                package,
                true,
            );
            let update_updates = self.policy.find_update_packages(
                self.pool,
                &self.installed_map,
                package,
                false,
            );

            let feature_rule =
                self.create_update_rule(package, &feature_updates, RuleType::Feature, &name);
            let update_rule =
                self.create_update_rule(package, &update_updates, RuleType::Update, &name);

            if update_rule.equals_literals(&feature_rule) {
                if allow_uninstall {
                    if let Some(id) = self.rules.add(feature_rule) {
                        self.rules[id].set_weak(true);
                        self.package_feature_rule.insert(package, id);
                    }
                } else if let Some(id) = self.rules.add(update_rule) {
                    self.package_update_rule.insert(package, id);
                }
            } else if allow_uninstall {
                if let Some(id) = self.rules.add(feature_rule) {
                    self.rules[id].set_weak(true);
                    self.package_feature_rule.insert(package, id);
                }
                if let Some(id) = self.rules.add(update_rule) {
                    self.rules[id].set_weak(true);
                    self.package_update_rule.insert(package, id);
                }
            } else if let Some(id) = self.rules.add(update_rule) {
                // the feature rule is not registered; only the strong
                // update rule constrains the package
                self.package_update_rule.insert(package, id);
            }
        }
    }

    fn add_job_rules(&mut self, request: &Request) {
        for (index, job) in request.jobs.iter().enumerate() {
            let name = job.package_name.clone().unwrap_or_default();
            match job.command {
                JobCommand::Install => {
                    let rule = self.create_install_one_of_rule(&job.packages, &name);
                    if let Some(id) = self.rules.add(rule) {
                        self.rule_to_job.insert(id, index);
                    }
                }
                JobCommand::Remove => {
                    for &package in &job.packages {
                        let rule = Rule::new(vec![-package], RuleType::Job, RuleReason::JobRemove)
                            .with_reason_data(&name);
                        if let Some(id) = self.rules.add(rule) {
                            self.rule_to_job.insert(id, index);
                        }
                    }
                }
                JobCommand::Lock => {
                    for &package in &job.packages {
                        let literal = if self.installed_map.contains(&package) {
                            package
                        } else {
                            -package
                        };
                        let rule = Rule::new(vec![literal], RuleType::Job, RuleReason::JobLock)
                            .with_reason_data(&name);
                        if let Some(id) = self.rules.add(rule) {
                            self.rule_to_job.insert(id, index);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Stop enforcing that an installed package must be kept or updated.
    fn disable_update_rule(&mut self, package: PackageId) {
        if let Some(&id) = self.package_update_rule.get(&package) {
            self.rules[id].disable();
        }
        if let Some(&id) = self.package_feature_rule.get(&package) {
            self.rules[id].disable();
        }
    }

    fn why_for_rule(&self, id: RuleId) -> Why {
        match self.rule_to_job.get(&id) {
            Some(&job) => Why::Job(job),
            None => Why::Rule(id),
        }
    }

    /// Disable a problem source: a single rule, or every rule a job emitted.
    fn disable_problem(&mut self, why: Why) {
        match why {
            Why::Rule(id) => self.rules[id].disable(),
            Why::Job(job) => {
                let ids: Vec<RuleId> = self
                    .rule_to_job
                    .iter()
                    .filter(|&(_, &j)| j == job)
                    .map(|(&id, _)| id)
                    .collect();
                for id in ids {
                    self.rules[id].disable();
                }
            }
        }
    }

    // ---- assertions --------------------------------------------------------

    /// Decide every enabled assertion rule at level 1, resolving conflicts
    /// among them by recording problems and disabling their sources.
    fn make_assertion_rule_decisions(&mut self) -> Result<()> {
        let decision_start = self.decisions.len();

        // impossible rules can never be satisfied; surface them immediately
        for id in 0..self.rules.len() as RuleId {
            if self.rules[id].is_enabled() && self.rules[id].is_impossible() {
                let why = self.why_for_rule(id);
                self.problems.push(vec![why]);
                self.disable_problem(why);
            }
        }

        let mut rule_index: usize = 0;
        while rule_index < self.rules.len() {
            let id = rule_index as RuleId;
            rule_index += 1;

            let rule = &self.rules[id];
            if rule.is_weak() || rule.is_disabled() || !rule.is_assertion() {
                continue;
            }

            let literal = rule.literals()[0];
            let package = literal_package(literal);

            if self.decisions.undecided(package) {
                self.decisions.decide(literal, 1, id);
                continue;
            }
            if self.decisions.satisfied(literal) {
                continue;
            }

            // conflict between two level-1 assertions
            if rule.rule_type() == RuleType::Learned {
                self.rules[id].disable();
                continue;
            }

            let conflict = self.decisions.decision_rule(package).ok_or_else(|| {
                SolverError::Internal(format!(
                    "found a decision on package {} without a decision rule",
                    package
                ))
            })?;

            self.learned_pool.push(vec![id, conflict]);

            if self.rules[conflict].rule_type() == RuleType::Package {
                let why = self.why_for_rule(id);
                self.problems.push(vec![why]);
                self.disable_problem(why);
                continue;
            }

            // conflict among job/update/feature assertions: every assertion
            // over this package joins the problem and is disabled
            let mut problem: Vec<Why> = Vec::new();
            let mut add = |problem: &mut Vec<Why>, why: Why| {
                if !problem.contains(&why) {
                    problem.push(why);
                }
            };
            add(&mut problem, self.why_for_rule(id));
            add(&mut problem, self.why_for_rule(conflict));

            let assertion_ids: Vec<RuleId> = self
                .rules
                .iter_types(&[RuleType::Job, RuleType::Update, RuleType::Feature])
                .filter(|r| {
                    r.is_enabled()
                        && r.is_assertion()
                        && literal_package(r.literals()[0]) == package
                })
                .map(|r| r.id())
                .collect();
            for assertion_id in assertion_ids {
                let why = self.why_for_rule(assertion_id);
                add(&mut problem, why);
                self.disable_problem(why);
            }
            self.problems.push(problem);

            trace!(package, "conflicting assertions, restarting assertion scan");
            self.decisions.rewind_to(decision_start);
            rule_index = 0;
        }

        // weak assertions: decide them when possible, silently drop them on
        // conflict
        for id in 0..self.rules.len() as RuleId {
            let rule = &self.rules[id];
            if !rule.is_weak() || rule.is_disabled() || !rule.is_assertion() {
                continue;
            }

            let literal = rule.literals()[0];
            if self.decisions.undecided(literal_package(literal)) {
                self.decisions.decide(literal, 1, id);
                continue;
            }
            if self.decisions.satisfied(literal) {
                continue;
            }

            trace!(rule = %self.rules[id], "disabling conflicted weak assertion");
            if self.rules[id].rule_type() == RuleType::Learned {
                self.rules[id].disable();
            } else {
                let why = self.why_for_rule(id);
                self.disable_problem(why);
            }
        }

        Ok(())
    }

    // ---- propagation -------------------------------------------------------

    /// Propagate the consequences of undispatched decisions through the
    /// watch lists. Returns the conflicting rule, if any.
    fn propagate(&mut self, level: i32) -> Option<RuleId> {
        while self.propagate_index < self.decisions.len() {
            let literal = self.decisions.queue()[self.propagate_index].literal;
            self.propagate_index += 1;

            // the literal that just became false
            let inv = -literal;

            let mut prev: Option<RuleId> = None;
            let mut current = self.watches.head(inv);

            while let Some(id) = current {
                let (other, next) = {
                    let rule = &self.rules[id];
                    if rule.watch1 == inv {
                        (rule.watch2, rule.next1)
                    } else {
                        (rule.watch1, rule.next2)
                    }
                };

                if self.rules[id].is_disabled() {
                    prev = Some(id);
                    current = next;
                    continue;
                }

                if self.decisions.satisfied(other) {
                    prev = Some(id);
                    current = next;
                    continue;
                }

                // look for another literal to watch instead of `inv`
                if self.rules[id].literals().len() > 2 {
                    let replacement = self.rules[id]
                        .literals()
                        .iter()
                        .copied()
                        .find(|&l| l != other && !self.decisions.conflicts(l));
                    if let Some(replacement) = replacement {
                        // unlink from inv's list, relink under replacement
                        match prev {
                            None => self.watches.set_head(inv, next),
                            Some(prev_id) => {
                                let prev_rule = &mut self.rules[prev_id];
                                if prev_rule.watch1 == inv {
                                    prev_rule.next1 = next;
                                } else {
                                    prev_rule.next2 = next;
                                }
                            }
                        }
                        self.watches.relink(&mut self.rules, id, inv, replacement);
                        current = next;
                        continue;
                    }
                }

                if self.decisions.conflicts(other) {
                    trace!(rule = %self.rules[id], "conflict during propagation");
                    return Some(id);
                }

                // unit: the other watch must become true
                self.decisions.decide(other, level, id);
                prev = Some(id);
                current = next;
            }
        }

        None
    }

    // ---- conflict analysis -------------------------------------------------

    /// 1-UIP conflict analysis. Returns the literal to assert, the level to
    /// back-jump to, the learned rule, and its index in `learned_pool`.
    fn analyze(&mut self, level: i32, conflict: RuleId) -> Result<(Literal, i32, Rule, usize)> {
        let mut rule = conflict;
        let mut rule_level: i32 = 1;
        let mut num = 0usize;
        let mut l1num = 0usize;
        let mut seen: HashSet<PackageId> = HashSet::new();
        let mut learned_literals: Vec<Literal> = Vec::new();
        let mut first_literal: Option<Literal> = None;

        let mut decision_id = self.decisions.len();

        self.learned_pool.push(Vec::new());
        let why = self.learned_pool.len() - 1;

        'resolve: loop {
            self.learned_pool[why].push(rule);

            let literals = self.rules[rule].literals().to_vec();
            for literal in literals {
                // the one literal the rule satisfied is not part of the cut
                if self.decisions.satisfied(literal) {
                    continue;
                }
                if !seen.insert(literal_package(literal)) {
                    continue;
                }

                let l = self.decisions.level(literal_package(literal));
                if l == 1 {
                    l1num += 1;
                } else if l == level {
                    num += 1;
                } else {
                    learned_literals.push(literal);
                    if l > rule_level {
                        rule_level = l;
                    }
                }
            }

            let mut l1retry = true;
            while l1retry {
                l1retry = false;

                if num == 0 {
                    if l1num == 0 {
                        return Err(SolverError::Internal(
                            "analyzed a conflict without remaining literals".into(),
                        ));
                    }
                    l1num -= 1;
                    if l1num == 0 {
                        break 'resolve;
                    }
                }

                let literal = loop {
                    if decision_id == 0 {
                        return Err(SolverError::Internal(
                            "reached the start of the decision queue while analyzing".into(),
                        ));
                    }
                    decision_id -= 1;
                    let decision = self.decisions.queue()[decision_id];
                    if seen.contains(&literal_package(decision.literal)) {
                        break decision.literal;
                    }
                };

                seen.remove(&literal_package(literal));

                let is_uip = num > 0 && {
                    num -= 1;
                    num == 0
                };
                if is_uip {
                    first_literal = Some(-literal);

                    if l1num == 0 {
                        break 'resolve;
                    }

                    // only level-1 marks are left to resolve
                    for &learned in &learned_literals {
                        seen.remove(&literal_package(learned));
                    }
                    l1num += 1;
                    l1retry = true;
                } else {
                    rule = self.decisions.queue()[decision_id].why;
                }
            }
        }

        let first = first_literal.ok_or_else(|| {
            SolverError::Internal("conflict analysis produced no asserting literal".into())
        })?;

        let mut clause = Vec::with_capacity(learned_literals.len() + 1);
        clause.push(first);
        clause.extend(learned_literals);

        let learned_rule = Rule::new(clause, RuleType::Learned, RuleReason::Learned);
        trace!(rule = %learned_rule, back_jump = rule_level, "learned");

        Ok((first, rule_level, learned_rule, why))
    }

    /// Set `watch2` to the literal decided at the highest level, so that
    /// after back-jumping the rule is unit on its asserting literal.
    fn watch2_on_highest(&mut self, id: RuleId) {
        if self.rules[id].literals().len() < 3 {
            return;
        }
        let literals = self.rules[id].literals().to_vec();
        let mut watch_level = 0;
        for literal in literals {
            let level = self.decisions.level(literal_package(literal));
            if level > watch_level {
                self.rules[id].watch2 = literal;
                watch_level = level;
            }
        }
    }

    /// Undo all decisions above `level` and drop branches at or above it.
    fn revert(&mut self, level: i32) {
        self.decisions.revert_to_level(level);
        self.propagate_index = self.decisions.len();
        while let Some(branch) = self.branches.last() {
            if branch.level < level {
                break;
            }
            self.branches.pop();
        }
    }

    /// Decide a literal one level deeper and propagate to a fixed point,
    /// learning from every conflict on the way. Returns the new level, or
    /// 0 when the conflict proved the problem unsolvable.
    fn set_propagate_learn(
        &mut self,
        mut level: i32,
        literal: Literal,
        disable_rules: bool,
        rule: RuleId,
    ) -> Result<i32> {
        level += 1;
        self.decisions.decide(literal, level, rule);

        loop {
            let Some(conflict) = self.propagate(level) else {
                break;
            };

            if level == 1 {
                return Ok(if self.analyze_unsolvable(conflict, disable_rules)? {
                    1
                } else {
                    0
                });
            }

            let (learn_literal, new_level, learned_rule, why) = self.analyze(level, conflict)?;

            if new_level <= 0 || new_level >= level {
                return Err(SolverError::Internal(format!(
                    "trying to revert to invalid level {} from level {}",
                    new_level, level
                )));
            }

            level = new_level;
            debug!(level, "back-jumping after conflict");
            self.revert(level);

            let rule_id = match self.rules.find_equal(&learned_rule) {
                Some(existing) => {
                    // the learned clause already exists; reuse it as the
                    // reason without registering new bookkeeping
                    self.learned_pool.pop();
                    existing
                }
                None => {
                    let id = self.rules.add(learned_rule).ok_or_else(|| {
                        SolverError::Internal("failed to add learned rule".into())
                    })?;
                    self.learned_why.insert(id, why);
                    self.watch2_on_highest(id);
                    if self.rules[id].literals().len() >= 2 {
                        self.watches.watch_rule(&mut self.rules, id);
                    }
                    id
                }
            };

            self.decisions.decide(learn_literal, level, rule_id);
        }

        Ok(level)
    }

    // ---- unsolvable analysis -----------------------------------------------

    /// Collect a rule's contribution to a problem. Package rules carry no
    /// user-facing cause; learned rules recurse into their ancestry; weak
    /// rules are tracked so one of them can be sacrificed instead of
    /// failing.
    fn analyze_unsolvable_rule(
        &self,
        problem: &mut Vec<Why>,
        rule_id: RuleId,
        last_weak: &mut Option<RuleId>,
    ) {
        let rule = &self.rules[rule_id];

        if rule.is_weak() {
            *last_weak = Some(rule_id);
        }

        match rule.rule_type() {
            RuleType::Learned => {
                if let Some(&why) = self.learned_why.get(&rule_id) {
                    for &ancestor in &self.learned_pool[why] {
                        self.analyze_unsolvable_rule(problem, ancestor, last_weak);
                    }
                }
                return;
            }
            RuleType::Package => return,
            _ => {}
        }

        let why = self.why_for_rule(rule_id);
        if !problem.contains(&why) {
            problem.push(why);
        }
    }

    /// A conflict at level 1: record the problem group. Returns true when
    /// a rule was disabled and solving can be retried.
    fn analyze_unsolvable(&mut self, conflict: RuleId, disable_rules: bool) -> Result<bool> {
        let mut problem: Vec<Why> = Vec::new();
        let mut last_weak: Option<RuleId> = None;

        let conflict_why = self.why_for_rule(conflict);
        problem.push(conflict_why);
        self.analyze_unsolvable_rule(&mut problem, conflict, &mut last_weak);

        let mut seen: HashSet<PackageId> = HashSet::new();
        for &literal in self.rules[conflict].literals() {
            seen.insert(literal_package(literal));
        }

        for index in (0..self.decisions.len()).rev() {
            let decision = self.decisions.queue()[index];
            let package = literal_package(decision.literal);

            // only walk decisions the conflict is actually reachable from
            if !seen.remove(&package) {
                continue;
            }

            let why = decision.why;
            self.analyze_unsolvable_rule(&mut problem, why, &mut last_weak);
            for &literal in self.rules[why].literals() {
                seen.insert(literal_package(literal));
            }
        }

        self.problems.push(problem);

        if let Some(weak_id) = last_weak {
            // sacrifice the weak rule instead of reporting a problem
            self.problems.pop();
            debug!(rule = %self.rules[weak_id], "disabling weak rule after conflict");
            let why = self.why_for_rule(weak_id);
            self.disable_problem(why);
            self.reset_solver()?;
            return Ok(true);
        }

        if disable_rules {
            let group = self.problems.last().cloned().unwrap_or_default();
            if !group.is_empty() {
                for why in group {
                    self.disable_problem(why);
                }
                self.reset_solver()?;
                return Ok(true);
            }
            // nothing to disable: retrying would loop forever
        }

        Ok(false)
    }

    /// Throw away all decisions and start over with the current rule
    /// enablement.
    fn reset_solver(&mut self) -> Result<()> {
        trace!("resetting solver state");
        self.decisions.reset();
        self.propagate_index = 0;
        self.branches.clear();
        self.enable_disable_learned_rules();
        self.make_assertion_rule_decisions()
    }

    /// Learned rules stay valid only while every ancestor that produced
    /// them is enabled.
    fn enable_disable_learned_rules(&mut self) {
        let learned_ids: Vec<RuleId> = self.rules.ids_of_type(RuleType::Learned).to_vec();
        for id in learned_ids {
            let Some(&why) = self.learned_why.get(&id) else {
                continue;
            };
            let all_enabled = self.learned_pool[why]
                .iter()
                .all(|&ancestor| self.rules[ancestor].is_enabled());
            if all_enabled {
                self.rules[id].enable();
            } else {
                self.rules[id].disable();
            }
        }
    }

    // ---- main loop ---------------------------------------------------------

    /// Pick the preferred candidate from `queue`, saving the others as a
    /// branch, and decide it.
    fn select_and_install(
        &mut self,
        level: i32,
        queue: Vec<Literal>,
        disable_rules: bool,
        rule: RuleId,
    ) -> Result<i32> {
        let literals = self
            .policy
            .select_preferred(self.pool, &self.installed_map, &queue);

        let Some((&selected, rest)) = literals.split_first() else {
            return Err(SolverError::Internal(
                "selecting from an empty decision queue".into(),
            ));
        };

        if !rest.is_empty() {
            self.branches.push(Branch {
                literals: rest.to_vec(),
                level,
                rule,
            });
        }

        self.set_propagate_learn(level, selected, disable_rules, rule)
    }

    fn run_sat(&mut self, disable_rules: bool) -> Result<()> {
        self.propagate_index = 0;

        let mut level: i32 = 1;
        let mut system_level: i32 = level + 1;
        let mut iterations: u32 = 0;

        loop {
            iterations += 1;
            if iterations > MAX_ITERATIONS {
                return Err(SolverError::Internal(
                    "solver exceeded the iteration limit".into(),
                ));
            }

            // initial propagation of the level-1 assertions
            if level == 1 {
                trace!("propagating level 1 decisions");
                if let Some(conflict) = self.propagate(level) {
                    if self.analyze_unsolvable(conflict, disable_rules)? {
                        continue;
                    }
                    return Ok(());
                }
            }

            // job rules
            if level < system_level {
                let job_ids: Vec<RuleId> = self.rules.ids_of_type(RuleType::Job).to_vec();
                let mut back_jumped = false;

                for id in job_ids {
                    if self.rules[id].is_disabled() {
                        continue;
                    }

                    let literals = self.rules[id].literals().to_vec();
                    let mut queue: Vec<Literal> = Vec::new();
                    let mut none_satisfied = true;
                    for &literal in &literals {
                        if self.decisions.satisfied(literal) {
                            none_satisfied = false;
                            break;
                        }
                        if literal > 0 && self.decisions.undecided(literal_package(literal)) {
                            queue.push(literal);
                        }
                    }
                    if !none_satisfied || queue.is_empty() {
                        continue;
                    }

                    // keep installed versions unless an update was requested
                    if self.installed_map.len() != self.update_map.len() {
                        let mut pruned: Vec<Literal> = Vec::new();
                        let mut keep_full = false;
                        for &literal in &queue {
                            let package = literal_package(literal);
                            if self.installed_map.contains(&package) {
                                pruned.push(literal);
                                if self.update_map.contains(&package) {
                                    keep_full = true;
                                    break;
                                }
                            }
                        }
                        if !keep_full && !pruned.is_empty() {
                            queue = pruned;
                        }
                    }

                    let o_level = level;
                    level = self.select_and_install(level, queue, disable_rules, id)?;
                    if level == 0 {
                        return Ok(());
                    }
                    if level <= o_level {
                        back_jumped = true;
                        break;
                    }
                }

                system_level = level + 1;
                if back_jumped {
                    continue;
                }
            }

            if level < system_level {
                system_level = level;
            }

            // installed packages: update-map packages first, then the rest
            let mut repeat = false;
            'passes: for pass in 0..2 {
                for package in self.installed.clone() {
                    if self.decisions.decided(package) {
                        continue;
                    }
                    let in_update = self.update_map.contains(&package);
                    if (pass == 0) != in_update {
                        continue;
                    }

                    let rule_id = match self.package_update_rule.get(&package) {
                        Some(&id) if self.rules[id].is_enabled() => Some(id),
                        _ => self
                            .package_feature_rule
                            .get(&package)
                            .copied()
                            .filter(|&id| self.rules[id].is_enabled()),
                    };
                    let Some(rule_id) = rule_id else {
                        continue;
                    };

                    let mut queue: Vec<Literal> = Vec::new();
                    if in_update || self.installed_map.len() == self.update_map.len() {
                        for &literal in self.rules[rule_id].literals() {
                            if literal > 0 && self.decisions.undecided(literal_package(literal)) {
                                queue.push(literal);
                            }
                        }
                    } else {
                        // not updating: try to keep the current package
                        queue.push(package);
                    }
                    if queue.is_empty() {
                        continue;
                    }

                    let o_level = level;
                    level = self.select_and_install(level, queue, disable_rules, rule_id)?;
                    if level == 0 {
                        return Ok(());
                    }
                    if level <= o_level {
                        repeat = true;
                        break 'passes;
                    }
                }
            }
            if repeat {
                continue;
            }

            // any remaining rule with at least two open candidates
            let mut decided = false;
            for id in 0..self.rules.len() as RuleId {
                if self.rules[id].is_disabled() {
                    continue;
                }

                let literals = self.rules[id].literals().to_vec();
                let mut queue: Vec<Literal> = Vec::new();
                let mut satisfied = false;
                for &literal in &literals {
                    if self.decisions.satisfied(literal) {
                        satisfied = true;
                        break;
                    }
                    if literal > 0 && self.decisions.undecided(literal_package(literal)) {
                        queue.push(literal);
                    }
                }
                if satisfied || queue.len() < 2 {
                    continue;
                }

                level = self.select_and_install(level, queue, disable_rules, id)?;
                if level == 0 {
                    return Ok(());
                }
                decided = true;
                break;
            }
            if decided {
                continue;
            }

            // minimization: revisit a saved branch whose alternative would
            // shorten the decision stack
            let mut found: Option<(usize, usize, Literal, i32)> = None;
            for (index, branch) in self.branches.iter().enumerate().rev() {
                for (offset, &literal) in branch.literals.iter().enumerate() {
                    if literal > 0
                        && self.decisions.level(literal_package(literal)) > branch.level + 1
                    {
                        found = Some((index, offset, literal, branch.level));
                    }
                }
            }

            if let Some((index, offset, literal, branch_level)) = found {
                trace!(literal, "minimizing via saved branch alternative");
                let rule = self.branches[index].rule;
                self.branches[index].literals.remove(offset);

                level = branch_level;
                self.revert(level);

                level = self.set_propagate_learn(level, literal, disable_rules, rule)?;
                if level == 0 {
                    return Ok(());
                }
                continue;
            }

            break;
        }

        Ok(())
    }

    // ---- results -----------------------------------------------------------

    /// Turn the decision queue into a transaction. Decisions matching the
    /// installed state produce no operation; the final list is reversed so
    /// unblocking removes precede the installs that depend on them.
    fn extract_transaction(&self) -> Transaction {
        let mut transaction = Transaction::new();

        for decision in self.decisions.queue() {
            let package = literal_package(decision.literal);
            let installed = self.installed_map.contains(&package);

            if (decision.literal > 0) == installed {
                continue;
            }

            if let Some(pkg) = self.pool.package(package) {
                if decision.literal > 0 {
                    transaction.push_install(Arc::clone(pkg));
                } else {
                    transaction.push_remove(Arc::clone(pkg));
                }
            }
        }

        transaction.reverse();
        transaction
    }

    fn export_problems(&self, request: &Request) -> SolverProblems {
        let mut out = SolverProblems::new();
        for group in &self.problems {
            let mut problem = Problem::new();
            for &why in group {
                match why {
                    Why::Job(index) => problem.add(ProblemCause::Job {
                        index,
                        job: request.jobs[index].clone(),
                    }),
                    Why::Rule(id) => {
                        let rule = &self.rules[id];
                        problem.add(ProblemCause::Rule {
                            rule_type: rule.rule_type(),
                            reason: rule.reason(),
                            reason_data: rule.reason_data().map(String::from),
                            literals: rule.literals().to_vec(),
                        });
                    }
                }
            }
            out.add(problem);
        }
        out
    }
}

/// Backstop against solver bugs looping forever; never reached by well
/// formed inputs.
const MAX_ITERATIONS: u32 = 100_000;
