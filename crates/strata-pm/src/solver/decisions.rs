use super::pool::PackageId;
use super::rule::{literal_package, Literal, RuleId};

/// One entry of the decision queue
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    /// The decided literal
    pub literal: Literal,
    /// The rule that forced or justified this decision
    pub why: RuleId,
}

/// Tracks decisions made during SAT solving.
///
/// The decision map is a flat vec indexed by package id. A value of 0
/// means undecided; a positive value is the level at which the package was
/// decided installed, a negative value the level at which it was decided
/// removed. The queue records literals in decision order together with the
/// rule that caused each decision.
#[derive(Debug, Default)]
pub struct Decisions {
    /// package id -> signed decision level (0 = undecided)
    map: Vec<i32>,
    queue: Vec<Decision>,
}

impl Decisions {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn slot(&self, package: PackageId) -> i32 {
        self.map.get(package as usize).copied().unwrap_or(0)
    }

    /// Record a decision. The caller must have checked for conflicts.
    pub fn decide(&mut self, literal: Literal, level: i32, why: RuleId) {
        let package = literal_package(literal) as usize;
        if package >= self.map.len() {
            self.map.resize(package + 1, 0);
        }
        self.map[package] = if literal > 0 { level } else { -level };
        self.queue.push(Decision { literal, why });
    }

    /// Whether the current decisions make this literal true
    #[inline]
    pub fn satisfied(&self, literal: Literal) -> bool {
        let decision = self.slot(literal_package(literal));
        decision != 0 && (decision > 0) == (literal > 0)
    }

    /// Whether the current decisions make this literal false
    #[inline]
    pub fn conflicts(&self, literal: Literal) -> bool {
        let decision = self.slot(literal_package(literal));
        decision != 0 && (decision > 0) != (literal > 0)
    }

    /// Whether the package has been decided either way
    #[inline]
    pub fn decided(&self, package: PackageId) -> bool {
        self.slot(package) != 0
    }

    /// Whether the package is undecided
    #[inline]
    pub fn undecided(&self, package: PackageId) -> bool {
        self.slot(package) == 0
    }

    /// Whether the package was decided installed
    #[inline]
    pub fn decided_install(&self, package: PackageId) -> bool {
        self.slot(package) > 0
    }

    /// Whether the package was decided removed
    #[inline]
    pub fn decided_remove(&self, package: PackageId) -> bool {
        self.slot(package) < 0
    }

    /// The level a package was decided at, or 0 if undecided
    #[inline]
    pub fn level(&self, package: PackageId) -> i32 {
        self.slot(package).abs()
    }

    /// The rule that decided a package, searching the queue
    pub fn decision_rule(&self, package: PackageId) -> Option<RuleId> {
        self.queue
            .iter()
            .find(|d| literal_package(d.literal) == package)
            .map(|d| d.why)
    }

    /// The decision queue, in decision order
    pub fn queue(&self) -> &[Decision] {
        &self.queue
    }

    /// Number of decisions made
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Undo the most recent decision
    pub fn revert_last(&mut self) {
        if let Some(decision) = self.queue.pop() {
            self.map[literal_package(decision.literal) as usize] = 0;
        }
    }

    /// Undo every decision made above `level`
    pub fn revert_to_level(&mut self, level: i32) {
        while let Some(last) = self.queue.last() {
            if self.level(literal_package(last.literal)) <= level {
                break;
            }
            self.revert_last();
        }
    }

    /// Truncate the queue back to `len` decisions
    pub fn rewind_to(&mut self, len: usize) {
        while self.queue.len() > len {
            self.revert_last();
        }
    }

    /// Forget everything
    pub fn reset(&mut self) {
        self.map.fill(0);
        self.queue.clear();
    }
}
