use std::fmt;
use std::hash::{Hash, Hasher};

use super::pool::PackageId;

/// A literal in SAT terms - positive means "install", negative means
/// "don't install". The absolute value is the package id, so a literal is
/// never zero and inverting it is negation.
pub type Literal = i32;

/// The package a literal refers to
#[inline]
pub fn literal_package(literal: Literal) -> PackageId {
    literal.abs()
}

/// Identifier of a rule within a [`super::RuleSet`]
pub type RuleId = u32;

/// Types of rules generated during dependency resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleType {
    /// Derived from package metadata (requires, conflicts, obsoletes)
    Package,
    /// Derived from a user job
    Job,
    /// Keeps an installed package or moves it to an update candidate
    Update,
    /// Update rule that also permits downgrades
    Feature,
    /// Learned clause from conflict analysis
    Learned,
    /// Reserved for branch-preference clauses; no generator emits these
    Choice,
}

/// Why a rule exists (for problem reporting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleReason {
    /// Package cannot be installed on this system
    NotInstallable,
    /// No package provides a required name
    NothingProvides,
    /// Package requires one of the listed providers
    PackageRequires,
    /// Package declares a conflict
    PackageConflict,
    /// Package replaces (obsoletes) another
    PackageObsoletes,
    /// An installed package replaces another
    InstalledPackageObsoletes,
    /// Two packages share a name; at most one can be installed
    PackageSameName,
    /// User asked for an install
    JobInstall,
    /// User asked for a removal
    JobRemove,
    /// User locked a package
    JobLock,
    /// Internal rule allowing an installed package to be updated
    InternalAllowUpdate,
    /// Clause learned by conflict analysis
    Learned,
}

/// A SAT rule (clause) over package literals.
///
/// Rules are disjunctions: a rule is satisfied when at least one literal is
/// true. A rule with a single literal is an assertion; a rule with no
/// literals is impossible (always false).
///
/// # Examples
///
/// - `[A]` - package A must be installed (assertion)
/// - `[-A]` - package A must not be installed
/// - `[-A, B, C]` - if A is installed, then B or C must be installed
/// - `[-A, -B]` - A and B cannot both be installed (conflict)
///
/// Non-assertion rules watch two of their literals. The watched literals
/// and the `next1`/`next2` links are managed by the solver's watch lists:
/// each rule is a node in two intrusive linked lists, one per watched
/// literal.
#[derive(Debug, Clone)]
pub struct Rule {
    /// The literals of the clause
    literals: Vec<Literal>,
    rule_type: RuleType,
    reason: RuleReason,
    /// Free-form context for messages (usually the target name)
    reason_data: Option<String>,
    /// Rule ID (assigned by RuleSet)
    id: RuleId,
    /// Disabled rules are ignored by propagation and decisions
    enabled: bool,
    /// Weak rules may be silently disabled on conflict instead of
    /// producing a user-visible problem
    weak: bool,
    /// First watched literal
    pub(super) watch1: Literal,
    /// Second watched literal
    pub(super) watch2: Literal,
    /// Next rule in the watch list of `watch1`
    pub(super) next1: Option<RuleId>,
    /// Next rule in the watch list of `watch2`
    pub(super) next2: Option<RuleId>,
}

impl Rule {
    /// Create a new rule with the given literals
    pub fn new(literals: Vec<Literal>, rule_type: RuleType, reason: RuleReason) -> Self {
        let watch1 = literals.first().copied().unwrap_or(0);
        let watch2 = literals.get(1).copied().unwrap_or(0);
        Self {
            literals,
            rule_type,
            reason,
            reason_data: None,
            id: 0,
            enabled: true,
            weak: false,
            watch1,
            watch2,
            next1: None,
            next2: None,
        }
    }

    /// Attach context for messages
    pub fn with_reason_data(mut self, data: impl Into<String>) -> Self {
        self.reason_data = Some(data.into());
        self
    }

    pub(super) fn set_id(&mut self, id: RuleId) {
        self.id = id;
    }

    pub fn id(&self) -> RuleId {
        self.id
    }

    pub fn rule_type(&self) -> RuleType {
        self.rule_type
    }

    pub fn reason(&self) -> RuleReason {
        self.reason
    }

    pub fn reason_data(&self) -> Option<&str> {
        self.reason_data.as_deref()
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    /// An assertion has exactly one literal and propagates at level 1
    pub fn is_assertion(&self) -> bool {
        self.literals.len() == 1
    }

    /// An empty rule can never be satisfied
    pub fn is_impossible(&self) -> bool {
        self.literals.is_empty()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_disabled(&self) -> bool {
        !self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_weak(&self) -> bool {
        self.weak
    }

    pub fn set_weak(&mut self, weak: bool) {
        self.weak = weak;
    }

    /// Hash of the literal multiset, for deduplication
    pub fn literal_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        let mut hasher = DefaultHasher::new();
        let mut sorted = self.literals.clone();
        sorted.sort_unstable();
        sorted.hash(&mut hasher);
        hasher.finish()
    }

    /// Whether two rules have the same literal multiset, in any order
    pub fn equals_literals(&self, other: &Rule) -> bool {
        if self.literals.len() != other.literals.len() {
            return false;
        }
        let mut a = self.literals.clone();
        let mut b = other.literals.clone();
        a.sort_unstable();
        b.sort_unstable();
        a == b
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let literals: Vec<String> = self
            .literals
            .iter()
            .map(|&l| if l > 0 { format!("+{}", l) } else { l.to_string() })
            .collect();
        write!(f, "({:?}) [{}]", self.rule_type, literals.join(" | "))?;
        if !self.enabled {
            write!(f, " (disabled)")?;
        }
        Ok(())
    }
}
