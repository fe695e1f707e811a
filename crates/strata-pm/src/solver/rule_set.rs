use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use super::rule::{Rule, RuleId, RuleType};

/// Ordered, typed store of solver rules.
///
/// Rules are kept in one arena in insertion order; the global id of a rule
/// is its insertion index across all types. Each type additionally tracks
/// its own insertion-ordered id list. Rules are never removed - disabling
/// is a flag on the rule.
///
/// `add` deduplicates: a rule whose literal multiset equals an existing
/// rule's (of any type) is rejected.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,

    /// Ids by type, in insertion order
    by_type: HashMap<RuleType, Vec<RuleId>>,

    /// Sorted-literal hash -> ids with that hash, for deduplication
    hashes: HashMap<u64, Vec<RuleId>>,
}

impl RuleSet {
    /// Create a new empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, returning its id, or `None` if an equal rule exists.
    pub fn add(&mut self, mut rule: Rule) -> Option<RuleId> {
        let hash = rule.literal_hash();
        if let Some(ids) = self.hashes.get(&hash) {
            for &id in ids {
                if self.rules[id as usize].equals_literals(&rule) {
                    return None;
                }
            }
        }

        let id = self.rules.len() as RuleId;
        rule.set_id(id);

        self.by_type.entry(rule.rule_type()).or_default().push(id);
        self.hashes.entry(hash).or_default().push(id);
        self.rules.push(rule);

        Some(id)
    }

    /// Find the rule with the same literal multiset, if one exists
    pub fn find_equal(&self, rule: &Rule) -> Option<RuleId> {
        let ids = self.hashes.get(&rule.literal_hash())?;
        ids.iter()
            .copied()
            .find(|&id| self.rules[id as usize].equals_literals(rule))
    }

    /// Get a rule by its global id
    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id as usize)
    }

    /// Get a mutable rule by its global id
    pub fn get_mut(&mut self, id: RuleId) -> Option<&mut Rule> {
        self.rules.get_mut(id as usize)
    }

    /// All rules in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Ids of rules of one type, in insertion order
    pub fn ids_of_type(&self, rule_type: RuleType) -> &[RuleId] {
        self.by_type
            .get(&rule_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Rules of any of the given types, in global insertion order
    pub fn iter_types<'a>(
        &'a self,
        types: &'a [RuleType],
    ) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |r| types.contains(&r.rule_type()))
    }

    /// Total number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Count rules of a type
    pub fn count_of_type(&self, rule_type: RuleType) -> usize {
        self.ids_of_type(rule_type).len()
    }
}

impl Index<RuleId> for RuleSet {
    type Output = Rule;

    fn index(&self, id: RuleId) -> &Rule {
        &self.rules[id as usize]
    }
}

impl IndexMut<RuleId> for RuleSet {
    fn index_mut(&mut self, id: RuleId) -> &mut Rule {
        &mut self.rules[id as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::rule::RuleReason;

    fn rule(literals: Vec<i32>, rule_type: RuleType) -> Rule {
        Rule::new(literals, rule_type, RuleReason::PackageRequires)
    }

    #[test]
    fn test_rule_set_add_assigns_sequential_ids() {
        let mut rules = RuleSet::new();

        let a = rules.add(rule(vec![1], RuleType::Package));
        let b = rules.add(rule(vec![-1, 2], RuleType::Package));

        assert_eq!(a, Some(0));
        assert_eq!(b, Some(1));
        assert_eq!(rules.len(), 2);
    }

    #[test]
    fn test_rule_set_deduplicates_across_types() {
        let mut rules = RuleSet::new();

        let a = rules.add(rule(vec![1, 2, 3], RuleType::Package));
        let b = rules.add(rule(vec![3, 1, 2], RuleType::Job));

        assert!(a.is_some());
        assert!(b.is_none());
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_rule_set_ids_of_type() {
        let mut rules = RuleSet::new();
        rules.add(rule(vec![1], RuleType::Package));
        rules.add(rule(vec![2], RuleType::Job));
        rules.add(rule(vec![-1, 3], RuleType::Package));

        assert_eq!(rules.ids_of_type(RuleType::Package), &[0, 2]);
        assert_eq!(rules.ids_of_type(RuleType::Job), &[1]);
        assert!(rules.ids_of_type(RuleType::Learned).is_empty());
    }

    #[test]
    fn test_rule_set_iter_types_preserves_insertion_order() {
        let mut rules = RuleSet::new();
        rules.add(rule(vec![1], RuleType::Update));
        rules.add(rule(vec![2], RuleType::Job));
        rules.add(rule(vec![3], RuleType::Feature));

        let ids: Vec<RuleId> = rules
            .iter_types(&[RuleType::Job, RuleType::Update, RuleType::Feature])
            .map(|r| r.id())
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_rule_set_index() {
        let mut rules = RuleSet::new();
        let id = rules.add(rule(vec![4], RuleType::Package)).unwrap();

        assert_eq!(rules[id].literals(), &[4]);
        rules[id].disable();
        assert!(rules[id].is_disabled());
    }
}
