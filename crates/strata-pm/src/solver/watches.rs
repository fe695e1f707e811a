use std::collections::HashMap;

use super::rule::{Literal, RuleId};
use super::rule_set::RuleSet;

/// Two-literal watch lists for unit propagation.
///
/// Every enabled non-assertion rule watches two of its literals. For each
/// literal this map holds the head of an intrusive singly-linked list of
/// watching rules; the links are the rules' `next1`/`next2` fields (the
/// slot that corresponds to which of the rule's two watches equals the
/// list's literal). When a watched literal is falsified, propagation walks
/// the list, moving watches to still-viable literals and surfacing unit or
/// conflicting rules.
#[derive(Debug, Default)]
pub struct Watches {
    heads: HashMap<Literal, RuleId>,
}

impl Watches {
    pub fn new() -> Self {
        Self::default()
    }

    /// First rule watching `literal`, if any
    pub fn head(&self, literal: Literal) -> Option<RuleId> {
        self.heads.get(&literal).copied()
    }

    /// Replace the head of `literal`'s watch list
    pub fn set_head(&mut self, literal: Literal, rule: Option<RuleId>) {
        match rule {
            Some(id) => {
                self.heads.insert(literal, id);
            }
            None => {
                self.heads.remove(&literal);
            }
        }
    }

    /// Register a rule's two watches.
    ///
    /// The rule's `watch1`/`watch2` must already name two distinct
    /// literals; the rule is prepended to both watch lists.
    pub fn watch_rule(&mut self, rules: &mut RuleSet, id: RuleId) {
        let watch1 = rules[id].watch1;
        let watch2 = rules[id].watch2;

        rules[id].next1 = self.head(watch1);
        self.heads.insert(watch1, id);

        rules[id].next2 = self.head(watch2);
        self.heads.insert(watch2, id);
    }

    /// Move the watch of `rule` that currently equals `from` onto `to`,
    /// prepending the rule to `to`'s list. The caller has already unlinked
    /// the rule from `from`'s list.
    pub fn relink(&mut self, rules: &mut RuleSet, id: RuleId, from: Literal, to: Literal) {
        let head = self.head(to);
        let rule = &mut rules[id];
        if rule.watch1 == from {
            rule.watch1 = to;
            rule.next1 = head;
        } else {
            debug_assert_eq!(rule.watch2, from);
            rule.watch2 = to;
            rule.next2 = head;
        }
        self.heads.insert(to, id);
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::rule::{Rule, RuleReason, RuleType};

    fn requires(rules: &mut RuleSet, literals: Vec<i32>) -> RuleId {
        rules
            .add(Rule::new(literals, RuleType::Package, RuleReason::PackageRequires))
            .unwrap()
    }

    #[test]
    fn test_watches_chain_rules_per_literal() {
        let mut rules = RuleSet::new();
        let a = requires(&mut rules, vec![-1, 2, 3]);
        let b = requires(&mut rules, vec![-1, 4]);

        let mut watches = Watches::new();
        watches.watch_rule(&mut rules, a);
        watches.watch_rule(&mut rules, b);

        // both rules watch -1; the most recently added is the head
        assert_eq!(watches.head(-1), Some(b));
        assert_eq!(rules[b].next1, Some(a));
        assert_eq!(rules[a].next1, None);

        assert_eq!(watches.head(2), Some(a));
        assert_eq!(watches.head(4), Some(b));
        assert_eq!(watches.head(3), None);
    }

    #[test]
    fn test_watches_relink_moves_watch() {
        let mut rules = RuleSet::new();
        let a = requires(&mut rules, vec![-1, 2, 3]);

        let mut watches = Watches::new();
        watches.watch_rule(&mut rules, a);

        // pretend the walker unlinked `a` from -1's list
        watches.set_head(-1, None);
        watches.relink(&mut rules, a, -1, 3);

        assert_eq!(rules[a].watch1, 3);
        assert_eq!(watches.head(3), Some(a));
        assert_eq!(watches.head(-1), None);
        // the other watch is untouched
        assert_eq!(rules[a].watch2, 2);
        assert_eq!(watches.head(2), Some(a));
    }
}
