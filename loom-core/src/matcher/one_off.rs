//! A stateless, recompute-everything-each-time matcher (spec.md §4.4).

use std::collections::HashMap;
use std::sync::Arc;

use crate::facts::{FactStore, NodeName};
use crate::matcher::{Matcher, RuleAssignment};
use crate::pattern::solve;
use crate::rule::types::CompiledRule;

/// Solves a rule's patterns from scratch on every call; simple, always
/// correct, and the right choice for one-off queries (spec.md §6 `propose`).
pub struct OneOffMatcher {
    rule: Arc<CompiledRule>,
    partial: crate::pattern::Assignment,
}

impl OneOffMatcher {
    pub fn new(rule: Arc<CompiledRule>, partial: &HashMap<NodeName, NodeName>) -> Self {
        let partial = rule.translate_partial(partial);
        OneOffMatcher { rule, partial }
    }
}

impl Matcher for OneOffMatcher {
    fn sync(&mut self, _store: &FactStore) {}

    fn assignments(&self, store: &FactStore) -> Vec<RuleAssignment> {
        let mut results = Vec::new();
        for must_assignment in solve(store, &self.rule.must_pattern, &self.partial) {
            if self.rule.invalid(&must_assignment, store) {
                continue;
            }
            let try_assignments = solve(store, &self.rule.try_pattern, &must_assignment);
            let mut any_assigned = false;
            for try_assignment in &try_assignments {
                any_assigned = true;
                results.push(RuleAssignment {
                    rule: self.rule.clone(),
                    assignment: self.rule.translate(try_assignment),
                });
            }
            if self.rule.try_pattern.constraints.is_empty() {
                continue;
            }
            if !any_assigned {
                results.push(RuleAssignment {
                    rule: self.rule.clone(),
                    assignment: self.rule.translate(&must_assignment),
                });
            }
        }
        results
    }
}
