//! A differentially-updated matcher (spec.md §4.4).
//!
//! Re-solving a rule's patterns from scratch after every mutation is
//! wasteful when running rules to a fixed point. `PersistentMatcher` keeps
//! every known assignment around and, on [`sync`](Matcher::sync), only
//! reconciles the facts that actually changed since the last call — it
//! exploits that `must_pattern` matches are monotonic in the facts added.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::delta::{Delta, FreezeFrame};
use crate::facts::{Fact, FactStore, NodeName};
use crate::matcher::unify::unify;
use crate::matcher::{Matcher, RuleAssignment};
use crate::pattern::{solve, Assignment, Constraint, Pattern, Slot};
use crate::rule::types::CompiledRule;

/// A canonical, hashable, orderable form of an [`Assignment`].
type Frozen = Vec<(crate::pattern::Var, NodeName)>;

fn freeze(assignment: &Assignment) -> Frozen {
    let mut pairs: Frozen = assignment.iter().map(|(v, n)| (*v, n.clone())).collect();
    pairs.sort();
    pairs
}

fn thaw(frozen: &Frozen) -> Assignment {
    frozen.iter().cloned().collect()
}

fn constraint_to_fact(constraint: &Constraint, assignment: &Assignment) -> Fact {
    let resolve = |slot: &Slot| match slot {
        Slot::Constant(name) => name.clone(),
        Slot::Variable(var) => assignment
            .get(var)
            .cloned()
            .expect("every variable in a fully-matched constraint is bound"),
    };
    (resolve(&constraint.0), resolve(&constraint.1), resolve(&constraint.2))
}

/// Tracks assignments to a single [`Pattern`], incrementally.
struct PatternMatcher {
    pattern: Pattern,
    partial: Assignment,
    assignments: HashSet<Frozen>,
    assignments_relying_on_fact: HashMap<Fact, HashSet<Frozen>>,
    facts_used_in_assignment: HashMap<Frozen, HashSet<Fact>>,
}

impl PatternMatcher {
    fn new(store: &FactStore, pattern: Pattern, partial: Assignment) -> Self {
        let mut matcher = PatternMatcher {
            pattern,
            partial,
            assignments: HashSet::new(),
            assignments_relying_on_fact: HashMap::new(),
            facts_used_in_assignment: HashMap::new(),
        };
        matcher.full_sync(store);
        matcher
    }

    fn full_sync(&mut self, store: &FactStore) {
        for assignment in solve(store, &self.pattern, &self.partial) {
            let frozen = freeze(&assignment);
            for constraint in &self.pattern.constraints {
                let fact = constraint_to_fact(constraint, &assignment);
                self.assignments_relying_on_fact
                    .entry(fact.clone())
                    .or_default()
                    .insert(frozen.clone());
                self.facts_used_in_assignment
                    .entry(frozen.clone())
                    .or_default()
                    .insert(fact);
            }
            self.assignments.insert(frozen);
        }
    }

    fn sync(&mut self, store: &FactStore, delta: &Delta) -> (HashSet<Frozen>, HashSet<Frozen>) {
        let mut removed = HashSet::new();
        let mut added = HashSet::new();
        if self.pattern.constraints.is_empty() {
            return (removed, added);
        }

        for fact in delta.remove_facts() {
            if let Some(relying) = self.assignments_relying_on_fact.get(fact).cloned() {
                for frozen in relying {
                    self.remove_assignment(&frozen);
                    removed.insert(frozen);
                }
            }
            self.assignments_relying_on_fact.remove(fact);
        }

        let mut seed_partials: HashSet<Frozen> = HashSet::new();
        for fact in delta.add_facts() {
            for constraint in &self.pattern.constraints {
                if let Some(assignment) = unify(&self.pattern, constraint, fact, &self.partial) {
                    seed_partials.insert(freeze(&assignment));
                }
            }
        }
        seed_partials.remove(&freeze(&self.partial));

        let mut sorted_partials: Vec<Frozen> = seed_partials.into_iter().collect();
        sorted_partials.sort();
        for partial in sorted_partials {
            let partial_assignment = thaw(&partial);
            for new_assignment in solve(store, &self.pattern, &partial_assignment) {
                let frozen = freeze(&new_assignment);
                if !self.assignments.contains(&frozen) {
                    self.add_assignment(&new_assignment, &frozen);
                    added.insert(frozen);
                }
            }
        }

        (removed, added)
    }

    fn remove_assignment(&mut self, frozen: &Frozen) {
        self.assignments.remove(frozen);
        if let Some(facts) = self.facts_used_in_assignment.remove(frozen) {
            for fact in facts {
                if let Some(set) = self.assignments_relying_on_fact.get_mut(&fact) {
                    set.remove(frozen);
                }
            }
        }
    }

    fn add_assignment(&mut self, assignment: &Assignment, frozen: &Frozen) {
        self.assignments.insert(frozen.clone());
        for constraint in &self.pattern.constraints {
            let fact = constraint_to_fact(constraint, assignment);
            self.assignments_relying_on_fact
                .entry(fact.clone())
                .or_default()
                .insert(frozen.clone());
            self.facts_used_in_assignment
                .entry(frozen.clone())
                .or_default()
                .insert(fact);
        }
    }
}

struct MustEntry {
    nevers: Vec<PatternMatcher>,
    try_matcher: Option<PatternMatcher>,
}

/// A matcher that keeps its assignments in sync with the store across
/// repeated `sync()` calls, recomputing only what the last delta touched.
pub struct PersistentMatcher {
    rule: Arc<CompiledRule>,
    freeze_frame: FreezeFrame,
    partial: Assignment,
    must_matcher: PatternMatcher,
    must_assignments: HashMap<Frozen, MustEntry>,
}

impl PersistentMatcher {
    pub fn new(store: &FactStore, rule: Arc<CompiledRule>, partial: &HashMap<NodeName, NodeName>) -> Self {
        let partial = rule.translate_partial(partial);
        let must_matcher = PatternMatcher::new(store, rule.must_pattern.clone(), partial.clone());
        let mut matcher = PersistentMatcher {
            rule,
            freeze_frame: store.freeze_frame(),
            partial,
            must_assignments: HashMap::new(),
            must_matcher,
        };
        let initial: Vec<Frozen> = matcher.must_matcher.assignments.iter().cloned().collect();
        for frozen in initial {
            matcher.add_must(store, frozen);
        }
        matcher
    }

    fn add_must(&mut self, store: &FactStore, frozen: Frozen) {
        let assignment = thaw(&frozen);
        let mut nevers = Vec::with_capacity(self.rule.never_patterns.len());
        let mut invalid = false;
        for never_pattern in &self.rule.never_patterns {
            let matcher = PatternMatcher::new(store, never_pattern.clone(), assignment.clone());
            invalid = invalid || !matcher.assignments.is_empty();
            nevers.push(matcher);
        }
        let try_matcher = if invalid {
            None
        } else {
            Some(PatternMatcher::new(store, self.rule.try_pattern.clone(), assignment))
        };
        self.must_assignments.insert(frozen, MustEntry { nevers, try_matcher });
    }
}

impl Matcher for PersistentMatcher {
    fn sync(&mut self, store: &FactStore) {
        let current = store.freeze_frame();
        let delta = self.freeze_frame.delta_to_reach(&current);
        self.freeze_frame = current;

        let (removed, added) = self.must_matcher.sync(store, &delta);
        for frozen in &removed {
            self.must_assignments.remove(frozen);
        }

        let existing_keys: Vec<Frozen> = self.must_assignments.keys().cloned().collect();
        for key in existing_keys {
            let mut invalid = false;
            {
                let entry = self.must_assignments.get_mut(&key).expect("key from self");
                for never in entry.nevers.iter_mut() {
                    never.sync(store, &delta);
                    invalid = invalid || !never.assignments.is_empty();
                }
            }
            let entry = self.must_assignments.get_mut(&key).expect("key from self");
            if invalid {
                entry.try_matcher = None;
            } else if let Some(try_matcher) = entry.try_matcher.as_mut() {
                try_matcher.sync(store, &delta);
            } else {
                let assignment = thaw(&key);
                entry.try_matcher = Some(PatternMatcher::new(store, self.rule.try_pattern.clone(), assignment));
            }
        }

        for frozen in added {
            self.add_must(store, frozen);
        }
    }

    fn assignments(&self, _store: &FactStore) -> Vec<RuleAssignment> {
        let mut keys: Vec<&Frozen> = self.must_assignments.keys().collect();
        keys.sort();

        let mut results = Vec::new();
        for key in keys {
            let entry = &self.must_assignments[key];
            if entry.nevers.iter().any(|never| !never.assignments.is_empty()) {
                continue;
            }
            if let Some(try_matcher) = &entry.try_matcher {
                if !try_matcher.assignments.is_empty() {
                    let mut tries: Vec<&Frozen> = try_matcher.assignments.iter().collect();
                    tries.sort();
                    for frozen in tries {
                        results.push(RuleAssignment {
                            rule: self.rule.clone(),
                            assignment: self.rule.translate(&thaw(frozen)),
                        });
                    }
                    continue;
                }
            }
            results.push(RuleAssignment {
                rule: self.rule.clone(),
                assignment: self.rule.translate(&thaw(key)),
            });
        }
        results
    }
}
