//! Solving a [`Pattern`] against a [`FactStore`]
//!
//! The search orders variables heuristically (most-constrained first, tying
//! on node-name depth) and then backtracks, narrowing each variable's
//! candidate set with [`FactStore::lookup`] before trying it. The ordering
//! is cached per-store keyed on `(constraints, maybe_equal)`, mirroring the
//! upstream solver's `CPPPattern.cached` table — only the preprocessing is
//! cached, not solutions, since the store mutates between calls.

use std::collections::{HashMap, HashSet};

use crate::facts::{FactStore, NodeName};
use crate::pattern::types::{Assignment, Constraint, Pattern, Slot, Var};

#[derive(PartialEq, Eq, Hash, Clone)]
pub(crate) struct OrderCacheKey {
    constraints: Vec<Constraint>,
    maybe_equal: Vec<(Var, Vec<Var>)>,
}

fn cache_key(pattern: &Pattern) -> OrderCacheKey {
    let mut maybe_equal: Vec<(Var, Vec<Var>)> = pattern
        .maybe_equal
        .iter()
        .map(|(v, set)| {
            let mut others: Vec<Var> = set.iter().copied().collect();
            others.sort();
            (*v, others)
        })
        .collect();
    maybe_equal.sort_by_key(|(v, _)| *v);
    OrderCacheKey {
        constraints: pattern.constraints.clone(),
        maybe_equal,
    }
}

/// How many colons (`:`) appear in a constraint's constant slots — a proxy
/// for how "deep"/specific a path-like node name is, used as a tie-break
/// when two candidate constraints are otherwise equally good.
fn depth_score(constraint: &Constraint) -> usize {
    let (s, p, o) = constraint;
    [s, p, o]
        .iter()
        .filter_map(|slot| match slot {
            Slot::Constant(name) => Some(name.matches(':').count()),
            Slot::Variable(_) => None,
        })
        .sum()
}

/// Computes (or retrieves from cache) the variable search order for
/// `pattern`: at each step, pick an unordered variable from whichever
/// remaining constraint has the most slots already pinned down (by a
/// previously-chosen variable or a constant), breaking ties by
/// [`depth_score`].
fn variable_order(store: &FactStore, pattern: &Pattern) -> Vec<Var> {
    let key = cache_key(pattern);
    if let Some(cached) = store.cached_order(&key) {
        return cached;
    }

    let mut all_vars: Vec<Var> = pattern.variables().into_iter().collect();
    all_vars.sort();

    let mut fixed_count: Vec<usize> = pattern
        .constraints
        .iter()
        .map(|(s, p, o)| {
            [s, p, o]
                .iter()
                .filter(|slot| matches!(slot, Slot::Constant(_)))
                .count()
        })
        .collect();

    let mut chosen = Vec::with_capacity(all_vars.len());
    let mut remaining: HashSet<Var> = all_vars.iter().copied().collect();

    while !remaining.is_empty() {
        let best_idx = pattern
            .constraints
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                let (s, p, o) = c;
                [s, p, o].iter().any(|slot| match slot {
                    Slot::Variable(v) => remaining.contains(v),
                    Slot::Constant(_) => false,
                })
            })
            .max_by_key(|(i, c)| (fixed_count[*i], depth_score(c)))
            .map(|(i, _)| i)
            .expect("remaining variables must appear in some constraint");

        let constraint = &pattern.constraints[best_idx];
        let (s, p, o) = constraint;
        let var = [s, p, o]
            .iter()
            .find_map(|slot| match slot {
                Slot::Variable(v) if remaining.contains(v) => Some(*v),
                _ => None,
            })
            .expect("best_idx has an unchosen variable");

        chosen.push(var);
        remaining.remove(&var);
        for (i, (s, p, o)) in pattern.constraints.iter().enumerate() {
            if [s, p, o].iter().any(|slot| matches!(slot, Slot::Variable(v) if *v == var)) {
                fixed_count[i] += 1;
            }
        }
    }

    store.cache_order(key, chosen.clone());
    chosen
}

fn resolve(slot: &Slot, target: Var, assignment: &Assignment) -> Resolved {
    match slot {
        Slot::Constant(name) => Resolved::Known(name.clone()),
        Slot::Variable(v) if *v == target => Resolved::Target,
        Slot::Variable(v) => match assignment.get(v) {
            Some(node) => Resolved::Known(node.clone()),
            None => Resolved::Unknown,
        },
    }
}

enum Resolved {
    Known(NodeName),
    Target,
    Unknown,
}

/// Narrows the candidate set for `var` by intersecting, across every
/// constraint mentioning `var` whose other slots are already fully
/// resolved, the node names that could fill `var`'s position(s). Returns
/// `None` if no constraint could narrow it (the caller then falls back to
/// every node in the store).
fn candidates_for(
    store: &FactStore,
    pattern: &Pattern,
    var: Var,
    assignment: &Assignment,
) -> Option<HashSet<NodeName>> {
    let mut result: Option<HashSet<NodeName>> = None;

    for (s, p, o) in &pattern.constraints {
        let rs = resolve(s, var, assignment);
        let rp = resolve(p, var, assignment);
        let ro = resolve(o, var, assignment);

        let mentions_target = matches!(rs, Resolved::Target)
            || matches!(rp, Resolved::Target)
            || matches!(ro, Resolved::Target);
        if !mentions_target {
            continue;
        }
        let any_unknown = matches!(rs, Resolved::Unknown)
            || matches!(rp, Resolved::Unknown)
            || matches!(ro, Resolved::Unknown);
        if any_unknown {
            continue;
        }

        let as_opt = |r: &Resolved| match r {
            Resolved::Known(n) => Some(n.clone()),
            _ => None,
        };
        let facts = store.lookup(as_opt(&rs).as_ref(), as_opt(&rp).as_ref(), as_opt(&ro).as_ref());

        let mut here: HashSet<NodeName> = HashSet::new();
        'facts: for fact in facts {
            let positions = [
                (matches!(rs, Resolved::Target), fact.0.clone()),
                (matches!(rp, Resolved::Target), fact.1.clone()),
                (matches!(ro, Resolved::Target), fact.2.clone()),
            ];
            let mut value: Option<NodeName> = None;
            for (is_target, node) in positions {
                if !is_target {
                    continue;
                }
                match &value {
                    None => value = Some(node),
                    Some(existing) if *existing != node => continue 'facts,
                    Some(_) => {}
                }
            }
            if let Some(value) = value {
                here.insert(value);
            }
        }

        result = Some(match result {
            None => here,
            Some(acc) => acc.intersection(&here).cloned().collect(),
        });
    }

    result
}

/// Enumerates every assignment satisfying `pattern` against `store`,
/// starting from `partial` (which may already bind some of the pattern's
/// variables — see rule typechecking, spec.md §4.3).
pub fn solve(store: &FactStore, pattern: &Pattern, partial: &Assignment) -> Vec<Assignment> {
    if pattern.constraints.is_empty() {
        // Trivial pattern (spec.md §4.2): a non-null partial is yielded
        // verbatim, but with no partial there is nothing to bind at all.
        return if partial.is_empty() { vec![] } else { vec![partial.clone()] };
    }

    let order: Vec<Var> = variable_order(store, pattern)
        .into_iter()
        .filter(|v| !partial.contains_key(v))
        .collect();

    let mut results = Vec::new();
    let mut assignment = partial.clone();
    backtrack(store, pattern, &order, 0, &mut assignment, &mut results);
    results
}

fn backtrack(
    store: &FactStore,
    pattern: &Pattern,
    order: &[Var],
    idx: usize,
    assignment: &mut Assignment,
    results: &mut Vec<Assignment>,
) {
    if idx == order.len() {
        if pattern.valid_maybe_equals(assignment) {
            results.push(assignment.clone());
        }
        return;
    }

    let var = order[idx];
    let candidates = candidates_for(store, pattern, var, assignment)
        .unwrap_or_else(|| store.nodes().into_iter().collect());

    let mut sorted: Vec<NodeName> = candidates.into_iter().collect();
    sorted.sort();

    for candidate in sorted {
        assignment.insert(var, candidate);
        if pattern.valid_maybe_equals(assignment) {
            backtrack(store, pattern, order, idx + 1, assignment, results);
        }
        assignment.remove(&var);
    }
}
