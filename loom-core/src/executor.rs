//! Applying a rule assignment to the fact store (spec.md §4.5).
//!
//! Execution order: synthesize `/INSERT` nodes, then add facts that mention
//! only assigned (and not `/REMOVE`d) nodes, then remove `/REMOVE` nodes
//! with their facts, then `/SUBTRACT` facts (unless the same fact was just
//! re-added — addition wins over subtraction), then any `/SUBTRACT` nodes
//! left with no facts.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::facts::{Fact, FactStore, NodeName};
use crate::hash::{hash_assignment, real_hash};
use crate::matcher::RuleAssignment;

/// Applies `assignment` (discovered for some compiled rule) to `store`,
/// returning the final node-keyed assignment including any synthesized
/// `/INSERT` nodes.
///
/// Does not commit; the caller decides whether/when to commit the buffer.
pub fn apply(store: &FactStore, assignment: &RuleAssignment) -> HashMap<NodeName, NodeName> {
    let rule = &assignment.rule;
    let mut running = assignment.assignment.clone();

    let base_hash = hash_assignment(
        &assignment
            .assignment
            .iter()
            .map(|(node, value)| (node.to_string(), value.to_string()))
            .collect::<Vec<_>>(),
    );

    add_insert_nodes(store, rule, &mut running, &base_hash);
    let added_facts = add_relevant_facts(store, rule, &running);
    remove_marked(store, rule, &running, &added_facts);

    running
}

fn add_insert_nodes(
    store: &FactStore,
    rule: &crate::rule::CompiledRule,
    running: &mut HashMap<NodeName, NodeName>,
    base_hash: &str,
) {
    for node in &rule.nodes_by_type.insert {
        if running.contains_key(node) {
            continue;
        }
        let synthesized = real_hash(&format!("{base_hash}{node}"));
        let full_name = store.node(&format!("/:{synthesized}:??"));
        running.insert(node.clone(), full_name.clone());
        if let Some(equivalents) = rule.equal.get(node) {
            for equivalent in equivalents {
                running.insert(equivalent.clone(), full_name.clone());
            }
        }
    }
}

fn add_relevant_facts(
    store: &FactStore,
    rule: &crate::rule::CompiledRule,
    running: &HashMap<NodeName, NodeName>,
) -> HashSet<Fact> {
    let ignore_nodes: HashSet<&NodeName> = rule.nodes_by_type.remove.iter().collect();
    let must_include: HashSet<&NodeName> = rule.nodes_by_type.insert.iter().collect();
    let relevant_nodes: BTreeSet<NodeName> = running
        .keys()
        .filter(|node| !ignore_nodes.contains(node))
        .cloned()
        .collect();

    let mut new_facts = Vec::new();
    for node in &relevant_nodes {
        for fact in rule.indexed_facts.get(node).into_iter().flatten() {
            let mentions_insert = [&fact.0, &fact.1, &fact.2].into_iter().any(|n| must_include.contains(n));
            let rule_args_assigned = [&fact.0, &fact.1, &fact.2]
                .into_iter()
                .filter(|n| rule.all_nodes.contains(*n))
                .all(|n| relevant_nodes.contains(n));
            if mentions_insert && rule_args_assigned {
                let translated = translate_fact(fact, running);
                new_facts.push(translated);
            }
        }
    }
    store.add_facts(new_facts.clone());
    new_facts.into_iter().collect()
}

fn translate_fact(fact: &Fact, running: &HashMap<NodeName, NodeName>) -> Fact {
    let map = |n: &NodeName| running.get(n).cloned().unwrap_or_else(|| n.clone());
    (map(&fact.0), map(&fact.1), map(&fact.2))
}

fn remove_marked(
    store: &FactStore,
    rule: &crate::rule::CompiledRule,
    running: &HashMap<NodeName, NodeName>,
    added_facts: &HashSet<Fact>,
) {
    for node in &rule.nodes_by_type.remove {
        if let Some(resolved) = running.get(node) {
            store.remove_node_with_facts(resolved);
        }
    }

    let subtract: HashSet<&NodeName> = rule
        .nodes_by_type
        .subtract
        .iter()
        .filter(|n| running.contains_key(*n))
        .collect();
    for fact in assigned_rule_facts(rule, running) {
        let mentions_subtract = [&fact.0, &fact.1, &fact.2].into_iter().any(|n| subtract.contains(n));
        let translated = translate_fact(&fact, running);
        if mentions_subtract && !added_facts.contains(&translated) {
            store.remove_fact(&translated);
        }
    }

    for node in &rule.nodes_by_type.subtract {
        if let Some(resolved) = running.get(node) {
            if store.facts_about_node(resolved).is_empty() {
                store.remove_node(resolved);
            }
        }
    }
}

/// Rule facts none of whose rule-nodes remain unassigned.
fn assigned_rule_facts<'a>(
    rule: &'a crate::rule::CompiledRule,
    running: &HashMap<NodeName, NodeName>,
) -> impl Iterator<Item = Fact> + 'a {
    let assigned_rule_nodes: HashSet<NodeName> = running.keys().cloned().collect();
    rule.facts.iter().cloned().filter(move |fact| {
        [&fact.0, &fact.1, &fact.2]
            .into_iter()
            .filter(|n| rule.all_nodes.contains(*n))
            .all(|n| assigned_rule_nodes.contains(n))
    })
}
