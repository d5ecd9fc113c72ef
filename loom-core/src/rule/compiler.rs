//! Discovering and compiling `/RULE` nodes (spec.md §4.3).
//!
//! A rule's shape is reflected directly into the fact store: some node `M`
//! is anchored to a rule via `(M, rule_node, "/RULE")`, and `M`'s own facts
//! `(M, N, K)` declare `N`'s role `K` (one of `/MUST_MAP`, `/TRY_MAP`,
//! `/NO_MAP[i]`, `/REMOVE`, `/SUBTRACT`, `/INSERT`), plus `(M, X, "/=")` /
//! `(M, X, "/MAYBE=")` declaring variables forced- or maybe-equal.

use std::collections::{HashMap, HashSet};

use crate::facts::{Fact, FactStore, NodeName};
use crate::pattern::{solve, Assignment, Constraint, Pattern, Slot, Var};
use crate::rule::types::{CompiledRule, NodesByType};

const MUST_MAP: &str = "/MUST_MAP";
const TRY_MAP: &str = "/TRY_MAP";
const NO_MAP: &str = "/NO_MAP";
const REMOVE: &str = "/REMOVE";
const SUBTRACT: &str = "/SUBTRACT";
const INSERT: &str = "/INSERT";
const RULE_MARKER: &str = "/RULE";
const EQUAL_MARKER: &str = "/=";
const MAYBE_EQUAL_MARKER: &str = "/MAYBE=";

fn role_of(key: &str) -> Option<&'static str> {
    [MUST_MAP, TRY_MAP, NO_MAP, REMOVE, SUBTRACT, INSERT]
        .into_iter()
        .find(|role| key.starts_with(role))
}

fn no_map_index(key: &str) -> usize {
    key.strip_prefix(NO_MAP)
        .map(|rest| rest.trim_matches('_'))
        .filter(|rest| !rest.is_empty())
        .and_then(|rest| rest.parse().ok())
        .unwrap_or(0)
}

struct Discovered {
    all_nodes: HashSet<NodeName>,
    map_nodes: Vec<NodeName>,
    nodes_by_type: NodesByType,
    equal: HashMap<NodeName, HashSet<NodeName>>,
    maybe_equal: HashMap<NodeName, HashSet<NodeName>>,
}

fn discover(store: &FactStore, rule_node: &NodeName) -> Discovered {
    let mut all_nodes = HashSet::from([rule_node.clone()]);
    let mut map_nodes = Vec::new();
    let mut nodes_by_type = NodesByType::default();

    let role_pattern = Pattern::new(
        vec![
            anchor(rule_node),
            (Slot::Variable(Var(0)), Slot::Variable(Var(1)), Slot::Variable(Var(2))),
        ],
        HashMap::new(),
    );
    let mut assignments = solve(store, &role_pattern, &Assignment::new());
    assignments.sort_by(|a, b| order_key(a).cmp(&order_key(b)));
    for assignment in assignments {
        let m = assignment[&Var(0)].clone();
        let value = assignment[&Var(1)].clone();
        let key = assignment[&Var(2)].clone();
        all_nodes.insert(m);

        let Some(role) = role_of(&key) else { continue };
        if role == NO_MAP {
            let index = no_map_index(&key);
            if nodes_by_type.no_map.len() <= index {
                nodes_by_type.no_map.resize(index + 1, Vec::new());
            }
            nodes_by_type.no_map[index].push(value.clone());
        } else {
            debug_assert_eq!(role, key.as_ref());
            match role {
                MUST_MAP => nodes_by_type.must_map.push(value.clone()),
                TRY_MAP => nodes_by_type.try_map.push(value.clone()),
                REMOVE => nodes_by_type.remove.push(value.clone()),
                SUBTRACT => nodes_by_type.subtract.push(value.clone()),
                INSERT => nodes_by_type.insert.push(value.clone()),
                _ => unreachable!(),
            }
        }
        if role == MUST_MAP || role == TRY_MAP || role == NO_MAP {
            map_nodes.push(value.clone());
        }
        all_nodes.insert(value);
    }

    let equal = discover_relation(store, rule_node, EQUAL_MARKER);
    let maybe_equal = discover_relation(store, rule_node, MAYBE_EQUAL_MARKER);

    Discovered {
        all_nodes,
        map_nodes,
        nodes_by_type,
        equal,
        maybe_equal,
    }
}

fn anchor(rule_node: &NodeName) -> Constraint {
    (
        Slot::Variable(Var(0)),
        Slot::Constant(rule_node.clone()),
        Slot::Constant(const_node(RULE_MARKER)),
    )
}

fn const_node(s: &str) -> NodeName {
    std::sync::Arc::from(s)
}

fn order_key(assignment: &Assignment) -> (NodeName, NodeName, NodeName) {
    (
        assignment[&Var(0)].clone(),
        assignment[&Var(1)].clone(),
        assignment[&Var(2)].clone(),
    )
}

/// Finds pairs `(x, y)` declared equal (or maybe-equal) through some shared
/// anchor `M`: `(M, x, marker)` and `(M, y, marker)` for the same `M`.
fn discover_relation(
    store: &FactStore,
    rule_node: &NodeName,
    marker: &str,
) -> HashMap<NodeName, HashSet<NodeName>> {
    let pattern = Pattern::new(
        vec![
            anchor(rule_node),
            (
                Slot::Variable(Var(0)),
                Slot::Variable(Var(1)),
                Slot::Constant(const_node(marker)),
            ),
            (
                Slot::Variable(Var(0)),
                Slot::Variable(Var(2)),
                Slot::Constant(const_node(marker)),
            ),
        ],
        HashMap::new(),
    );
    let mut relation: HashMap<NodeName, HashSet<NodeName>> = HashMap::new();
    for assignment in solve(store, &pattern, &Assignment::new()) {
        let x = assignment[&Var(1)].clone();
        let y = assignment[&Var(2)].clone();
        relation.entry(x).or_default().insert(y);
    }
    relation
}

/// Compiles the rule anchored at `rule_node` into a [`CompiledRule`],
/// capturing a snapshot of its support facts so it stays usable after those
/// facts are scrubbed from the live store.
pub fn compile(store: &FactStore, rule_node: &NodeName) -> CompiledRule {
    let discovered = discover(store, rule_node);

    let mut sorted_nodes: Vec<NodeName> = discovered.all_nodes.iter().cloned().collect();
    sorted_nodes.sort();

    let mut node_to_variable: HashMap<NodeName, Var> = HashMap::new();
    let mut variable_to_node: HashMap<Var, NodeName> = HashMap::new();
    let mut maybe_equal_variables: HashMap<Var, HashSet<Var>> = HashMap::new();
    for node in &sorted_nodes {
        let mut variable = Var(node_to_variable.len() as u32);
        if let Some(equivalents) = discovered.equal.get(node) {
            for equivalent in equivalents {
                if let Some(existing) = node_to_variable.get(equivalent) {
                    variable = *existing;
                    break;
                }
            }
        }
        node_to_variable.insert(node.clone(), variable);
        variable_to_node.insert(variable, node.clone());
        maybe_equal_variables.entry(variable).or_insert_with(|| HashSet::from([variable]));
    }
    for (node, partners) in &discovered.maybe_equal {
        let key_var = node_to_variable[node];
        let partner_vars: HashSet<Var> = partners.iter().map(|p| node_to_variable[p]).collect();
        maybe_equal_variables.entry(key_var).or_default().extend(partner_vars);
    }

    let no_map_nodes: HashMap<NodeName, usize> = discovered
        .nodes_by_type
        .no_map
        .iter()
        .enumerate()
        .flat_map(|(index, nodes)| nodes.iter().map(move |n| (n.clone(), index)))
        .collect();

    let try_map_set: HashSet<&NodeName> = discovered.nodes_by_type.try_map.iter().collect();
    let insert_set: HashSet<&NodeName> = discovered.nodes_by_type.insert.iter().collect();

    let mut must_pattern = Pattern::new(Vec::new(), maybe_equal_variables.clone());
    let mut try_pattern = Pattern::new(Vec::new(), maybe_equal_variables.clone());
    let mut never_patterns: Vec<Pattern> = (0..discovered.nodes_by_type.no_map.len())
        .map(|_| Pattern::new(Vec::new(), maybe_equal_variables.clone()))
        .collect();

    let mut constrained: HashSet<NodeName> = HashSet::new();
    for node in &discovered.map_nodes {
        for fact in store.lookup(Some(node), None, None) {
            constrained.insert(fact.0.clone());
            constrained.insert(fact.1.clone());
            constrained.insert(fact.2.clone());

            let constraint = (
                to_slot(&node_to_variable, &fact.0),
                to_slot(&node_to_variable, &fact.1),
                to_slot(&node_to_variable, &fact.2),
            );

            if let Some(index) = [&fact.0, &fact.1, &fact.2]
                .into_iter()
                .find_map(|n| no_map_nodes.get(n))
            {
                never_patterns[*index].add_constraint(constraint);
            } else if [&fact.0, &fact.1, &fact.2].into_iter().any(|n| try_map_set.contains(n)) {
                try_pattern.add_constraint(constraint);
            } else if [&fact.0, &fact.1, &fact.2].into_iter().any(|n| insert_set.contains(n)) {
                // may try or fail to map against /INSERT nodes, never a must-map
            } else {
                must_pattern.add_constraint(constraint);
            }
        }
    }
    debug_assert!(discovered.map_nodes.iter().all(|n| constrained.contains(n)));

    let facts: Vec<Fact> = discovered
        .all_nodes
        .iter()
        .flat_map(|node| store.lookup(Some(node), None, None))
        .collect();
    let indexed_facts: HashMap<NodeName, Vec<Fact>> = discovered
        .all_nodes
        .iter()
        .map(|node| (node.clone(), store.lookup(Some(node), None, None)))
        .collect();

    CompiledRule {
        name: rule_node.clone(),
        all_nodes: discovered.all_nodes,
        map_nodes: discovered.map_nodes,
        nodes_by_type: discovered.nodes_by_type,
        equal: discovered.equal,
        maybe_equal: discovered.maybe_equal,
        node_to_variable,
        variable_to_node,
        must_pattern,
        try_pattern,
        never_patterns,
        facts,
        indexed_facts,
    }
}

fn to_slot(node_to_variable: &HashMap<NodeName, Var>, node: &NodeName) -> Slot {
    match node_to_variable.get(node) {
        Some(var) => Slot::Variable(*var),
        None => Slot::Constant(node.clone()),
    }
}

/// Discovers every `/RULE`-anchored rule in the store, compiles each one,
/// and then scrubs their declaration nodes from the store so rules never
/// accidentally map against each other's support facts (spec.md §4.3).
pub fn extract_rules(store: &FactStore) -> Vec<CompiledRule> {
    let rule_nodes: HashSet<NodeName> = store
        .lookup(None, None, Some(&const_node(RULE_MARKER)))
        .into_iter()
        .map(|fact| fact.1)
        .collect();
    let mut sorted_rule_nodes: Vec<NodeName> = rule_nodes.into_iter().collect();
    sorted_rule_nodes.sort();

    let rules: Vec<CompiledRule> = sorted_rule_nodes
        .iter()
        .map(|rule_node| compile(store, rule_node))
        .collect();

    let mut avoid_nodes: HashSet<NodeName> = HashSet::new();
    for rule in &rules {
        avoid_nodes.extend(rule.all_nodes.iter().cloned());
    }
    let mut sorted_avoid: Vec<NodeName> = avoid_nodes.into_iter().collect();
    sorted_avoid.sort();
    for node in sorted_avoid {
        store.remove_node_with_facts(&node);
    }
    for node in store.nodes() {
        if !node.starts_with("/:") {
            store.remove_node(&node);
        }
    }

    rules
}
