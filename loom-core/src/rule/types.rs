//! Compiled production rules (spec.md §4.3).

use std::collections::{HashMap, HashSet};

use crate::facts::{Fact, NodeName};
use crate::pattern::{solve, Assignment, Pattern, Var};

/// The `/MUST_MAP`, `/TRY_MAP`, `/NO_MAP[i]` node roles, grouped by how a
/// rule's mapping nodes were declared.
#[derive(Debug, Default, Clone)]
pub struct NodesByType {
    pub must_map: Vec<NodeName>,
    pub try_map: Vec<NodeName>,
    pub no_map: Vec<Vec<NodeName>>,
    pub remove: Vec<NodeName>,
    pub subtract: Vec<NodeName>,
    pub insert: Vec<NodeName>,
}

/// A production rule that has been discovered, compiled into
/// variable-indexed [`Pattern`]s, and whose support facts have been
/// snapshotted so it keeps working once its declaration nodes are scrubbed
/// from the store (spec.md §4.3).
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: NodeName,
    pub all_nodes: HashSet<NodeName>,
    pub map_nodes: Vec<NodeName>,
    pub nodes_by_type: NodesByType,
    pub equal: HashMap<NodeName, HashSet<NodeName>>,
    pub maybe_equal: HashMap<NodeName, HashSet<NodeName>>,
    pub node_to_variable: HashMap<NodeName, Var>,
    pub variable_to_node: HashMap<Var, NodeName>,
    pub must_pattern: Pattern,
    pub try_pattern: Pattern,
    pub never_patterns: Vec<Pattern>,
    /// Facts mentioning any rule node, captured at compile time (spec.md
    /// §4.3: "a snapshot of rule facts") so the executor can still see them
    /// after rule-support nodes are scrubbed from the live store.
    pub facts: Vec<Fact>,
    pub indexed_facts: HashMap<NodeName, Vec<Fact>>,
}

impl CompiledRule {
    /// True iff `assignment` (which must already satisfy `must_pattern`)
    /// would also let one of the rule's `/NO_MAP` groups map — making the
    /// assignment invalid.
    pub fn invalid(&self, assignment: &Assignment, facts_view: &crate::facts::FactStore) -> bool {
        self.never_patterns
            .iter()
            .any(|pattern| !solve(facts_view, pattern, assignment).is_empty())
    }

    /// Translates a variable-keyed assignment into the node names the rule
    /// declared for them. Every original node name sharing a variable (an
    /// `/=` equivalence group) gets its own entry bound to the same value —
    /// not just one canonical representative — so the executor can look any
    /// of them up directly.
    pub fn translate(&self, assignment: &Assignment) -> HashMap<NodeName, NodeName> {
        self.node_to_variable
            .iter()
            .filter_map(|(node, var)| assignment.get(var).map(|value| (node.clone(), value.clone())))
            .collect()
    }

    /// Translates a node-keyed partial assignment (naming the rule's own
    /// declared nodes) into the variable-keyed form the patterns expect,
    /// dropping any key the rule never declared.
    pub fn translate_partial(&self, partial: &HashMap<NodeName, NodeName>) -> Assignment {
        partial
            .iter()
            .filter_map(|(node, value)| {
                self.node_to_variable.get(node).map(|var| (*var, value.clone()))
            })
            .collect()
    }
}
