//! Constraint patterns: the existential queries matched against a
//! [`FactStore`](crate::facts::FactStore) (spec.md §4.2).

use std::collections::{HashMap, HashSet};

use crate::facts::NodeName;

/// A pattern variable. Distinct variables are allowed (not required) to be
/// assigned the same node — see [`Pattern::maybe_equal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Var(pub u32);

/// One argument position in a constraint: either a free variable or a node
/// name fixed as a constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    Variable(Var),
    Constant(NodeName),
}

impl Slot {
    pub fn as_var(&self) -> Option<Var> {
        match self {
            Slot::Variable(v) => Some(*v),
            Slot::Constant(_) => None,
        }
    }
}

/// One triplet constraint: `(subject, predicate, object)`, each a [`Slot`].
pub type Constraint = (Slot, Slot, Slot);

/// A satisfying assignment: a mapping from variable to node.
pub type Assignment = HashMap<Var, NodeName>;

/// A conjunction of triplet constraints over a shared set of variables.
///
/// `maybe_equal` records, for each variable, the set of variables (including
/// itself) it is permitted to coincide with in an assignment — coincidence
/// with anything outside that set makes the assignment invalid (spec.md
/// §4.2 `maybe_equal`).
#[derive(Debug, Clone)]
pub struct Pattern {
    pub constraints: Vec<Constraint>,
    pub maybe_equal: HashMap<Var, HashSet<Var>>,
}

impl Pattern {
    /// An empty pattern, satisfied trivially by any (or no) assignment.
    pub fn empty() -> Self {
        Pattern {
            constraints: Vec::new(),
            maybe_equal: HashMap::new(),
        }
    }

    /// Creates a pattern from `constraints` with the given `maybe_equal`
    /// table.
    pub fn new(constraints: Vec<Constraint>, maybe_equal: HashMap<Var, HashSet<Var>>) -> Self {
        Pattern {
            constraints,
            maybe_equal,
        }
    }

    /// Appends one more constraint to the pattern.
    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// The set of distinct variables appearing anywhere in the pattern.
    pub fn variables(&self) -> HashSet<Var> {
        let mut vars = HashSet::new();
        for (s, p, o) in &self.constraints {
            for slot in [s, p, o] {
                if let Slot::Variable(v) = slot {
                    vars.insert(*v);
                }
            }
        }
        vars
    }

    /// The equivalence class permitted for `member`: the set of variables it
    /// may coincide with, defaulting to `{member}` alone.
    pub fn equivalence_class(&self, member: Var) -> HashSet<Var> {
        self.maybe_equal
            .get(&member)
            .cloned()
            .unwrap_or_else(|| HashSet::from([member]))
    }

    /// True iff no two variables assigned the same node fall outside one
    /// another's equivalence class.
    pub fn valid_maybe_equals(&self, assignment: &Assignment) -> bool {
        let mut preimages: HashMap<&NodeName, HashSet<Var>> = HashMap::new();
        for (var, node) in assignment {
            preimages.entry(node).or_default().insert(*var);
        }
        for variables in preimages.values() {
            let representative = *variables.iter().next().expect("non-empty group");
            let class = self.equivalence_class(representative);
            if !variables.is_subset(&class) {
                return false;
            }
        }
        true
    }
}
