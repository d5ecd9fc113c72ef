//! Unifying a single constraint against a single fact (spec.md §4.4).
//!
//! This is the building block the persistent matcher uses to find, without
//! a full re-solve, which new partial assignments become possible when one
//! fact is added.

use std::collections::HashMap;

use crate::facts::{Fact, NodeName};
use crate::pattern::{Assignment, Constraint, Pattern, Slot, Var};

/// Extends `partial` with whatever `constraint` demands to match `fact`,
/// returning `None` if they are incompatible (a constant mismatches, an
/// already-bound variable mismatches, or two variables land on the same
/// node without `maybe_equal` permission).
pub fn unify(
    pattern: &Pattern,
    constraint: &Constraint,
    fact: &Fact,
    partial: &Assignment,
) -> Option<Assignment> {
    let mut assignment = partial.clone();
    let mut inverse: HashMap<NodeName, Vec<Var>> = HashMap::new();

    let pairs = [
        (&constraint.0, &fact.0),
        (&constraint.1, &fact.1),
        (&constraint.2, &fact.2),
    ];
    for (slot, arg) in pairs {
        match slot {
            Slot::Constant(expected) => {
                if expected != arg {
                    return None;
                }
            }
            Slot::Variable(var) => {
                if let Some(existing) = assignment.get(var) {
                    if existing != arg {
                        return None;
                    }
                } else {
                    let class = pattern.equivalence_class(*var);
                    if inverse
                        .get(arg)
                        .into_iter()
                        .flatten()
                        .any(|other| !class.contains(other))
                    {
                        return None;
                    }
                    assignment.insert(*var, arg.clone());
                    inverse.entry(arg.clone()).or_default().push(*var);
                }
            }
        }
    }
    Some(assignment)
}
