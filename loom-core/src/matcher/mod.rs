//! Incremental and one-shot matching of compiled rules against a fact
//! store (spec.md §4.4).

pub mod one_off;
pub mod persistent;
pub mod unify;

use crate::rule::types::CompiledRule;

/// An assignment discovered for some rule: a map from the rule's declared
/// node names to the nodes satisfying them.
#[derive(Debug, Clone)]
pub struct RuleAssignment {
    pub rule: std::sync::Arc<CompiledRule>,
    pub assignment: std::collections::HashMap<crate::facts::NodeName, crate::facts::NodeName>,
}

/// Something that can enumerate (and, for the persistent variant,
/// incrementally refresh) assignments to a compiled rule.
pub trait Matcher {
    /// Refreshes internal state against the current fact store. A no-op
    /// for matchers that are always up to date.
    fn sync(&mut self, store: &crate::facts::FactStore);

    /// The assignments known as of the last `sync()`.
    fn assignments(&self, store: &crate::facts::FactStore) -> Vec<RuleAssignment>;
}

pub use one_off::OneOffMatcher;
pub use persistent::PersistentMatcher;
