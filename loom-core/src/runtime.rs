//! The runtime façade tying fact store, rule compiler, matchers, and
//! executor together (spec.md §6).

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::delta::Delta;
use crate::error::{LoomError, Result};
use crate::executor;
use crate::facts::{FactStore, NodeName};
use crate::matcher::{Matcher, OneOffMatcher};
use crate::rule::{self, CompiledRule};

/// Owns a fact store and the rules compiled out of it, and offers the
/// `propose`/`propose_all` entry points a caller drives a rule-based system
/// through (spec.md §6).
pub struct Runtime {
    store: FactStore,
    rules: Vec<Arc<CompiledRule>>,
    rules_by_name: HashMap<NodeName, Arc<CompiledRule>>,
}

impl Runtime {
    /// Commits any pending changes, discovers and compiles every `/RULE`
    /// in `store` (scrubbing their declaration nodes as a side effect), and
    /// commits again.
    pub fn new(store: FactStore) -> Self {
        store.commit(false);
        let compiled = rule::extract_rules(&store);
        store.commit(false);

        let rules: Vec<Arc<CompiledRule>> = compiled.into_iter().map(Arc::new).collect();
        let rules_by_name = rules.iter().map(|r| (r.name.clone(), r.clone())).collect();
        debug!(n_rules = rules.len(), "extracted rules");

        Runtime {
            store,
            rules,
            rules_by_name,
        }
    }

    /// The fact store this runtime owns.
    pub fn store(&self) -> &FactStore {
        &self.store
    }

    /// Every compiled rule, in discovery order.
    pub fn rules(&self) -> &[Arc<CompiledRule>] {
        &self.rules
    }

    /// The compiled rule named `name`.
    pub fn get_rule(&self, name: &str) -> Result<Arc<CompiledRule>> {
        self.rules_by_name
            .get(name)
            .cloned()
            .ok_or_else(|| LoomError::UnknownRule(name.to_string()))
    }

    /// Previews every assignment `matcher` finds: applies it, commits,
    /// records the resulting delta if it's non-empty, then always rolls
    /// back — the store ends this call exactly as it started.
    pub fn matcher_propose<M: Matcher + ?Sized>(
        &self,
        matcher: &mut M,
    ) -> Vec<(HashMap<NodeName, NodeName>, Delta)> {
        assert!(self.store.is_clean(), "matcher_propose requires a clean buffer");

        let mut proposals = Vec::new();
        for assignment in matcher.assignments(&self.store) {
            let running = executor::apply(&self.store, &assignment);
            let delta = self
                .store
                .commit(true)
                .expect("commit_if_clean=true always returns a delta");
            if !delta.is_empty() {
                proposals.push((running, delta));
            }
            self.store.rollback(-1);
        }
        proposals
    }

    /// Proposes every match of `rule`, optionally constrained by `partial`
    /// (a node-keyed partial assignment).
    pub fn propose(
        &self,
        rule: &str,
        partial: Option<&HashMap<NodeName, NodeName>>,
    ) -> Result<Vec<(HashMap<NodeName, NodeName>, Delta)>> {
        let rule = self.get_rule(rule)?;
        let empty = HashMap::new();
        let mut matcher = OneOffMatcher::new(rule, partial.unwrap_or(&empty));
        Ok(self.matcher_propose(&mut matcher))
    }

    /// Proposes matches for every named rule (or every rule, if `rules` is
    /// `None`), in order.
    pub fn propose_all(
        &self,
        rules: Option<&[String]>,
    ) -> Result<Vec<(HashMap<NodeName, NodeName>, Delta)>> {
        let names: Vec<String> = match rules {
            Some(names) => names.to_vec(),
            None => self.rules.iter().map(|r| r.name.to_string()).collect(),
        };
        let mut all = Vec::new();
        for name in names {
            all.extend(self.propose(&name, None)?);
        }
        Ok(all)
    }
}
