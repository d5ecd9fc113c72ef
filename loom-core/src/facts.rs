//! The fact store: nodes, triplets, the multi-key index, and the
//! commit/rollback machinery that sits underneath scopes, deltas, and
//! freeze-frames (spec.md §3, §4.1).
//!
//! All mutation goes through `&self` methods backed by a single
//! [`RefCell`]: the store is explicitly single-threaded and exclusively
//! owned by its runtime (spec.md §5), so there is no need for the
//! lock-free/epoch-based machinery a concurrent store would require — a
//! plain `RefCell` is the idiomatic single-owner analogue.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tracing::trace;

use crate::delta::{Delta, FreezeFrame};
use crate::pattern::solver::OrderCacheKey;
use crate::pattern::Var;
use crate::recording::Recording;
use crate::scope::Scope;
use crate::shadow::Shadow;

/// An opaque node name. Cheap to clone (reference-counted), total-ordered by
/// string comparison (spec.md §4.1 Determinism).
pub type NodeName = Arc<str>;

/// An ordered triplet of node names.
pub type Fact = (NodeName, NodeName, NodeName);

/// One of the eight hole-patterns over a triplet, or a single participating
/// node — together these are the eleven index keys every stored fact must
/// appear under exactly (spec.md §3 Index).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IndexKey {
    Template(Option<NodeName>, Option<NodeName>, Option<NodeName>),
    Node(NodeName),
}

struct Inner {
    nodes: Vec<NodeName>,
    node_set: HashSet<NodeName>,
    display_names: HashMap<NodeName, String>,
    index: HashMap<IndexKey, Vec<Fact>>,
    fact_set: HashSet<Fact>,
    scope_stack: Vec<String>,
    path: Vec<Option<Delta>>,
    buffer: Delta,
    shadow: Option<Box<dyn Shadow>>,
    /// Memoized variable search orders for patterns solved against this
    /// store, keyed on `(constraints, maybe_equal)` — scoped per-store since
    /// a pattern's constant resolution is store-specific (spec.md §4.2).
    pattern_order_cache: HashMap<OrderCacheKey, Vec<Var>>,
}

impl Inner {
    fn new() -> Self {
        Inner {
            nodes: Vec::new(),
            node_set: HashSet::new(),
            display_names: HashMap::new(),
            index: HashMap::new(),
            fact_set: HashSet::new(),
            scope_stack: vec!["/".to_string()],
            path: vec![None],
            buffer: Delta::empty(),
            shadow: None,
            pattern_order_cache: HashMap::new(),
        }
    }

    fn current_scope(&self) -> &str {
        self.scope_stack.last().expect("scope stack is never empty")
    }

    fn full_name(&self, name: &str) -> String {
        if name.starts_with('/') {
            name.to_string()
        } else {
            format!("{}{}", self.current_scope(), name)
        }
    }
}

/// Every key under which a fact must be indexed: the 8 hole-patterns plus
/// one entry per distinct participating node (spec.md §3 Index).
fn subfact_keys(fact: &Fact) -> Vec<IndexKey> {
    let (a, b, c) = fact;
    let mut keys = Vec::with_capacity(11);
    for mask in 0u8..8 {
        let s = if mask & 0b001 != 0 { Some(a.clone()) } else { None };
        let p = if mask & 0b010 != 0 { Some(b.clone()) } else { None };
        let o = if mask & 0b100 != 0 { Some(c.clone()) } else { None };
        keys.push(IndexKey::Template(s, p, o));
    }
    let mut distinct: BTreeSet<NodeName> = BTreeSet::new();
    distinct.insert(a.clone());
    distinct.insert(b.clone());
    distinct.insert(c.clone());
    for node in distinct {
        keys.push(IndexKey::Node(node));
    }
    keys
}

/// The fact store. See the module docs and spec.md §4.1 for the contract.
pub struct FactStore {
    inner: RefCell<Inner>,
}

impl FactStore {
    /// Creates a new, empty fact store.
    pub fn new() -> Self {
        FactStore {
            inner: RefCell::new(Inner::new()),
        }
    }

    /// Registers `shadow` as the store's single observer. Replaces any
    /// previously-registered shadow.
    pub fn set_shadow(&self, shadow: Box<dyn Shadow>) {
        self.inner.borrow_mut().shadow = Some(shadow);
    }

    /// True iff `name` is a registered node.
    pub fn has_node(&self, name: &str) -> bool {
        self.inner.borrow().node_set.contains(name)
    }

    /// Creates the node named `name` (relative to the current scope) if
    /// absent, and returns its full name. A trailing `:??` is replaced by
    /// the smallest non-negative integer producing a fresh name (spec.md
    /// §4.1).
    pub fn node(&self, name: &str) -> NodeName {
        let full_name = self.resolve_gensym(name);
        self.add_node(&full_name);
        Arc::from(full_name.as_str())
    }

    /// Resolves `name` to its full name under the current scope, expanding
    /// a trailing `:??` gensym, without creating the node.
    pub(crate) fn resolve_gensym(&self, name: &str) -> String {
        let full_name = self.inner.borrow().full_name(name);
        if let Some(stem) = full_name.strip_suffix(":??") {
            for i in 0.. {
                let candidate = format!("{stem}:{i}");
                if !self.inner.borrow().node_set.contains(candidate.as_str()) {
                    return candidate;
                }
            }
            unreachable!("gensym search is unbounded")
        } else {
            full_name
        }
    }

    /// Low-level: adds `full_name` as a node if not already present.
    pub fn add_node(&self, full_name: &str) {
        let already_present = self.inner.borrow().node_set.contains(full_name);
        if already_present {
            return;
        }
        let name: NodeName = Arc::from(full_name);
        trace!(node = full_name, "add_node");
        {
            let mut inner = self.inner.borrow_mut();
            inner.nodes.push(name.clone());
            inner.node_set.insert(name.clone());
            inner.display_names.insert(name.clone(), full_name.to_string());
            inner.buffer.record_add_node(name.clone());
        }
        if let Some(shadow) = self.inner.borrow_mut().shadow.as_mut() {
            shadow.add_node(&name);
        }
    }

    /// Low-level: removes `full_name`. Fails (debug-asserts) if the node
    /// still participates in any fact — a precondition violation per
    /// spec.md §7.
    pub fn remove_node(&self, full_name: &str) {
        let still_has_facts = !self.facts_about_node(full_name).is_empty();
        assert!(
            !still_has_facts,
            "remove facts using {full_name} before removing it"
        );
        let present = self.inner.borrow().node_set.contains(full_name);
        if !present {
            return;
        }
        let name: NodeName = Arc::from(full_name);
        trace!(node = full_name, "remove_node");
        {
            let mut inner = self.inner.borrow_mut();
            inner.nodes.retain(|n| n.as_ref() != full_name);
            inner.node_set.remove(full_name);
            inner.display_names.remove(full_name);
            inner.buffer.record_remove_node(name.clone());
        }
        if let Some(shadow) = self.inner.borrow_mut().shadow.as_mut() {
            shadow.remove_node(&name);
        }
    }

    /// Adds multiple nodes (helper; see spec.md §9 open question on
    /// `display_name` customization not being exposed here).
    pub fn add_nodes<I: IntoIterator<Item = NodeName>>(&self, names: I) {
        for name in names {
            self.add_node(&name);
        }
    }

    /// Removes multiple nodes.
    pub fn remove_nodes<I: IntoIterator<Item = NodeName>>(&self, names: I) {
        for name in names {
            self.remove_node(&name);
        }
    }

    /// Adds `fact`. Precondition: all three nodes already exist. Idempotent:
    /// adding an existing fact is a silent no-op (spec.md §4.1, §7).
    pub fn add_fact(&self, fact: Fact) {
        if self.fact_exists(&fact) {
            return;
        }
        assert!(
            self.has_node(&fact.0) && self.has_node(&fact.1) && self.has_node(&fact.2),
            "add all nodes in {fact:?} before adding the fact"
        );
        trace!(s = %fact.0, p = %fact.1, o = %fact.2, "add_fact");
        {
            let mut inner = self.inner.borrow_mut();
            for key in subfact_keys(&fact) {
                inner.index.entry(key).or_default().push(fact.clone());
            }
            inner.fact_set.insert(fact.clone());
            inner.buffer.record_add_fact(fact.clone());
        }
        if let Some(shadow) = self.inner.borrow_mut().shadow.as_mut() {
            shadow.add_fact(&fact);
        }
    }

    /// Removes `fact`. Idempotent: removing an absent fact is a silent
    /// no-op.
    pub fn remove_fact(&self, fact: &Fact) {
        if !self.fact_exists(fact) {
            return;
        }
        trace!(s = %fact.0, p = %fact.1, o = %fact.2, "remove_fact");
        {
            let mut inner = self.inner.borrow_mut();
            for key in subfact_keys(fact) {
                if let Some(list) = inner.index.get_mut(&key) {
                    list.retain(|f| f != fact);
                }
            }
            inner.fact_set.remove(fact);
            inner.buffer.record_remove_fact(fact.clone());
        }
        if let Some(shadow) = self.inner.borrow_mut().shadow.as_mut() {
            shadow.remove_fact(fact);
        }
    }

    /// Adds multiple facts, in order.
    pub fn add_facts<I: IntoIterator<Item = Fact>>(&self, facts: I) {
        for fact in facts {
            self.add_fact(fact);
        }
    }

    /// Removes multiple facts, in order.
    pub fn remove_facts<I: IntoIterator<Item = Fact>>(&self, facts: I) {
        for fact in facts {
            self.remove_fact(&fact);
        }
    }

    fn fact_exists(&self, fact: &Fact) -> bool {
        self.inner.borrow().fact_set.contains(fact)
    }

    /// Returns all facts matching the template, in insertion order. `None`
    /// in a slot matches any node name.
    pub fn lookup(
        &self,
        s: Option<&NodeName>,
        p: Option<&NodeName>,
        o: Option<&NodeName>,
    ) -> Vec<Fact> {
        let key = IndexKey::Template(s.cloned(), p.cloned(), o.cloned());
        self.inner
            .borrow()
            .index
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns all facts mentioning `name` in any slot, in insertion order.
    pub fn facts_about_node(&self, name: &str) -> Vec<Fact> {
        self.inner
            .borrow()
            .index
            .get(&IndexKey::Node(Arc::from(name)))
            .cloned()
            .unwrap_or_default()
    }

    /// Removes `name` and every fact that mentions it.
    pub fn remove_node_with_facts(&self, name: &str) {
        let facts = self.facts_about_node(name);
        self.remove_facts(facts);
        self.remove_node(name);
    }

    /// All currently-registered node names, in insertion order.
    pub fn nodes(&self) -> Vec<NodeName> {
        self.inner.borrow().nodes.clone()
    }

    /// The display name of `name` (defaults to the full name).
    pub fn display_name(&self, name: &str) -> String {
        self.inner
            .borrow()
            .display_names
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Sets the display name of `name`.
    pub fn set_display_name(&self, name: &str, display: impl Into<String>) {
        self.inner
            .borrow_mut()
            .display_names
            .insert(Arc::from(name), display.into());
    }

    /// Returns a [`Scope`] for `prefix` (resolved relative to the current
    /// scope unless it starts with `/`).
    pub fn scope(&self, prefix: &str, protect: bool) -> Scope<'_> {
        let full_prefix = self.inner.borrow().full_name(prefix);
        Scope::new(self, full_prefix, protect)
    }

    pub(crate) fn push_scope(&self, prefix: String) {
        self.inner.borrow_mut().scope_stack.push(prefix);
    }

    pub(crate) fn pop_scope(&self) {
        let mut inner = self.inner.borrow_mut();
        assert!(
            inner.scope_stack.len() > 1,
            "scope stack underflow: unbalanced enter/exit"
        );
        inner.scope_stack.pop();
    }

    pub(crate) fn nodes_with_prefix(&self, prefix: &str) -> Vec<NodeName> {
        self.inner
            .borrow()
            .nodes
            .iter()
            .filter(|n| n.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// True iff the uncommitted buffer is empty.
    pub fn is_clean(&self) -> bool {
        self.inner.borrow().buffer.is_empty()
    }

    /// Appends the buffer to the path and starts a fresh buffer. Returns
    /// the committed delta, or `None` if the buffer was empty and
    /// `commit_if_clean` is false.
    pub fn commit(&self, commit_if_clean: bool) -> Option<Delta> {
        let mut inner = self.inner.borrow_mut();
        if inner.buffer.is_empty() && !commit_if_clean {
            return None;
        }
        let committed = std::mem::replace(&mut inner.buffer, Delta::empty());
        inner.path.push(Some(committed.clone()));
        trace!(path_len = inner.path.len(), "commit");
        Some(committed)
    }

    /// Rewinds the buffer, then pops deltas from the path until its length
    /// equals `to_time` (or `path.len() + to_time` if negative), applying
    /// each popped delta's inverse (spec.md §3).
    pub fn rollback(&self, to_time: i64) {
        self.rollback_buffer();
        if to_time == 0 {
            return;
        }
        let current_len = self.inner.borrow().path.len() as i64;
        let target_length = if to_time >= 0 { to_time } else { current_len + to_time };
        assert!(
            current_len >= target_length && target_length > 0,
            "rollback target {target_length} out of range for path length {current_len}"
        );
        loop {
            let len = self.inner.borrow().path.len() as i64;
            if len <= target_length {
                break;
            }
            let popped = self.inner.borrow_mut().path.pop().flatten();
            if let Some(delta) = popped {
                self.apply_delta(&delta.inverse());
            }
        }
        self.force_clean();
    }

    fn rollback_buffer(&self) {
        let old_buffer = std::mem::replace(&mut self.inner.borrow_mut().buffer, Delta::empty());
        self.apply_delta(&old_buffer.inverse());
        self.force_clean();
    }

    /// Applies a delta's node/fact additions and removals directly,
    /// bypassing the buffer bookkeeping (used by rollback).
    fn apply_delta(&self, delta: &Delta) {
        let mut add_nodes: Vec<_> = delta.add_nodes().iter().cloned().collect();
        add_nodes.sort();
        self.add_nodes(add_nodes);
        let mut add_facts: Vec<_> = delta.add_facts().iter().cloned().collect();
        add_facts.sort();
        self.add_facts(add_facts);
        let mut remove_facts: Vec<_> = delta.remove_facts().iter().cloned().collect();
        remove_facts.sort();
        self.remove_facts(remove_facts);
        let mut remove_nodes: Vec<_> = delta.remove_nodes().iter().cloned().collect();
        remove_nodes.sort();
        self.remove_nodes(remove_nodes);
    }

    fn force_clean(&self) {
        self.inner.borrow_mut().buffer = Delta::empty();
    }

    /// Re-applies a delta previously produced by [`Runtime::matcher_propose`]
    /// and commits it as a new path entry — how a caller turns a preview
    /// into a real step (spec.md §6).
    pub fn apply(&self, delta: &Delta) {
        assert!(self.is_clean(), "apply requires a clean buffer");
        self.apply_delta(delta);
        self.commit(true);
    }

    /// Starts a new [`Recording`] capturing the current path length.
    pub fn start_recording(&self) -> Recording<'_> {
        assert!(self.is_clean(), "start_recording requires a clean buffer");
        Recording::new(self)
    }

    pub(crate) fn path_len(&self) -> usize {
        self.inner.borrow().path.len()
    }

    pub(crate) fn path_slice(&self, from: usize) -> Vec<Delta> {
        self.inner.borrow().path[from..]
            .iter()
            .filter_map(|d| d.clone())
            .collect()
    }

    /// Looks up a memoized variable search order for `key`, if this store has
    /// solved an equivalent pattern before.
    pub(crate) fn cached_order(&self, key: &OrderCacheKey) -> Option<Vec<Var>> {
        self.inner.borrow().pattern_order_cache.get(key).cloned()
    }

    /// Memoizes `order` as the variable search order for `key`.
    pub(crate) fn cache_order(&self, key: OrderCacheKey, order: Vec<Var>) {
        self.inner.borrow_mut().pattern_order_cache.insert(key, order);
    }

    /// Returns an immutable snapshot of the store's current node and fact
    /// sets.
    ///
    /// The node set is the nodes participating in a current fact, not every
    /// node ever created — a node that was only ever part of a now-removed
    /// fact is not "in" the frame, even though it remains registered with
    /// the store (spec.md §8 scenario 3: removing a fact's last reference to
    /// a node drops that node from the frame, while a node kept alive by
    /// another fact stays).
    pub fn freeze_frame(&self) -> FreezeFrame {
        let inner = self.inner.borrow();
        let facts: BTreeSet<Fact> = inner
            .index
            .get(&IndexKey::Template(None, None, None))
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .collect();
        let nodes: BTreeSet<NodeName> = facts
            .iter()
            .flat_map(|(s, p, o)| [s.clone(), p.clone(), o.clone()])
            .collect();
        FreezeFrame::new(nodes, facts)
    }
}

impl Default for FactStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A handle bound to a store and a full node name; the main entry point for
/// adding facts in bulk (spec.md §6: "a node method that adds `(self, k,
/// v)` for every `(k, v)` pair, sorted").
pub struct NodeHandle<'a> {
    store: &'a FactStore,
    name: NodeName,
}

impl<'a> NodeHandle<'a> {
    /// Creates a handle for `name` in `store`, creating the node if absent.
    pub fn new(store: &'a FactStore, name: &str) -> Self {
        let full = store.node(name);
        NodeHandle { store, name: full }
    }

    /// The node's full name.
    pub fn full_name(&self) -> &NodeName {
        &self.name
    }

    /// Adds `(self, value, key)` for every `(value, key)` pair, sorted
    /// before insertion for determinism. Returns the sorted facts added.
    pub fn map(&self, mappings: &[(NodeName, NodeName)]) -> Vec<Fact> {
        let mut facts: Vec<Fact> = mappings
            .iter()
            .map(|(value, key)| (self.name.clone(), value.clone(), key.clone()))
            .collect();
        facts.sort();
        self.store.add_facts(facts.clone());
        facts
    }

    /// Removes this node and every fact mentioning it.
    pub fn remove_with_facts(&self) {
        self.store.remove_node_with_facts(&self.name);
    }

    /// Removes this node. Precondition: it has no remaining facts.
    pub fn remove(&self) {
        self.store.remove_node(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(store: &FactStore, name: &str) -> NodeName {
        store.node(name)
    }

    #[test]
    fn fact_index_round_trip_matches_scenario_2() {
        let store = FactStore::new();
        let (a, b, c, d) = (n(&store, "A"), n(&store, "B"), n(&store, "C"), n(&store, "D"));
        store.add_fact((a.clone(), b.clone(), c.clone()));
        store.add_fact((a.clone(), b.clone(), d.clone()));
        store.add_fact((a.clone(), c.clone(), c.clone()));

        let lookup_ab = store.lookup(Some(&a), Some(&b), None);
        assert_eq!(
            lookup_ab,
            vec![(a.clone(), b.clone(), c.clone()), (a.clone(), b.clone(), d.clone())]
        );

        store.remove_fact(&(a.clone(), b.clone(), c.clone()));
        let lookup_c = store.lookup(None, None, Some(&c));
        assert_eq!(lookup_c, vec![(a.clone(), c.clone(), c.clone())]);
    }

    #[test]
    fn add_then_remove_same_fact_is_a_no_op() {
        let store = FactStore::new();
        let (a, b, c) = (n(&store, "A"), n(&store, "B"), n(&store, "C"));
        let before = store.freeze_frame();
        store.add_fact((a.clone(), b.clone(), c.clone()));
        store.remove_fact(&(a, b, c));
        let after = store.freeze_frame();
        assert_eq!(before, after);
    }

    #[test]
    fn commit_then_rollback_to_prior_commit_is_a_no_op() {
        let store = FactStore::new();
        let before = store.freeze_frame();
        let a = n(&store, "A");
        let b = n(&store, "B");
        let c = n(&store, "C");
        store.add_fact((a, b, c));
        store.commit(true);
        assert_ne!(before, store.freeze_frame());
        store.rollback(1);
        assert_eq!(before, store.freeze_frame());
    }

    #[test]
    fn gensym_picks_smallest_free_suffix() {
        let store = FactStore::new();
        let first = store.node("/:X:??");
        let second = store.node("/:X:??");
        assert_eq!(first.as_ref(), "/:X:0");
        assert_eq!(second.as_ref(), "/:X:1");
    }

    #[test]
    #[should_panic(expected = "remove facts using")]
    fn remove_node_with_live_facts_is_a_precondition_violation() {
        let store = FactStore::new();
        let a = n(&store, "A");
        let b = n(&store, "B");
        let c = n(&store, "C");
        store.add_fact((a.clone(), b, c));
        store.remove_node(&a);
    }

    #[test]
    fn node_handle_map_adds_sorted_facts() {
        let store = FactStore::new();
        let handle = NodeHandle::new(&store, "/:Node");
        let v1 = n(&store, "/:V1");
        let k1 = n(&store, "/:K1");
        let v2 = n(&store, "/:V2");
        let k2 = n(&store, "/:K2");
        let facts = handle.map(&[(v2.clone(), k2.clone()), (v1.clone(), k1.clone())]);
        assert_eq!(
            facts,
            vec![
                (handle.full_name().clone(), v1, k1),
                (handle.full_name().clone(), v2, k2),
            ]
        );
    }
}
