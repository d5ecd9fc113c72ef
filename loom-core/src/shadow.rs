//! The shadow observer interface
//!
//! A shadow is an optional observer receiving node/fact add/remove callbacks
//! in order; it is used to keep an accelerated index in lock-step with the
//! authoritative store. At most one shadow may be registered per store
//! (spec.md §3, §9).

use crate::facts::{Fact, NodeName};

/// Observer over the capability set `{add_node, remove_node, add_fact,
/// remove_fact}`. A reimplementation of an accelerated solver index (as the
/// original's C++ native-index shadow) can implement this trait and keep the
/// interface symmetric so alternate solvers can be swapped in (spec.md §9).
pub trait Shadow {
    /// Called after a node is added to the store.
    fn add_node(&mut self, name: &NodeName);
    /// Called after a node is removed from the store.
    fn remove_node(&mut self, name: &NodeName);
    /// Called after a fact is added to the store.
    fn add_fact(&mut self, fact: &Fact);
    /// Called after a fact is removed from the store.
    fn remove_fact(&mut self, fact: &Fact);
}
