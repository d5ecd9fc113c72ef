//! Prefix-based scopes over a [`FactStore`]
//!
//! A scope narrows node creation to a prefix (`node("X")` inside the scope
//! resolves to `<prefix>X`) and, while active, shadows
//! [`FactStore::node`]'s relative-name resolution. A *protected* scope
//! additionally marks the nodes created under it as exempt from bulk
//! removal by callers outside the scope (spec.md §4.1).
//!
//! A `Scope` pushes its prefix onto the store's scope stack when entered
//! and pops it on drop, so nested scopes compose with ordinary control
//! flow (`{ let _s = store.scope("/a/", false); ... }`).

use crate::facts::{FactStore, NodeName};

/// A handle to an active, prefix-scoped view of a [`FactStore`].
pub struct Scope<'a> {
    store: &'a FactStore,
    prefix: String,
    protected: bool,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(store: &'a FactStore, prefix: String, protected: bool) -> Self {
        store.push_scope(prefix.clone());
        Scope {
            store,
            prefix,
            protected,
        }
    }

    /// The scope's full prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// True iff this scope is protected.
    pub fn protected(&self) -> bool {
        self.protected
    }

    /// Resolves `name` to its full name under this scope without creating
    /// the node.
    pub fn scoped_name(&self, name: &str) -> String {
        if name.starts_with('/') {
            name.to_string()
        } else {
            format!("{}{}", self.prefix, name)
        }
    }

    /// Creates (or looks up) a node relative to this scope.
    pub fn node(&self, name: &str) -> NodeName {
        self.store.node(&self.scoped_name(name))
    }

    /// True iff `name`, resolved relative to this scope, is a registered
    /// node.
    pub fn contains(&self, name: &str) -> bool {
        self.store.has_node(&self.scoped_name(name))
    }

    /// All nodes currently registered under this scope's prefix.
    pub fn iter(&self) -> Vec<NodeName> {
        self.store.nodes_with_prefix(&self.prefix)
    }

    /// Count of nodes currently registered under this scope's prefix.
    pub fn len(&self) -> usize {
        self.iter().len()
    }

    /// True iff no nodes are registered under this scope's prefix.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Opens a nested scope relative to this one.
    pub fn sub_scope(&self, name: &str, protect: bool) -> Scope<'_> {
        Scope::new(self.store, self.scoped_name(name), protect)
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        self.store.pop_scope();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_scopes_resolve_relative_names_and_unwind_on_drop() {
        let store = FactStore::new();
        {
            let outer = store.scope("/outer/", false);
            let a = outer.node("A");
            assert_eq!(a.as_ref(), "/outer/A");
            {
                let inner = outer.sub_scope("inner/", false);
                let b = inner.node("B");
                assert_eq!(b.as_ref(), "/outer/inner/B");
            }
            assert!(outer.contains("A"));
        }
        // root scope restored; relative lookups resolve against "/"
        let c = store.node("C");
        assert_eq!(c.as_ref(), "/C");
    }

    #[test]
    fn absolute_names_bypass_the_current_scope() {
        let store = FactStore::new();
        let scope = store.scope("/a/", false);
        let node = scope.node("/b/C");
        assert_eq!(node.as_ref(), "/b/C");
    }

    #[test]
    fn scope_iter_counts_only_its_own_prefix() {
        let store = FactStore::new();
        let scope = store.scope("/a/", false);
        scope.node("X");
        scope.node("Y");
        store.node("/b/Z");
        assert_eq!(scope.len(), 2);
    }
}
