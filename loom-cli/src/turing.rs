//! Builds the single-transition Turing-machine scenario against the Store
//! API directly (no text format, no parser — rules are reflected into the
//! store as facts, grounded in `turing_machine.py`'s `TransitionRule`).
//!
//! The rule-building here is hand-written against `loom_core::rule::compiler`'s
//! actual (M, N, K) role contract rather than porting `ts_utils.py`'s generic
//! `RegisterRule` path-substring macro: a CLI demo harness has no need for a
//! general-purpose rule-building DSL, just one concrete rule.

use loom_core::{FactStore, NodeName, Runtime};

const RULE: &str = "/RULE";
const MUST_MAP: &str = "/MUST_MAP";
const TRY_MAP: &str = "/TRY_MAP";
const SUBTRACT: &str = "/SUBTRACT";
const INSERT: &str = "/INSERT";
const EQUAL: &str = "/=";

/// Builds a store with one transition rule `(A, read=2) -> (B, write=1, move=R)`
/// and a single marked cell holding `2`, then wraps it in a [`Runtime`].
pub fn build() -> Runtime {
    let store = FactStore::new();

    // Prototypes.
    let state_a = store.node("/:State:A");
    let state_b = store.node("/:State:B");
    let symbol_1 = store.node("/:Symbol:1");
    let symbol_2 = store.node("/:Symbol:2");
    let mark = store.node("/:Mark");
    let next_right = store.node("/:NextPair:Right");

    // The machine's current-state pointer and the initial marked cell.
    let mstate = store.node("/:MState");
    store.add_fact((mstate.clone(), store.node("/:CurrentState"), state_a.clone()));
    let origin = store.node("/:OriginSymbol");
    store.add_fact((origin.clone(), store.node("/:MSymbolType"), symbol_2.clone()));
    store.add_fact((origin.clone(), store.node("/:MSymbolMark"), mark.clone()));

    register_transition_rule(
        &store,
        "/:Transition0A",
        &state_a,
        &symbol_2,
        &symbol_1,
        &state_b,
        &next_right,
        &mark,
    );

    Runtime::new(store)
}

/// Reflects a transition rule `(state, read_symbol) -> (statep, write_symbol)`,
/// moving right, into `store` (spec.md §4.3, grounded in
/// `turing_machine.py::TransitionRule` direction `"R"`).
#[allow(clippy::too_many_arguments)]
fn register_transition_rule(
    store: &FactStore,
    prefix: &str,
    state: &NodeName,
    read_symbol: &NodeName,
    write_symbol: &NodeName,
    statep: &NodeName,
    next_right: &NodeName,
    mark: &NodeName,
) {
    let rule = store.node(&format!("{prefix}:RuleId"));
    let anchor = store.node(&format!("{prefix}:RuleMap"));
    store.add_fact((anchor.clone(), rule.clone(), store.node(RULE)));

    let declare = |node: &NodeName, role: &str| store.add_fact((anchor.clone(), node.clone(), store.node(role)));
    let equal_group = |store: &FactStore, name: &str, members: &[&NodeName]| {
        let eq_anchor = store.node(&format!("{prefix}:{name}"));
        store.add_fact((eq_anchor.clone(), rule.clone(), store.node(RULE)));
        for member in members {
            store.add_fact((eq_anchor.clone(), (*member).clone(), store.node(EQUAL)));
        }
    };

    // The current cell: must already hold `read_symbol` and be marked.
    let cell = store.node(&format!("{prefix}:MustMap:Cell"));
    declare(&cell, MUST_MAP);
    declare(&cell, SUBTRACT);
    store.add_fact((cell.clone(), store.node("/:MSymbolType"), read_symbol.clone()));
    store.add_fact((cell.clone(), store.node("/:MSymbolMark"), mark.clone()));

    // The machine's state pointer: must currently point at `state`.
    let state_ptr = store.node(&format!("{prefix}:MustMap:State"));
    declare(&state_ptr, MUST_MAP);
    declare(&state_ptr, SUBTRACT);
    store.add_fact((state_ptr.clone(), store.node("/:CurrentState"), state.clone()));

    // The cell to the right: try to find it; insert it if it doesn't exist.
    let next_cell = store.node(&format!("{prefix}:TryMap:NextCell"));
    declare(&next_cell, TRY_MAP);
    declare(&next_cell, INSERT);

    let cell_as_pair_left = store.node(&format!("{prefix}:TryMap:PairLeft"));
    declare(&cell_as_pair_left, TRY_MAP);
    declare(&cell_as_pair_left, INSERT);
    store.add_fact((cell_as_pair_left.clone(), next_right.clone(), next_cell.clone()));

    // Writes: new symbol on the same cell, new state on the pointer, the
    // mark moved to the cell on the right.
    let cell_write = store.node(&format!("{prefix}:Insert:CellWrite"));
    declare(&cell_write, INSERT);
    store.add_fact((cell_write.clone(), store.node("/:MSymbolType"), write_symbol.clone()));

    let state_write = store.node(&format!("{prefix}:Insert:StateWrite"));
    declare(&state_write, INSERT);
    store.add_fact((state_write.clone(), store.node("/:CurrentState"), statep.clone()));

    let mark_write = store.node(&format!("{prefix}:Insert:MarkWrite"));
    declare(&mark_write, INSERT);
    store.add_fact((mark_write.clone(), store.node("/:MSymbolMark"), mark.clone()));

    equal_group(store, "EqCell", &[&cell, &cell_as_pair_left, &cell_write]);
    equal_group(store, "EqState", &[&state_ptr, &state_write]);
    equal_group(store, "EqNextCell", &[&next_cell, &mark_write]);
}

/// Walks the tape starting from `origin` via `/:NextPair:Right` links,
/// returning each cell's current symbol (or `None` if unassigned).
pub fn read_tape(store: &FactStore, origin: &NodeName) -> Vec<(NodeName, Option<NodeName>)> {
    let next_pair_right = store.node("/:NextPair:Right");
    let msymbol_type = store.node("/:MSymbolType");

    let mut cells = vec![origin.clone()];
    loop {
        let current = cells.last().unwrap().clone();
        let next = store
            .lookup(Some(&current), Some(&next_pair_right), None)
            .into_iter()
            .next()
            .map(|fact| fact.2);
        match next {
            Some(n) => cells.push(n),
            None => break,
        }
    }
    cells
        .into_iter()
        .map(|cell| {
            let symbol = store
                .lookup(Some(&cell), Some(&msymbol_type), None)
                .into_iter()
                .next()
                .map(|fact| fact.2);
            (cell, symbol)
        })
        .collect()
}

/// The node currently bearing `/:MSymbolMark`, if any.
pub fn marked_cell(store: &FactStore) -> Option<NodeName> {
    let msymbol_mark = store.node("/:MSymbolMark");
    store
        .lookup(None, Some(&msymbol_mark), None)
        .into_iter()
        .next()
        .map(|fact| fact.0)
}

/// The node the current-state fact maps to.
pub fn current_state(store: &FactStore) -> Option<NodeName> {
    let current_state = store.node("/:CurrentState");
    store
        .lookup(None, Some(&current_state), None)
        .into_iter()
        .next()
        .map(|fact| fact.2)
}
