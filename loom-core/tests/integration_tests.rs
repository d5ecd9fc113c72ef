//! End-to-end scenarios exercising the public API together: store, solver,
//! rule compiler, matchers, and the `Runtime` façade.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use loom_core::pattern::{solve, Assignment};
use loom_core::rule::CompiledRule;
use loom_core::{FactStore, Matcher, NodeName, Pattern, PersistentMatcher, Runtime, Slot, Var};

fn n(s: &str) -> NodeName {
    NodeName::from(s)
}

/// Builds the single-transition Turing-machine rule `(A, read=2) -> (B,
/// write=1, move=R)` over a marked origin cell holding `2`.
fn build_turing_runtime() -> (Runtime, NodeName) {
    let store = FactStore::new();

    let state_a = store.node("/:State:A");
    let state_b = store.node("/:State:B");
    let symbol_1 = store.node("/:Symbol:1");
    let symbol_2 = store.node("/:Symbol:2");
    let mark = store.node("/:Mark");
    let next_right = store.node("/:NextPair:Right");

    let mstate = store.node("/:MState");
    store.add_fact((mstate, store.node("/:CurrentState"), state_a.clone()));
    let origin = store.node("/:OriginSymbol");
    store.add_fact((origin.clone(), store.node("/:MSymbolType"), symbol_2.clone()));
    store.add_fact((origin.clone(), store.node("/:MSymbolMark"), mark.clone()));

    let rule = store.node("/:Transition0A:RuleId");
    let anchor = store.node("/:Transition0A:RuleMap");
    store.add_fact((anchor.clone(), rule.clone(), store.node("/RULE")));
    let declare = |node: &NodeName, role: &str| store.add_fact((anchor.clone(), node.clone(), store.node(role)));
    let equal_group = |name: &str, members: &[&NodeName]| {
        let eq_anchor = store.node(&format!("/:Transition0A:{name}"));
        store.add_fact((eq_anchor.clone(), rule.clone(), store.node("/RULE")));
        for member in members {
            store.add_fact((eq_anchor.clone(), (*member).clone(), store.node("/=")));
        }
    };

    let cell = store.node("/:Transition0A:MustMap:Cell");
    declare(&cell, "/MUST_MAP");
    declare(&cell, "/SUBTRACT");
    store.add_fact((cell.clone(), store.node("/:MSymbolType"), symbol_2));
    store.add_fact((cell.clone(), store.node("/:MSymbolMark"), mark.clone()));

    let state_ptr = store.node("/:Transition0A:MustMap:State");
    declare(&state_ptr, "/MUST_MAP");
    declare(&state_ptr, "/SUBTRACT");
    store.add_fact((state_ptr.clone(), store.node("/:CurrentState"), state_a));

    let next_cell = store.node("/:Transition0A:TryMap:NextCell");
    declare(&next_cell, "/TRY_MAP");
    declare(&next_cell, "/INSERT");

    let cell_as_pair_left = store.node("/:Transition0A:TryMap:PairLeft");
    declare(&cell_as_pair_left, "/TRY_MAP");
    declare(&cell_as_pair_left, "/INSERT");
    store.add_fact((cell_as_pair_left.clone(), next_right, next_cell.clone()));

    let cell_write = store.node("/:Transition0A:Insert:CellWrite");
    declare(&cell_write, "/INSERT");
    store.add_fact((cell_write.clone(), store.node("/:MSymbolType"), symbol_1));

    let state_write = store.node("/:Transition0A:Insert:StateWrite");
    declare(&state_write, "/INSERT");
    store.add_fact((state_write.clone(), store.node("/:CurrentState"), state_b));

    let mark_write = store.node("/:Transition0A:Insert:MarkWrite");
    declare(&mark_write, "/INSERT");
    store.add_fact((mark_write.clone(), store.node("/:MSymbolMark"), mark));

    equal_group("EqCell", &[&cell, &cell_as_pair_left, &cell_write]);
    equal_group("EqState", &[&state_ptr, &state_write]);
    equal_group("EqNextCell", &[&next_cell, &mark_write]);

    (Runtime::new(store), origin)
}

#[test]
fn scenario_1_turing_step_moves_the_mark_and_writes_the_new_state() {
    let (runtime, origin) = build_turing_runtime();
    let store = runtime.store();

    let proposals = runtime.propose_all(None).expect("propose_all");
    assert_eq!(proposals.len(), 1, "exactly one transition should fire");
    let (_assignment, delta) = &proposals[0];
    store.apply(delta);

    let msymbol_type = store.node("/:MSymbolType");
    let msymbol_mark = store.node("/:MSymbolMark");
    let current_state = store.node("/:CurrentState");
    let next_right = store.node("/:NextPair:Right");
    let symbol_1 = store.node("/:Symbol:1");
    let state_b = store.node("/:State:B");

    let head_symbol = store.lookup(Some(&origin), Some(&msymbol_type), None);
    assert_eq!(head_symbol.len(), 1);
    assert_eq!(head_symbol[0].2, symbol_1);

    let next_cell = store
        .lookup(Some(&origin), Some(&next_right), None)
        .into_iter()
        .next()
        .map(|f| f.2)
        .expect("a cell was created to the right");

    let mark_location = store.lookup(None, Some(&msymbol_mark), None);
    assert_eq!(mark_location.len(), 1, "exactly one cell is marked");
    assert_eq!(mark_location[0].0, next_cell, "the mark moved to the new cell");
    assert!(
        store.lookup(Some(&origin), Some(&msymbol_mark), None).is_empty(),
        "the origin cell is no longer marked"
    );

    let state = store.lookup(None, Some(&current_state), None);
    assert_eq!(state.len(), 1);
    assert_eq!(state[0].2, state_b);
}

#[test]
fn scenario_2_fact_index_round_trip() {
    let store = FactStore::new();
    let a = store.node("A");
    let b = store.node("B");
    let c = store.node("C");
    let d = store.node("D");

    store.add_fact((a.clone(), b.clone(), c.clone()));
    store.add_fact((a.clone(), b.clone(), d.clone()));
    store.add_fact((a.clone(), c.clone(), c.clone()));
    store.commit(true);

    let mut by_ab = store.lookup(Some(&a), Some(&b), None);
    by_ab.sort();
    assert_eq!(by_ab, vec![(a.clone(), b.clone(), c.clone()), (a.clone(), b.clone(), d.clone())]);

    store.remove_fact(&(a.clone(), b.clone(), c.clone()));
    store.commit(true);

    assert_eq!(store.lookup(None, None, Some(&c)), vec![(a, c.clone(), c)]);
}

#[test]
fn scenario_3_freeze_frame_delta_reconstructs_the_transition() {
    let store = FactStore::new();
    let a = store.node("A");
    let b = store.node("B");
    let c = store.node("C");
    let d = store.node("D");
    let e = store.node("E");

    store.add_fact((a.clone(), b.clone(), c.clone()));
    store.commit(true);
    let alpha = store.freeze_frame();

    store.add_fact((d.clone(), e.clone(), b.clone()));
    store.remove_fact(&(a.clone(), b.clone(), c.clone()));
    store.commit(true);
    let beta = store.freeze_frame();

    let delta = &beta - &alpha;
    assert_eq!(delta.add_facts(), &std::collections::BTreeSet::from([(d.clone(), e.clone(), b.clone())]));
    assert_eq!(delta.remove_facts(), &std::collections::BTreeSet::from([(a.clone(), b.clone(), c.clone())]));
    assert_eq!(delta.add_nodes(), &std::collections::BTreeSet::from([d, e]));
    // A and C both drop out of the frame: removing (A,B,C) was their only
    // remaining fact. B stays in the frame because (D,E,B) keeps it live.
    assert_eq!(delta.remove_nodes(), &std::collections::BTreeSet::from([a, c]));
}

#[test]
fn scenario_4_solver_maybe_equal_finds_exactly_one_assignment() {
    let store = FactStore::new();
    let a = store.node("A");
    let b = store.node("B");
    let c = store.node("C");
    let x = store.node("X");
    store.add_fact((a.clone(), b.clone(), c.clone()));
    store.add_fact((b.clone(), c.clone(), a.clone()));
    store.add_fact((b.clone(), c.clone(), x.clone()));
    store.commit(true);

    let (v0, v1, v2, v3, v5, v6, v7) = (Var(0), Var(1), Var(2), Var(3), Var(5), Var(6), Var(7));
    let mut maybe_equal = HashMap::new();
    maybe_equal.insert(v5, HashSet::from([v5, v1]));
    maybe_equal.insert(v1, HashSet::from([v5, v1]));
    maybe_equal.insert(v6, HashSet::from([v6, v0, v2]));
    maybe_equal.insert(v0, HashSet::from([v6, v0, v2]));
    maybe_equal.insert(v2, HashSet::from([v6, v0, v2]));

    let pattern = Pattern::new(
        vec![
            (Slot::Variable(v5), Slot::Constant(b.clone()), Slot::Variable(v6)),
            (Slot::Variable(v7), Slot::Variable(v0), Slot::Variable(v1)),
            (Slot::Variable(v7), Slot::Variable(v2), Slot::Variable(v3)),
        ],
        maybe_equal,
    );

    let results = solve(&store, &pattern, &Assignment::new());
    assert_eq!(results.len(), 1);
    let assignment = &results[0];
    assert_eq!(assignment[&v5], a.clone());
    assert_eq!(assignment[&v6], c.clone());
    assert_eq!(assignment[&v7], b);
    assert_eq!(assignment[&v0], c.clone());
    assert_eq!(assignment[&v1], a);
    assert_eq!(assignment[&v2], c);
    assert_eq!(assignment[&v3], x);
}

/// Builds a `CompiledRule` directly (bypassing `rule::compiler::compile`'s
/// store-reflection step) with a single must-constraint `(X, Y, /:P)`.
fn single_constraint_rule(p: NodeName) -> CompiledRule {
    let x = Var(0);
    let y = Var(1);
    let mut node_to_variable = HashMap::new();
    node_to_variable.insert(n("/:Rule:X"), x);
    node_to_variable.insert(n("/:Rule:Y"), y);
    let mut variable_to_node = HashMap::new();
    variable_to_node.insert(x, n("/:Rule:X"));
    variable_to_node.insert(y, n("/:Rule:Y"));

    let must_pattern = Pattern::new(vec![(Slot::Variable(x), Slot::Variable(y), Slot::Constant(p))], HashMap::new());

    CompiledRule {
        name: n("/:Rule"),
        all_nodes: HashSet::from([n("/:Rule:X"), n("/:Rule:Y")]),
        map_nodes: vec![n("/:Rule:X"), n("/:Rule:Y")],
        nodes_by_type: Default::default(),
        equal: HashMap::new(),
        maybe_equal: HashMap::new(),
        node_to_variable,
        variable_to_node,
        must_pattern,
        try_pattern: Pattern::empty(),
        never_patterns: Vec::new(),
        facts: Vec::new(),
        indexed_facts: HashMap::new(),
    }
}

#[test]
fn scenario_5_persistent_matcher_tracks_facts_incrementally() {
    let store = FactStore::new();
    let p = store.node("/:P");
    store.commit(true);

    let rule = Arc::new(single_constraint_rule(p.clone()));
    let mut matcher = PersistentMatcher::new(&store, rule, &HashMap::new());
    assert!(matcher.assignments(&store).is_empty());

    let n1 = store.node("N1");
    let n2 = store.node("N2");
    store.add_fact((n1.clone(), n2.clone(), p.clone()));
    store.commit(true);
    matcher.sync(&store);

    let assignments = matcher.assignments(&store);
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].assignment[&n("/:Rule:X")], n1);
    assert_eq!(assignments[0].assignment[&n("/:Rule:Y")], n2);

    store.remove_fact(&(n1, n2, p));
    store.commit(true);
    matcher.sync(&store);
    assert!(matcher.assignments(&store).is_empty());
}

#[test]
fn scenario_6_equivalence_collapse_unifies_the_declared_variable() {
    let store = FactStore::new();
    let rule_node = store.node("/:CollapseRule");
    let anchor = store.node("/:CollapseRule:Anchor");
    store.add_fact((anchor.clone(), rule_node.clone(), store.node("/RULE")));

    let node_a = store.node("/:CollapseRule:A");
    let node_b = store.node("/:CollapseRule:B");
    let p = store.node("/:P");
    store.add_fact((anchor.clone(), node_a.clone(), store.node("/MUST_MAP")));
    store.add_fact((anchor.clone(), node_b.clone(), store.node("/MUST_MAP")));
    store.add_fact((node_a.clone(), p, node_b.clone()));

    let eq_anchor = store.node("/:CollapseRule:Eq");
    store.add_fact((eq_anchor.clone(), rule_node.clone(), store.node("/RULE")));
    store.add_fact((eq_anchor.clone(), node_a.clone(), store.node("/=")));
    store.add_fact((eq_anchor, node_b.clone(), store.node("/=")));
    store.commit(true);

    let compiled = loom_core::rule::compiler::compile(&store, &rule_node);
    let var_a = compiled.node_to_variable[&node_a];
    let var_b = compiled.node_to_variable[&node_b];
    assert_eq!(var_a, var_b, "A and B were declared equal and must share one variable");

    assert_eq!(compiled.must_pattern.constraints.len(), 1);
    let (subject, _predicate, object) = &compiled.must_pattern.constraints[0];
    assert_eq!(subject.as_var(), Some(var_a));
    assert_eq!(object.as_var(), Some(var_a));
}
