//! Benchmarks for pattern-solving and matching throughput.
//!
//! Tests the performance of the triplet store and solver including:
//! - Fact insertion and lookup
//! - Pattern solving (chain and hub shapes)
//! - Persistent matcher incremental sync

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::collections::HashMap;
use std::sync::Arc;

use loom_core::pattern::{solve, Assignment, Pattern, Slot, Var};
use loom_core::rule::types::{CompiledRule, NodesByType};
use loom_core::{FactStore, Matcher, NodeName, PersistentMatcher};

/// Builds a chain of `n` edges `e0 -> e1 -> ... -> en` as `(node_i, "next",
/// node_{i+1})` facts, good for stressing the backtracking search depth.
fn build_chain(store: &FactStore, n: usize) -> Vec<NodeName> {
    let next = store.node("next");
    let nodes: Vec<NodeName> = (0..=n).map(|i| store.node(&format!("n{i}"))).collect();
    for pair in nodes.windows(2) {
        store.add_fact((pair[0].clone(), next.clone(), pair[1].clone()));
    }
    store.commit(true);
    nodes
}

/// Builds a hub of `n` spokes `(hub, "has", spoke_i)`, good for stressing
/// index fan-out on a single subject.
fn build_hub(store: &FactStore, n: usize) -> NodeName {
    let has = store.node("has");
    let hub = store.node("hub");
    for i in 0..n {
        let spoke = store.node(&format!("spoke{i}"));
        store.add_fact((hub.clone(), has.clone(), spoke));
    }
    store.commit(true);
    hub
}

fn two_hop_pattern() -> Pattern {
    let (x, y, z) = (Var(0), Var(1), Var(2));
    Pattern::new(
        vec![
            (Slot::Variable(x), Slot::Variable(y), Slot::Variable(z)),
            (Slot::Variable(z), Slot::Variable(y), Slot::Variable(Var(3))),
        ],
        HashMap::new(),
    )
}

fn bench_fact_insertion(c: &mut Criterion) {
    let mut group = c.benchmark_group("store/fact_insertion");
    for size in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let store = FactStore::new();
                build_chain(&store, size);
                black_box(&store);
            });
        });
    }
    group.finish();
}

fn bench_fact_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("store/fact_lookup");
    for size in [100, 1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let store = FactStore::new();
            let hub = build_hub(&store, size);
            let has = store.node("has");
            b.iter(|| {
                let results = store.lookup(Some(&hub), Some(&has), None);
                black_box(results.len())
            });
        });
    }
    group.finish();
}

fn bench_chain_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("solver/chain");
    for size in [10, 50, 100, 500].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let store = FactStore::new();
            build_chain(&store, size);
            let pattern = two_hop_pattern();
            b.iter(|| {
                let results = solve(&store, &pattern, &Assignment::new());
                black_box(results.len())
            });
        });
    }
    group.finish();
}

/// A minimal single-constraint rule `(X, "has", Y)`, used to measure
/// matcher overhead in isolation from rule compilation.
fn single_edge_rule() -> CompiledRule {
    let x = Var(0);
    let y = Var(1);
    let has = NodeName::from("/has");
    let node_x = NodeName::from("/:Rule:X");
    let node_y = NodeName::from("/:Rule:Y");

    let mut node_to_variable = HashMap::new();
    node_to_variable.insert(node_x.clone(), x);
    node_to_variable.insert(node_y.clone(), y);
    let mut variable_to_node = HashMap::new();
    variable_to_node.insert(x, node_x.clone());
    variable_to_node.insert(y, node_y.clone());

    let must_pattern = Pattern::new(
        vec![(Slot::Variable(x), Slot::Constant(has), Slot::Variable(y))],
        HashMap::new(),
    );

    CompiledRule {
        name: NodeName::from("/:Rule"),
        all_nodes: [node_x.clone(), node_y.clone()].into_iter().collect(),
        map_nodes: vec![node_x, node_y],
        nodes_by_type: NodesByType::default(),
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

fn bench_persistent_matcher_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("matcher/persistent_sync");
    for batch_size in [1, 10, 50, 100].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), batch_size, |b, &batch_size| {
            let store = FactStore::new();
            let hub = build_hub(&store, 100);
            let has = store.node("has");
            let rule = Arc::new(single_edge_rule());
            let mut matcher = PersistentMatcher::new(&store, rule, &HashMap::new());
            matcher.sync(&store);

            b.iter(|| {
                for i in 0..batch_size {
                    let spoke = store.node(&format!("extra{i}"));
                    store.add_fact((hub.clone(), has.clone(), spoke));
                }
                store.commit(true);
                matcher.sync(&store);
                black_box(matcher.assignments(&store).len())
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_fact_insertion,
    bench_fact_lookup,
    bench_chain_solve,
    bench_persistent_matcher_sync
);
criterion_main!(benches);
