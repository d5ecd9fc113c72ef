//! Walks through the fact-index and freeze-frame scenarios from spec.md §8
//! scenarios 2-3, printing the resulting deltas.

use colored::*;
use loom_core::FactStore;

pub fn run() {
    println!("{} Fact-index round-trip", "═".blue().bold());
    let store = FactStore::new();
    let a = store.node("A");
    let b = store.node("B");
    let c = store.node("C");
    let d = store.node("D");
    store.add_fact((a.clone(), b.clone(), c.clone()));
    store.add_fact((a.clone(), b.clone(), d.clone()));
    store.add_fact((a.clone(), c.clone(), c.clone()));
    println!("{} lookup(A,B,_) = {:?}", "▸".blue(), store.lookup(Some(&a), Some(&b), None));
    store.remove_fact(&(a.clone(), b.clone(), c.clone()));
    println!(
        "{} after removing (A,B,C): lookup(_,_,C) = {:?}",
        "▸".blue(),
        store.lookup(None, None, Some(&c))
    );
    store.commit(true);

    println!("\n{} Freeze-frame delta", "═".blue().bold());
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
    println!("{} beta - alpha = {:?}", "▸".blue(), delta);
}
