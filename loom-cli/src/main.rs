//! loom CLI — a demonstration harness exercising `loom-core`'s public API
//! end to end: build a store, register rules, propose, apply, print deltas.
//! Not a product surface — there is no saved file format and no server.

mod facts_demo;
mod turing;

use clap::{Parser, Subcommand};
use colored::*;

#[derive(Parser)]
#[command(name = "loom")]
#[command(about = "loom - a triplet-structure production-rule engine demo")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose (trace-level) logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a bundled demonstration
    Demo {
        #[command(subcommand)]
        scenario: Demo,
    },
}

#[derive(Subcommand)]
enum Demo {
    /// The single-transition Turing-machine scenario (spec.md §8 scenario 1)
    Turing,
    /// The fact-index and freeze-frame scenarios (spec.md §8 scenarios 2-3)
    Facts,
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt().with_env_filter("loom_core=trace,loom_cli=trace").init();
    } else {
        tracing_subscriber::fmt().with_env_filter("loom_core=info,loom_cli=info").init();
    }

    match cli.command {
        Commands::Demo { scenario } => match scenario {
            Demo::Turing => demo_turing(),
            Demo::Facts => facts_demo::run(),
        },
    }
}

fn demo_turing() {
    let runtime = turing::build();
    let store = runtime.store();

    println!("{} Rules compiled: {}", "→".blue(), runtime.rules().len());

    let origin = store.node("/:OriginSymbol");
    print_tape_state(store, &origin);

    let proposals = runtime.propose_all(None).expect("propose_all");
    assert_eq!(proposals.len(), 1, "expected exactly one proposal");
    let (_assignment, delta) = &proposals[0];

    println!("{} Taking one step...", "→".blue());
    store.apply(delta);

    print_tape_state(store, &origin);
}

fn print_tape_state(store: &loom_core::FactStore, origin: &loom_core::NodeName) {
    let state = turing::current_state(store);
    let marked = turing::marked_cell(store);
    let tape = turing::read_tape(store, origin);

    println!("\n{} Turing Machine State", "═".blue().bold());
    println!(
        "{} Current state: {}",
        "▸".blue(),
        state.as_deref().unwrap_or("<none>")
    );
    println!(
        "{} Marked cell: {}",
        "▸".blue(),
        marked.as_deref().unwrap_or("<none>")
    );
    print!("{} Tape: ", "▸".blue());
    for (cell, symbol) in &tape {
        let marker = if Some(cell) == marked.as_ref() { "*" } else { "" };
        println!(
            "\n    {}{} -> {}",
            cell,
            marker,
            symbol.as_deref().unwrap_or("X")
        );
    }
    println!();
}
