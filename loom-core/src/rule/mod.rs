//! Rule discovery and compilation (spec.md §4.3).

pub mod compiler;
pub mod types;

pub use compiler::extract_rules;
pub use types::CompiledRule;
