//! FILENAME: step-engine/src/lib.rs
//! PURPOSE: Main library entry point for the step and chain model.
//! CONTEXT: A chain is an editable line of steps; a workspace holds the
//! chains and evaluates them lazily under example or full budgets. This
//! crate owns the step kinds and their configs, chain editing (insert,
//! remove, move, alternatives), the merge advisor, the join graph check,
//! the lazy stream adapters, in-memory tables with the mutation protocol,
//! and the calculator that restarts per-chain preview work.

pub mod calculator;
pub mod chain;
pub mod evaluate;
pub mod graph;
pub mod merge;
pub mod mutation;
pub mod step;
pub mod streams;
pub mod workspace;

// Re-export commonly used types at the crate root
pub use calculator::Calculator;
pub use chain::Chain;
pub use evaluate::ExampleBudget;
pub use graph::verify_no_cycles;
pub use merge::MergeOutcome;
pub use mutation::{MemoryTable, MutableData, Mutation};
pub use step::{
    ChainId, FlattenConfig, JoinConfig, JoinKind, PivotConfig, PivotValue, SequenceConfig,
    SequenceMode, SortKey, Step, StepId, StepKind,
};
pub use streams::{CalculateStream, FilterStream, JoinStream, LimitStream};
pub use workspace::Workspace;
