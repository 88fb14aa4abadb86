//! FILENAME: step-engine/src/step.rs
//! PURPOSE: The step model: one transform in a chain, its configuration,
//! and the links that place it among its neighbors and alternatives.
//! CONTEXT: A step is pure description. It holds what to do (the kind and
//! its settings) and where it sits (previous/next links plus a bench of
//! parked alternatives), but never any rows. Evaluation lives in
//! `evaluate`, editing in `chain`; everything here is cheap to clone and
//! serializes for persistence.

use engine::{AggregateField, Aggregation, Column, Expression, FlattenOptions, SortDirection};
use serde::{Deserialize, Serialize};

use crate::merge::MergeOutcome;
use crate::mutation::{MemoryTable, MutableData};

/// Identifies a step within its chain.
pub type StepId = u32;

/// Identifies a chain within a workspace.
pub type ChainId = u32;

// ============================================================================
// Step configurations
// ============================================================================

/// Settings for a sequence source: a pattern and how to draw from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceConfig {
    /// Pattern in the sequencer syntax, e.g. `"[A-C][0-9]{2}"`.
    pub pattern: String,
    /// Whether to walk the whole language or draw random members.
    pub mode: SequenceMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceMode {
    /// Every value the pattern denotes, in enumeration order.
    Enumerate,
    /// `count` values drawn uniformly per pattern node. A fixed seed
    /// replays the same draw.
    Random { count: u64, seed: Option<u64> },
}

impl SequenceConfig {
    pub fn enumerate(pattern: impl Into<String>) -> SequenceConfig {
        SequenceConfig {
            pattern: pattern.into(),
            mode: SequenceMode::Enumerate,
        }
    }

    pub fn random(pattern: impl Into<String>, count: u64, seed: Option<u64>) -> SequenceConfig {
        SequenceConfig {
            pattern: pattern.into(),
            mode: SequenceMode::Random { count, seed },
        }
    }
}

/// One sort criterion: a column addressed by name and a direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: Column,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn ascending(column: impl Into<Column>) -> SortKey {
        SortKey {
            column: column.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(column: impl Into<Column>) -> SortKey {
        SortKey {
            column: column.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Settings for a pivot: which columns key the output rows, which spawn
/// output columns, and what gets aggregated at each intersection. Columns
/// are addressed by name and resolved against the input when applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotConfig {
    pub row_fields: Vec<Column>,
    pub column_fields: Vec<Column>,
    pub values: Vec<PivotValue>,
}

/// One aggregated value column of a pivot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotValue {
    pub column: Column,
    pub aggregation: Aggregation,
}

/// Settings for a flatten: the columns repeated on every output row, the
/// columns unpivoted into name/value pairs, and the output shape options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlattenConfig {
    pub keys: Vec<Column>,
    pub values: Vec<Column>,
    pub options: FlattenOptions,
}

/// Settings for a join against another chain in the same workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinConfig {
    /// The chain whose head supplies the secondary table.
    pub chain: ChainId,
    /// Key column in this chain's input.
    pub left_key: Column,
    /// Key column in the secondary table.
    pub right_key: Column,
    pub kind: JoinKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    /// Keep only rows with at least one match.
    Inner,
    /// Keep every primary row; unmatched ones carry `Empty` on the right.
    Left,
}

impl JoinKind {
    pub fn label(&self) -> &'static str {
        match self {
            JoinKind::Inner => "inner",
            JoinKind::Left => "left",
        }
    }
}

// ============================================================================
// StepKind
// ============================================================================

/// Every transform a step can perform. Closed on purpose: evaluation,
/// merging and persistence all match exhaustively, so adding a kind is a
/// compile-guided change. The serde tags match `label()`, which is what
/// persistence records carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// An embedded editable table; the canonical mutable source.
    Literal(MemoryTable),
    /// A single-column table generated from a pattern.
    Sequence(SequenceConfig),
    /// Keeps rows whose predicate evaluates to true.
    Filter { predicate: Expression },
    /// Appends a derived column evaluated per row. Without an explicit
    /// name the expression's display form names the column.
    Calculate {
        name: Option<String>,
        expr: Expression,
    },
    /// Reorders rows by one or more keys, earlier keys dominating.
    Sort { keys: Vec<SortKey> },
    /// Keeps the first `count` rows.
    Limit { count: usize },
    /// Swaps rows and columns, treating the first column as a header.
    Transpose,
    /// Groups rows by expressions and reduces each group to one row.
    Aggregate {
        groups: Vec<Expression>,
        fields: Vec<AggregateField>,
    },
    /// Cross-tabulates row tuples against column tuples.
    Pivot(PivotConfig),
    /// Unpivots value columns into name/value rows.
    Flatten(FlattenConfig),
    /// Pairs rows with another chain's output on key equality.
    Join(JoinConfig),
    /// Keeps a uniformly drawn subset of rows.
    Sample { count: usize, seed: Option<u64> },
}

impl StepKind {
    /// Short lowercase name for log lines and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            StepKind::Literal(_) => "literal",
            StepKind::Sequence(_) => "sequence",
            StepKind::Filter { .. } => "filter",
            StepKind::Calculate { .. } => "calculate",
            StepKind::Sort { .. } => "sort",
            StepKind::Limit { .. } => "limit",
            StepKind::Transpose => "transpose",
            StepKind::Aggregate { .. } => "aggregate",
            StepKind::Pivot(_) => "pivot",
            StepKind::Flatten(_) => "flatten",
            StepKind::Join(_) => "join",
            StepKind::Sample { .. } => "sample",
        }
    }

    /// Whether this kind consumes upstream data. Sources stand on their
    /// own; everything else fails without a previous step.
    pub fn requires_previous(&self) -> bool {
        !matches!(self, StepKind::Literal(_) | StepKind::Sequence(_))
    }

    /// One human-readable line describing what the step does with its
    /// current settings.
    pub fn sentence(&self) -> String {
        match self {
            StepKind::Literal(table) => format!(
                "Start from a table of {} rows and {} columns",
                table.rows().len(),
                table.columns().len()
            ),
            StepKind::Sequence(config) => match config.mode {
                SequenceMode::Enumerate => {
                    format!("Generate every value matching \"{}\"", config.pattern)
                }
                SequenceMode::Random { count, .. } => format!(
                    "Generate {} random values matching \"{}\"",
                    count, config.pattern
                ),
            },
            StepKind::Filter { predicate } => format!("Keep rows where {predicate}"),
            StepKind::Calculate { name, expr } => match name {
                Some(name) => format!("Add a column \"{name}\" computed as {expr}"),
                None => format!("Add a column computed as {expr}"),
            },
            StepKind::Sort { keys } => {
                let parts: Vec<String> = keys
                    .iter()
                    .map(|key| {
                        let direction = match key.direction {
                            SortDirection::Ascending => "ascending",
                            SortDirection::Descending => "descending",
                        };
                        format!("{} {}", key.column, direction)
                    })
                    .collect();
                format!("Sort by {}", parts.join(", "))
            }
            StepKind::Limit { count } => {
                let noun = if *count == 1 { "row" } else { "rows" };
                format!("Keep the first {count} {noun}")
            }
            StepKind::Transpose => "Transpose rows and columns".to_string(),
            StepKind::Aggregate { groups, fields } => {
                let reductions: Vec<String> =
                    fields.iter().map(AggregateField::label).collect();
                if groups.is_empty() {
                    format!("Compute {} over all rows", reductions.join(", "))
                } else {
                    let grouping: Vec<String> =
                        groups.iter().map(|group| group.to_string()).collect();
                    format!(
                        "Group by {} and compute {}",
                        grouping.join(", "),
                        reductions.join(", ")
                    )
                }
            }
            StepKind::Pivot(config) => {
                let values: Vec<String> = config
                    .values
                    .iter()
                    .map(|value| format!("{} of {}", value.aggregation.label(), value.column))
                    .collect();
                let values = values.join(", ");
                let rows: Vec<String> =
                    config.row_fields.iter().map(Column::to_string).collect();
                let columns: Vec<String> =
                    config.column_fields.iter().map(Column::to_string).collect();
                match (rows.is_empty(), columns.is_empty()) {
                    (false, false) => format!(
                        "Pivot {values} for each {} against {}",
                        rows.join(", "),
                        columns.join(", ")
                    ),
                    (false, true) => format!("Pivot {values} for each {}", rows.join(", ")),
                    (true, false) => format!("Pivot {values} against {}", columns.join(", ")),
                    (true, true) => format!("Pivot {values}"),
                }
            }
            StepKind::Flatten(config) => {
                let values: Vec<String> =
                    config.values.iter().map(Column::to_string).collect();
                if config.keys.is_empty() {
                    format!("Flatten {} into name and value rows", values.join(", "))
                } else {
                    let keys: Vec<String> =
                        config.keys.iter().map(Column::to_string).collect();
                    format!(
                        "Flatten {} into name and value rows, keeping {}",
                        values.join(", "),
                        keys.join(", ")
                    )
                }
            }
            StepKind::Join(config) => format!(
                "Join chain {} where {} matches {} ({} join)",
                config.chain,
                config.left_key,
                config.right_key,
                config.kind.label()
            ),
            StepKind::Sample { count, seed } => match seed {
                Some(seed) => format!("Sample {count} random rows (seed {seed})"),
                None => format!("Sample {count} random rows"),
            },
        }
    }
}

// ============================================================================
// Step
// ============================================================================

/// One node of a chain. Links are managed exclusively by `Chain`'s editing
/// operations, which keep previous/next strictly mutual.
#[derive(Debug, Clone)]
pub struct Step {
    /// What the step does.
    pub kind: StepKind,
    pub(crate) previous: Option<StepId>,
    pub(crate) next: Option<StepId>,
    pub(crate) alternatives: Vec<StepId>,
}

impl Step {
    pub(crate) fn new(kind: StepKind) -> Step {
        Step {
            kind,
            previous: None,
            next: None,
            alternatives: Vec::new(),
        }
    }

    /// The step feeding this one, if any.
    pub fn previous(&self) -> Option<StepId> {
        self.previous
    }

    /// The step this one feeds, absent only at the head.
    pub fn next(&self) -> Option<StepId> {
        self.next
    }

    /// Parked alternatives that can be swapped in for this step.
    pub fn alternatives(&self) -> &[StepId] {
        &self.alternatives
    }

    /// One human-readable line describing the step.
    pub fn sentence(&self) -> String {
        self.kind.sentence()
    }

    /// How this step combines with the `prior` step directly upstream.
    pub fn merge_with(&self, prior: &Step) -> MergeOutcome {
        self.kind.merge_with(&prior.kind)
    }

    /// The step's writable store, for kinds that own their rows.
    pub fn mutable_data(&mut self) -> Option<&mut dyn MutableData> {
        match &mut self.kind {
            StepKind::Literal(table) => Some(table),
            _ => None,
        }
    }
}
