//! FILENAME: step-engine/src/evaluate.rs
//! PURPOSE: Turns chains into data: the walk from a step back to its root
//! and the per-kind application of each transform along the way.
//! CONTEXT: Evaluation runs in one of two modes. Example mode bounds every
//! landing at `max_input_rows` and caps boundable outputs at
//! `max_output_rows`, trading completeness for latency; full mode reads
//! everything. Row-wise kinds stay lazy by wrapping the input stream,
//! whole-table kinds land their input first, and a join recurses into the
//! secondary chain under a child job. Cycle checking happens at the public
//! entry points in `workspace`, so the recursion here can trust the graph.

use std::future::Future;
use std::pin::Pin;

use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use engine::{aggregate, flatten, pivot, Column, PivotValueField, Raster, Row, Value};
use flow::{materialize, Data, DrainBudget, Fallible, FlowError, Job};
use sequencer::SequenceStream;

use crate::step::{ChainId, SequenceMode, StepId, StepKind};
use crate::streams::{CalculateStream, FilterStream, JoinStream, LimitStream};
use crate::workspace::Workspace;

// ============================================================================
// Budgets and modes
// ============================================================================

/// Row bounds for example evaluation. `max_input_rows` limits how many
/// rows any single landing reads; `max_output_rows` caps what boundable
/// steps (sources and limits) emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleBudget {
    pub max_input_rows: usize,
    pub max_output_rows: usize,
}

impl Default for ExampleBudget {
    fn default() -> Self {
        ExampleBudget {
            max_input_rows: 1000,
            max_output_rows: 100,
        }
    }
}

/// How far an evaluation is allowed to read.
#[derive(Debug, Clone, Copy)]
pub(crate) enum EvalMode {
    Example(ExampleBudget),
    Full,
}

impl EvalMode {
    /// The drain bound a whole-table transform lands its input under.
    fn input_budget(self) -> DrainBudget {
        match self {
            EvalMode::Example(budget) => DrainBudget::rows(budget.max_input_rows),
            EvalMode::Full => DrainBudget::unbounded(),
        }
    }

    /// The cap a boundable step puts on its own output, if any.
    fn output_cap(self) -> Option<usize> {
        match self {
            EvalMode::Example(budget) => Some(budget.max_output_rows),
            EvalMode::Full => None,
        }
    }
}

// ============================================================================
// Chain evaluation
// ============================================================================

/// The data a whole chain produces: its head step's output. Boxed because
/// join steps call back into this through `apply`, and the indirect
/// recursion needs one concrete future type in the cycle.
pub(crate) fn chain_data<'a>(
    workspace: &'a Workspace,
    id: ChainId,
    mode: EvalMode,
    job: &'a Job,
) -> Pin<Box<dyn Future<Output = Fallible<Data>> + Send + 'a>> {
    Box::pin(async move {
        let chain = workspace
            .chain(id)
            .ok_or(FlowError::UnknownChain(id))?;
        let head = chain
            .head()
            .ok_or_else(|| FlowError::missing_input(format!("chain {id} has no steps")))?;
        step_data(workspace, id, head, mode, job).await
    })
}

/// The data visible at one step of a chain: every step from the root up
/// to and including `step_id`, applied in order.
pub(crate) async fn step_data(
    workspace: &Workspace,
    chain_id: ChainId,
    step_id: StepId,
    mode: EvalMode,
    job: &Job,
) -> Fallible<Data> {
    let chain = workspace
        .chain(chain_id)
        .ok_or(FlowError::UnknownChain(chain_id))?;
    debug!("evaluating chain {chain_id} up to step {step_id}");

    let mut line = Vec::new();
    let mut cursor = Some(step_id);
    while let Some(id) = cursor {
        let step = chain.step(id).ok_or(FlowError::UnknownStep(id))?;
        line.push(id);
        cursor = step.previous();
    }
    line.reverse();

    let mut data: Option<Data> = None;
    for id in line {
        job.check()?;
        let step = chain.step(id).ok_or(FlowError::UnknownStep(id))?;
        trace!(
            "chain {chain_id}: applying step {id} ({})",
            step.kind.label()
        );
        data = Some(apply(workspace, &step.kind, data, mode, job).await?);
    }
    data.ok_or_else(|| FlowError::missing_input(format!("chain {chain_id} has no steps")))
}

/// Applies one step kind to its input. Sources ignore `input` entirely;
/// every other kind fails without one.
pub(crate) async fn apply(
    workspace: &Workspace,
    kind: &StepKind,
    input: Option<Data>,
    mode: EvalMode,
    job: &Job,
) -> Fallible<Data> {
    match kind {
        StepKind::Literal(table) => {
            let mut raster = table.to_raster();
            if let Some(cap) = mode.output_cap() {
                if raster.row_count() > cap {
                    raster = raster.limit(cap);
                    raster.mark_partial();
                }
            }
            Ok(Data::from_raster(raster))
        }

        StepKind::Sequence(config) => {
            // Generated sources stay lazy in both modes; the budget cuts
            // them at whatever landing finally pulls, which also tags the
            // result partial when the pattern had more to give.
            let stream = match config.mode {
                SequenceMode::Enumerate => SequenceStream::enumerate(&config.pattern)?,
                SequenceMode::Random { count, seed } => {
                    SequenceStream::random(&config.pattern, count, seed)?
                }
            };
            Ok(Data::from_stream(Box::new(stream)))
        }

        StepKind::Filter { predicate } => {
            let input = require(input, kind)?;
            Ok(Data::from_stream(Box::new(FilterStream::new(
                input.into_stream(),
                predicate.clone(),
            ))))
        }

        StepKind::Calculate { name, expr } => {
            let input = require(input, kind)?;
            Ok(Data::from_stream(Box::new(CalculateStream::new(
                input.into_stream(),
                name.clone(),
                expr.clone(),
            ))))
        }

        StepKind::Sort { keys } => {
            let input = require(input, kind)?;
            let raster = materialize(input, job, &mode.input_budget()).await?;
            let mut positions = Vec::with_capacity(keys.len());
            for key in keys {
                let position = raster.column_index(key.column.name()).ok_or_else(|| {
                    FlowError::missing_input(format!(
                        "sort key \"{}\" is not a column of the input",
                        key.column
                    ))
                })?;
                positions.push((position, key.direction));
            }
            Ok(Data::from_raster(raster.sorted_by(&positions)))
        }

        StepKind::Limit { count } => {
            let input = require(input, kind)?;
            let count = match mode.output_cap() {
                Some(cap) => (*count).min(cap),
                None => *count,
            };
            Ok(match input {
                Data::Raster(raster) => Data::from_raster(raster.limit(count)),
                Data::Stream(stream) => {
                    Data::from_stream(Box::new(LimitStream::new(stream, count)))
                }
            })
        }

        StepKind::Transpose => {
            let input = require(input, kind)?;
            let raster = materialize(input, job, &mode.input_budget()).await?;
            Ok(Data::from_raster(raster.transpose()))
        }

        StepKind::Aggregate { groups, fields } => {
            let input = require(input, kind)?;
            let raster = materialize(input, job, &mode.input_budget()).await?;
            Ok(Data::from_raster(aggregate(&raster, groups, fields)))
        }

        StepKind::Pivot(config) => {
            let input = require(input, kind)?;
            let raster = materialize(input, job, &mode.input_budget()).await?;
            let row_fields = resolve_columns(&raster, &config.row_fields, "pivot row field")?;
            let column_fields =
                resolve_columns(&raster, &config.column_fields, "pivot column field")?;
            let mut values = Vec::with_capacity(config.values.len());
            for value in &config.values {
                let column = raster.column_index(value.column.name()).ok_or_else(|| {
                    FlowError::missing_input(format!(
                        "pivot value \"{}\" is not a column of the input",
                        value.column
                    ))
                })?;
                values.push(PivotValueField {
                    column,
                    aggregation: value.aggregation,
                });
            }
            Ok(Data::from_raster(pivot(
                &raster,
                &row_fields,
                &column_fields,
                &values,
            )))
        }

        StepKind::Flatten(config) => {
            let input = require(input, kind)?;
            let raster = materialize(input, job, &mode.input_budget()).await?;
            let keys = resolve_columns(&raster, &config.keys, "flatten key")?;
            let values = resolve_columns(&raster, &config.values, "flatten value")?;
            Ok(Data::from_raster(flatten(
                &raster,
                &keys,
                &values,
                &config.options,
            )))
        }

        StepKind::Join(config) => {
            let input = require(input, kind)?;
            // The secondary chain runs under a child job: cancelling this
            // evaluation reaches into it, while its own end does not
            // disturb the primary side.
            let side = job.child();
            let right = chain_data(workspace, config.chain, mode, &side).await?;
            let right = materialize(right, &side, &mode.input_budget()).await?;
            let stream = JoinStream::new(
                input.into_stream(),
                right,
                config.left_key.clone(),
                &config.right_key,
                config.kind,
            )?;
            Ok(Data::from_stream(Box::new(stream)))
        }

        StepKind::Sample { count, seed } => {
            let input = require(input, kind)?;
            Ok(Data::from_raster(
                sample(input, *count, *seed, mode, job).await?,
            ))
        }
    }
}

fn require(input: Option<Data>, kind: &StepKind) -> Fallible<Data> {
    input.ok_or_else(|| {
        FlowError::missing_input(format!(
            "the {} step needs a previous step to act on",
            kind.label()
        ))
    })
}

fn resolve_columns(raster: &Raster, columns: &[Column], role: &str) -> Fallible<Vec<usize>> {
    let mut positions = Vec::with_capacity(columns.len());
    for column in columns {
        let position = raster.column_index(column.name()).ok_or_else(|| {
            FlowError::missing_input(format!(
                "{role} \"{column}\" is not a column of the input"
            ))
        })?;
        positions.push(position);
    }
    Ok(positions)
}

/// Reservoir sampling over the input stream. Every row seen has an equal
/// chance of ending up in the result, while memory never holds more than
/// `count` rows; a fixed seed replays the same subset for the same input.
async fn sample(
    input: Data,
    count: usize,
    seed: Option<u64>,
    mode: EvalMode,
    job: &Job,
) -> Fallible<Raster> {
    let mut stream = input.into_stream();
    let columns = stream.column_names(job).await?;
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::seed_from_u64(rand::random()),
    };
    let read_cap = match mode {
        EvalMode::Example(budget) => Some(budget.max_input_rows),
        EvalMode::Full => None,
    };

    let mut reservoir: Vec<Row> = Vec::new();
    let mut seen: usize = 0;
    let mut cut = false;
    loop {
        job.check()?;
        let mut fetch = stream.fetch(job).await?;
        if let Some(cap) = read_cap {
            let allowed = cap.saturating_sub(seen);
            if fetch.rows.len() > allowed {
                fetch.rows.truncate(allowed);
                cut = true;
            }
        }
        for row in fetch.rows {
            seen += 1;
            if reservoir.len() < count {
                reservoir.push(row);
            } else if count > 0 {
                let slot = rng.gen_range(0..seen);
                if slot < count {
                    reservoir[slot] = row;
                }
            }
        }
        match read_cap {
            Some(cap) if cap > 0 => job.report_progress(seen as f64 / cap as f64),
            _ => job.report_progress(seen as f64 / (seen as f64 + 1024.0)),
        }
        if cut || !fetch.has_more {
            break;
        }
    }

    let mut raster = Raster::new(columns, reservoir);
    if cut {
        raster.mark_partial();
    }
    Ok(raster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use engine::Column;
    use flow::RasterStream;

    fn digits(n: i64) -> Data {
        let raster = Raster::new(
            vec![Column::new("d")],
            (0..n).map(|d| vec![Value::Integer(d)]).collect(),
        );
        Data::from_stream(Box::new(RasterStream::new(Arc::new(raster))))
    }

    #[tokio::test]
    async fn test_sample_keeps_at_most_count_rows() {
        let job = Job::interactive();
        let raster = sample(digits(100), 7, Some(5), EvalMode::Full, &job)
            .await
            .unwrap();
        assert_eq!(raster.row_count(), 7);
        assert!(!raster.is_partial());
    }

    #[tokio::test]
    async fn test_sample_of_a_short_input_is_the_whole_input() {
        let job = Job::interactive();
        let raster = sample(digits(4), 10, Some(5), EvalMode::Full, &job)
            .await
            .unwrap();
        assert_eq!(raster.row_count(), 4);
    }

    #[tokio::test]
    async fn test_sample_replays_under_a_fixed_seed() {
        let job = Job::interactive();
        let first = sample(digits(500), 12, Some(42), EvalMode::Full, &job)
            .await
            .unwrap();
        let second = sample(digits(500), 12, Some(42), EvalMode::Full, &job)
            .await
            .unwrap();
        assert_eq!(first.rows(), second.rows());
    }

    #[tokio::test]
    async fn test_sample_draws_beyond_the_first_rows() {
        let job = Job::interactive();
        let raster = sample(digits(1000), 10, Some(7), EvalMode::Full, &job)
            .await
            .unwrap();
        let beyond = raster.rows().iter().any(|row| match row[0] {
            Value::Integer(d) => d >= 10,
            _ => false,
        });
        assert!(beyond, "a fair sample of 1000 rows should reach past row 10");
    }

    #[tokio::test]
    async fn test_example_mode_bounds_sample_reads() {
        let job = Job::interactive();
        let budget = ExampleBudget {
            max_input_rows: 50,
            max_output_rows: 100,
        };
        let raster = sample(digits(1000), 10, Some(1), EvalMode::Example(budget), &job)
            .await
            .unwrap();
        assert_eq!(raster.row_count(), 10);
        assert!(raster.is_partial());
        let within = raster.rows().iter().all(|row| match row[0] {
            Value::Integer(d) => d < 50,
            _ => false,
        });
        assert!(within, "example mode must not read past the input budget");
    }
}
