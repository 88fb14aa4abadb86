//! FILENAME: sequencer/src/stream.rs
//! PURPOSE: Exposes a pattern as a plain single-column RowStream.
//! CONTEXT: The rest of the pipeline never learns that a source is
//! generated; it pulls batches like from any other stream. Enumeration
//! walks the pattern in deterministic order; sampling draws a fixed number
//! of values from a seeded generator, so clones of a sampling stream
//! reproduce the same rows.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;

use engine::{Column, Value};
use flow::{Fallible, Fetch, FlowError, Job, RowStream, BATCH_SIZE};

use crate::ast::Pattern;
use crate::generator::{random_value, Enumerator};
use crate::parser::{parse, PatternError};

impl From<PatternError> for FlowError {
    fn from(error: PatternError) -> Self {
        FlowError::Pattern(error.to_string())
    }
}

enum State {
    Enumerate(std::iter::Peekable<Enumerator>),
    Random {
        rng: StdRng,
        produced: u64,
        total: u64,
    },
}

/// A stream of generated values, one per row, in a column named "value".
pub struct SequenceStream {
    pattern: Pattern,
    seed: u64,
    state: State,
}

impl SequenceStream {
    /// A stream over every string the pattern denotes, in enumeration
    /// order.
    pub fn enumerate(pattern: &str) -> Result<SequenceStream, PatternError> {
        let pattern = parse(pattern)?;
        let iter = Enumerator::new(&pattern).peekable();
        Ok(SequenceStream {
            pattern,
            seed: 0,
            state: State::Enumerate(iter),
        })
    }

    /// A stream of `count` randomly drawn values. With `seed` absent a
    /// fresh seed is taken once, so clones of this stream still replay
    /// identical rows.
    pub fn random(
        pattern: &str,
        count: u64,
        seed: Option<u64>,
    ) -> Result<SequenceStream, PatternError> {
        let pattern = parse(pattern)?;
        let seed = seed.unwrap_or_else(rand::random);
        Ok(SequenceStream {
            pattern,
            seed,
            state: State::Random {
                rng: StdRng::seed_from_u64(seed),
                produced: 0,
                total: count,
            },
        })
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }
}

#[async_trait]
impl RowStream for SequenceStream {
    async fn column_names(&mut self, job: &Job) -> Fallible<Vec<Column>> {
        job.check()?;
        Ok(vec![Column::new("value")])
    }

    async fn fetch(&mut self, job: &Job) -> Fallible<Fetch> {
        job.check()?;
        match &mut self.state {
            State::Enumerate(iter) => {
                let mut rows = Vec::new();
                while rows.len() < BATCH_SIZE {
                    match iter.next() {
                        Some(text) => rows.push(vec![Value::Text(text)]),
                        None => break,
                    }
                }
                let has_more = iter.peek().is_some();
                Ok(Fetch::new(rows, has_more))
            }
            State::Random { rng, produced, total } => {
                let mut rows = Vec::new();
                while rows.len() < BATCH_SIZE && *produced < *total {
                    rows.push(vec![Value::Text(random_value(&self.pattern, rng))]);
                    *produced += 1;
                }
                Ok(Fetch::new(rows, *produced < *total))
            }
        }
    }

    fn clone_stream(&self) -> Box<dyn RowStream> {
        let state = match &self.state {
            State::Enumerate(_) => {
                State::Enumerate(Enumerator::new(&self.pattern).peekable())
            }
            State::Random { total, .. } => State::Random {
                rng: StdRng::seed_from_u64(self.seed),
                produced: 0,
                total: *total,
            },
        };
        Box::new(SequenceStream {
            pattern: self.pattern.clone(),
            seed: self.seed,
            state,
        })
    }
}
