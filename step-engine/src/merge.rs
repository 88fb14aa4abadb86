//! FILENAME: step-engine/src/merge.rs
//! PURPOSE: Pairwise step merging: when two adjacent steps can collapse
//! into one, and whether they should.
//! CONTEXT: Merging is advisory. The chain editor asks a step how it
//! combines with the step directly upstream and presents the answer;
//! nothing here rewrites a chain. `Possible` means the pair is expressible
//! as one step, `Advised` means the pair is also redundant as written, and
//! `Cancels` means the two undo each other outright.

use engine::{Expression, Function};

use crate::step::StepKind;

/// How a step combines with the step directly upstream of it.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// The pair cannot be expressed as a single step.
    Impossible,
    /// The pair can collapse into the given step, with identical results.
    Possible(StepKind),
    /// The pair should collapse into the given step; keeping both wastes
    /// a pass over the data.
    Advised(StepKind),
    /// The two steps undo each other; both can simply be removed.
    Cancels,
}

impl StepKind {
    /// How this step combines with `prior`, the step feeding it.
    pub fn merge_with(&self, prior: &StepKind) -> MergeOutcome {
        match (prior, self) {
            // The narrower limit decides on its own.
            (StepKind::Limit { count: first }, StepKind::Limit { count: second }) => {
                MergeOutcome::Advised(StepKind::Limit {
                    count: (*first).min(*second),
                })
            }
            // A transpose of a transpose is the identity.
            (StepKind::Transpose, StepKind::Transpose) => MergeOutcome::Cancels,
            // Two filters are one filter over the conjunction.
            (
                StepKind::Filter { predicate: first },
                StepKind::Filter { predicate: second },
            ) => MergeOutcome::Possible(StepKind::Filter {
                predicate: Expression::call(Function::And, vec![first.clone(), second.clone()]),
            }),
            // A sort erases whatever order the prior sort produced.
            (StepKind::Sort { .. }, StepKind::Sort { keys }) => {
                MergeOutcome::Advised(StepKind::Sort { keys: keys.clone() })
            }
            _ => MergeOutcome::Impossible,
        }
    }
}
