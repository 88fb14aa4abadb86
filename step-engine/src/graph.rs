//! FILENAME: step-engine/src/graph.rs
//! PURPOSE: Cycle detection across chains, run before any evaluation.
//! CONTEXT: A workspace can knot itself two ways. Within one chain the
//! previous links can loop back on themselves, and between chains a join
//! can reference a chain that eventually joins back. Both are walked here
//! with explicit visited sets and reported as
//! `FlowError::DependencyCycle` naming the offending path, so the
//! evaluator itself never has to worry about recursing forever.

use log::warn;
use rustc_hash::FxHashSet;

use flow::{Fallible, FlowError};

use crate::chain::Chain;
use crate::step::{ChainId, StepKind};
use crate::workspace::Workspace;

/// Verifies that `start` and every chain it reaches through join steps
/// can be evaluated without revisiting itself.
pub fn verify_no_cycles(workspace: &Workspace, start: ChainId) -> Fallible<()> {
    let mut path = Vec::new();
    let mut done = FxHashSet::default();
    visit(workspace, start, &mut path, &mut done)
}

fn visit(
    workspace: &Workspace,
    id: ChainId,
    path: &mut Vec<ChainId>,
    done: &mut FxHashSet<ChainId>,
) -> Fallible<()> {
    if done.contains(&id) {
        return Ok(());
    }
    if path.contains(&id) {
        let cycle = describe(path, id);
        warn!("refusing to evaluate: {cycle}");
        return Err(FlowError::DependencyCycle(cycle));
    }
    let chain = workspace
        .chain(id)
        .ok_or(FlowError::UnknownChain(id))?;
    verify_line(id, chain)?;

    path.push(id);
    for step_id in chain.sequence() {
        if let Some(step) = chain.step(step_id) {
            if let StepKind::Join(config) = &step.kind {
                visit(workspace, config.chain, path, done)?;
            }
        }
    }
    path.pop();
    done.insert(id);
    Ok(())
}

/// Rejects a chain whose previous links revisit a step.
fn verify_line(id: ChainId, chain: &Chain) -> Fallible<()> {
    let mut seen = FxHashSet::default();
    let mut cursor = chain.head();
    while let Some(step_id) = cursor {
        if !seen.insert(step_id) {
            let message =
                format!("chain {id}: step {step_id} appears twice on its own upstream walk");
            warn!("refusing to evaluate: {message}");
            return Err(FlowError::DependencyCycle(message));
        }
        cursor = chain.step(step_id).and_then(|step| step.previous());
    }
    Ok(())
}

/// Renders the offending loop, e.g. "chain 1 -> chain 2 -> chain 1".
fn describe(path: &[ChainId], offender: ChainId) -> String {
    let start = path.iter().position(|&id| id == offender).unwrap_or(0);
    let mut parts: Vec<String> = path[start..]
        .iter()
        .map(|id| format!("chain {id}"))
        .collect();
    parts.push(format!("chain {offender}"));
    parts.join(" -> ")
}
