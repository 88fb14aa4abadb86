//! FILENAME: step-engine/src/workspace.rs
//! PURPOSE: The collection of chains a session works on, and the public
//! entry points for evaluating them.
//! CONTEXT: A workspace owns its chains and hands out stable numeric ids,
//! in the same arena style a chain uses for its steps. Evaluation always
//! enters through here so the join graph is verified before the recursion
//! in `evaluate` starts; removing a chain that another chain joins against
//! is allowed and surfaces as an unknown-chain error at evaluation time.

use rustc_hash::FxHashMap;

use flow::{Data, Fallible, Job};

use crate::chain::Chain;
use crate::evaluate::{self, EvalMode, ExampleBudget};
use crate::graph;
use crate::step::{ChainId, StepId};

// ============================================================================
// Workspace
// ============================================================================

#[derive(Debug)]
pub struct Workspace {
    chains: FxHashMap<ChainId, Chain>,
    next_id: ChainId,
}

impl Default for Workspace {
    fn default() -> Workspace {
        Workspace::new()
    }
}

impl Workspace {
    pub fn new() -> Workspace {
        Workspace {
            chains: FxHashMap::default(),
            next_id: 1,
        }
    }

    /// Adds an empty chain and returns its id. Ids are never reused, so a
    /// stale id from a removed chain can not silently hit a new one.
    pub fn add_chain(&mut self) -> ChainId {
        let id = self.next_id;
        self.next_id += 1;
        self.chains.insert(id, Chain::new());
        id
    }

    pub fn chain(&self, id: ChainId) -> Option<&Chain> {
        self.chains.get(&id)
    }

    pub fn chain_mut(&mut self, id: ChainId) -> Option<&mut Chain> {
        self.chains.get_mut(&id)
    }

    pub fn remove_chain(&mut self, id: ChainId) -> Option<Chain> {
        self.chains.remove(&id)
    }

    /// Reinstates a chain under a known id, as when loading a saved
    /// workspace. Join configs reference chains by id, so a load must put
    /// every chain back where its references expect it. Freshly added
    /// chains keep getting ids above anything restored.
    pub fn restore_chain(&mut self, id: ChainId, chain: Chain) -> Option<Chain> {
        self.next_id = self.next_id.max(id.saturating_add(1));
        self.chains.insert(id, chain)
    }

    /// Chain ids in ascending order, which is creation order.
    pub fn chain_ids(&self) -> Vec<ChainId> {
        let mut ids: Vec<ChainId> = self.chains.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    // ========================================================================
    // Evaluation entry points
    // ========================================================================

    /// The example result of a chain: bounded reads, capped outputs,
    /// suitable for interactive previews.
    pub async fn example_data(
        &self,
        chain: ChainId,
        job: &Job,
        budget: ExampleBudget,
    ) -> Fallible<Data> {
        graph::verify_no_cycles(self, chain)?;
        evaluate::chain_data(self, chain, EvalMode::Example(budget), job).await
    }

    /// The example result as seen at one step of a chain, so an editor can
    /// preview any point on the line, not just the head.
    pub async fn example_data_at(
        &self,
        chain: ChainId,
        step: StepId,
        job: &Job,
        budget: ExampleBudget,
    ) -> Fallible<Data> {
        graph::verify_no_cycles(self, chain)?;
        evaluate::step_data(self, chain, step, EvalMode::Example(budget), job).await
    }

    /// The complete result of a chain, reading every input row.
    pub async fn full_data(&self, chain: ChainId, job: &Job) -> Fallible<Data> {
        graph::verify_no_cycles(self, chain)?;
        evaluate::chain_data(self, chain, EvalMode::Full, job).await
    }
}
