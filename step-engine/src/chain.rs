//! FILENAME: step-engine/src/chain.rs
//! PURPOSE: An editable chain of steps: a doubly linked line held in an
//! id-keyed arena, with benched alternatives hanging off active steps.
//! CONTEXT: The head is the most downstream step and what the chain shows
//! by default. Every editing operation keeps previous/next strictly
//! mutual and leaves no dangling ids behind, so evaluation can always
//! walk from any step back to the root. Alternatives are unlinked steps
//! parked on an active one; swapping an alternative in moves the links
//! and the whole bench across in one motion.

use rustc_hash::FxHashMap;

use flow::{Fallible, FlowError};

use crate::step::{Step, StepId, StepKind};

/// A single line of steps plus their benched alternatives.
#[derive(Debug, Clone)]
pub struct Chain {
    steps: FxHashMap<StepId, Step>,
    head: Option<StepId>,
    next_id: StepId,
}

impl Default for Chain {
    fn default() -> Chain {
        Chain::new()
    }
}

impl Chain {
    pub fn new() -> Chain {
        Chain {
            steps: FxHashMap::default(),
            head: None,
            next_id: 1,
        }
    }

    /// The most downstream step, absent only in an empty chain.
    pub fn head(&self) -> Option<StepId> {
        self.head
    }

    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.get(&id)
    }

    /// Mutable access to a step, for configuration edits. Links stay
    /// crate-private, so callers cannot detach anything through this.
    pub fn step_mut(&mut self, id: StepId) -> Option<&mut Step> {
        self.steps.get_mut(&id)
    }

    pub fn contains(&self, id: StepId) -> bool {
        self.steps.contains_key(&id)
    }

    /// Total number of steps held, benched alternatives included.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step ids from the head back to the root. Stops rather than looping
    /// if links were corrupted from outside; `graph::verify_no_cycles`
    /// reports that case with a proper error.
    pub fn sequence(&self) -> Vec<StepId> {
        let mut order = Vec::new();
        let mut cursor = self.head;
        while let Some(id) = cursor {
            if order.len() > self.steps.len() {
                break;
            }
            order.push(id);
            cursor = self.steps.get(&id).and_then(|step| step.previous);
        }
        order
    }

    // ========================================================================
    // Editing operations
    // ========================================================================

    /// Appends a step after the current head and makes it the new head.
    pub fn push_head(&mut self, kind: StepKind) -> StepId {
        let id = self.allocate(kind);
        if let Some(old) = self.head {
            self.link(old, id);
        }
        self.head = Some(id);
        id
    }

    /// Inserts a step between `target` and whatever currently feeds it.
    pub fn insert_before(&mut self, target: StepId, kind: StepKind) -> Fallible<StepId> {
        let upstream = self.linked(target)?.previous;
        let id = self.allocate(kind);
        if let Some(upstream) = upstream {
            self.link(upstream, id);
        }
        self.link(id, target);
        Ok(id)
    }

    /// Removes a step, relinking its neighbors around the gap. The step's
    /// benched alternatives are dropped with it, and the returned step
    /// comes back fully unlinked.
    pub fn remove(&mut self, id: StepId) -> Fallible<Step> {
        let mut step = self
            .steps
            .remove(&id)
            .ok_or(FlowError::UnknownStep(id))?;
        for alternative in step.alternatives.drain(..) {
            self.steps.remove(&alternative);
        }
        match (step.previous, step.next) {
            (Some(upstream), Some(downstream)) => self.link(upstream, downstream),
            (Some(upstream), None) => self.set_next(upstream, None),
            (None, Some(downstream)) => self.set_previous(downstream, None),
            (None, None) => {}
        }
        if self.head == Some(id) {
            self.head = step.previous;
        }
        // The removed step may itself have been parked on a bench.
        for other in self.steps.values_mut() {
            other.alternatives.retain(|&parked| parked != id);
        }
        step.previous = None;
        step.next = None;
        Ok(step)
    }

    /// Moves an existing step to sit directly before `before`, or to the
    /// head when `before` is `None`. Links elsewhere are untouched.
    pub fn move_step(&mut self, id: StepId, before: Option<StepId>) -> Fallible<()> {
        self.linked(id)?;
        if let Some(target) = before {
            if target == id {
                return Ok(());
            }
            self.linked(target)?;
        } else if self.head == Some(id) {
            return Ok(());
        }

        // Detach.
        let (previous, next) = match self.steps.get(&id) {
            Some(step) => (step.previous, step.next),
            None => return Err(FlowError::UnknownStep(id)),
        };
        match (previous, next) {
            (Some(upstream), Some(downstream)) => self.link(upstream, downstream),
            (Some(upstream), None) => self.set_next(upstream, None),
            (None, Some(downstream)) => self.set_previous(downstream, None),
            (None, None) => {}
        }
        if self.head == Some(id) {
            self.head = previous;
        }
        self.set_previous(id, None);
        self.set_next(id, None);

        // Reattach.
        match before {
            Some(target) => {
                let upstream = self.steps.get(&target).and_then(|step| step.previous);
                if let Some(upstream) = upstream {
                    self.link(upstream, id);
                }
                self.link(id, target);
            }
            None => {
                if let Some(old) = self.head {
                    self.link(old, id);
                }
                self.head = Some(id);
            }
        }
        Ok(())
    }

    /// Parks a new step on `anchor`'s bench. The alternative shares the
    /// anchor's position but carries no links until swapped in.
    pub fn add_alternative(&mut self, anchor: StepId, kind: StepKind) -> Fallible<StepId> {
        self.linked(anchor)?;
        let id = self.allocate(kind);
        if let Some(step) = self.steps.get_mut(&anchor) {
            step.alternatives.push(id);
        }
        Ok(id)
    }

    /// Swaps a benched alternative into the anchor's place. The anchor
    /// moves to the bench, and the rest of the bench follows the newly
    /// active step.
    pub fn swap_alternative(&mut self, anchor: StepId, alternative: StepId) -> Fallible<()> {
        let benched = self
            .linked(anchor)?
            .alternatives
            .contains(&alternative);
        if !benched {
            return Err(FlowError::UnknownStep(alternative));
        }
        let (previous, next, mut bench) = match self.steps.get_mut(&anchor) {
            Some(step) => (
                step.previous.take(),
                step.next.take(),
                std::mem::take(&mut step.alternatives),
            ),
            None => return Err(FlowError::UnknownStep(anchor)),
        };
        for slot in bench.iter_mut() {
            if *slot == alternative {
                *slot = anchor;
            }
        }
        if let Some(step) = self.steps.get_mut(&alternative) {
            step.previous = previous;
            step.next = next;
            step.alternatives = bench;
        }
        if let Some(upstream) = previous {
            self.set_next(upstream, Some(alternative));
        }
        if let Some(downstream) = next {
            self.set_previous(downstream, Some(alternative));
        }
        if self.head == Some(anchor) {
            self.head = Some(alternative);
        }
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn allocate(&mut self, kind: StepKind) -> StepId {
        let id = self.next_id;
        self.next_id += 1;
        self.steps.insert(id, Step::new(kind));
        id
    }

    /// The step, required to be on the active line rather than a bench.
    fn linked(&self, id: StepId) -> Fallible<&Step> {
        let step = self.steps.get(&id).ok_or(FlowError::UnknownStep(id))?;
        let on_line = self.head == Some(id) || step.previous.is_some() || step.next.is_some();
        if on_line {
            Ok(step)
        } else {
            Err(FlowError::UnknownStep(id))
        }
    }

    /// Makes `upstream` feed `downstream`, updating both ends.
    fn link(&mut self, upstream: StepId, downstream: StepId) {
        self.set_next(upstream, Some(downstream));
        self.set_previous(downstream, Some(upstream));
    }

    fn set_previous(&mut self, id: StepId, previous: Option<StepId>) {
        if let Some(step) = self.steps.get_mut(&id) {
            step.previous = previous;
        }
    }

    fn set_next(&mut self, id: StepId, next: Option<StepId>) {
        if let Some(step) = self.steps.get_mut(&id) {
            step.next = next;
        }
    }
}
