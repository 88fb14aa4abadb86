//! FILENAME: step-engine/src/calculator.rs
//! PURPOSE: Tracks the one live calculation per chain and restarts it when
//! a new request for the same chain arrives.
//! CONTEXT: Editing a step makes the previous preview of its chain stale
//! before it even lands. The calculator keeps the job handle of whatever
//! is currently computing for each chain; beginning a new calculation
//! cancels the stale one, so at most one evaluation per chain holds the
//! executor at a time. The map is shared behind a mutex so UI threads and
//! runtime tasks can begin and cancel without coordinating.

use std::sync::{Arc, Mutex};

use log::debug;
use rustc_hash::FxHashMap;

use engine::Raster;
use flow::{materialize, DrainBudget, Fallible, Job};

use crate::evaluate::ExampleBudget;
use crate::step::ChainId;
use crate::workspace::Workspace;

// ============================================================================
// Calculator
// ============================================================================

#[derive(Default)]
pub struct Calculator {
    live: Mutex<FxHashMap<ChainId, Job>>,
}

impl Calculator {
    pub fn new() -> Calculator {
        Calculator {
            live: Mutex::new(FxHashMap::default()),
        }
    }

    /// Registers a fresh interactive job for `chain`, cancelling whatever
    /// was computing for it before, and returns the handle.
    pub fn begin(&self, chain: ChainId) -> Job {
        let job = Job::interactive();
        self.install(chain, job.clone());
        job
    }

    /// Like `begin`, with a progress observer attached before anything
    /// starts reporting.
    pub fn begin_with_progress(
        &self,
        chain: ChainId,
        observer: impl Fn(f64) + Send + Sync + 'static,
    ) -> Job {
        let job = Job::interactive();
        job.on_progress(observer);
        self.install(chain, job.clone());
        job
    }

    fn install(&self, chain: ChainId, job: Job) {
        if let Ok(mut live) = self.live.lock() {
            if let Some(prior) = live.insert(chain, job) {
                if !prior.is_cancelled() {
                    debug!("restarting calculation for chain {chain}");
                    prior.cancel();
                }
            }
        }
    }

    /// Cancels the live calculation for `chain`, if any. Returns whether
    /// a running job was actually stopped.
    pub fn cancel(&self, chain: ChainId) -> bool {
        if let Ok(mut live) = self.live.lock() {
            if let Some(job) = live.remove(&chain) {
                let was_running = !job.is_cancelled();
                job.cancel();
                return was_running;
            }
        }
        false
    }

    pub fn cancel_all(&self) {
        if let Ok(mut live) = self.live.lock() {
            for job in live.values() {
                job.cancel();
            }
            live.clear();
        }
    }

    /// Whether a calculation for `chain` is registered and still running.
    pub fn is_live(&self, chain: ChainId) -> bool {
        match self.live.lock() {
            Ok(live) => live.get(&chain).is_some_and(|job| !job.is_cancelled()),
            Err(_) => false,
        }
    }

    // ========================================================================
    // Calculations
    // ========================================================================

    /// Computes and lands the example result of a chain. A later call for
    /// the same chain cancels this one mid-flight.
    pub async fn example_raster(
        &self,
        workspace: &Workspace,
        chain: ChainId,
        budget: ExampleBudget,
    ) -> Fallible<Arc<Raster>> {
        let job = self.begin(chain);
        let data = workspace.example_data(chain, &job, budget).await?;
        materialize(data, &job, &DrainBudget::rows(budget.max_output_rows)).await
    }

    /// Computes and lands the complete result of a chain under a
    /// background job.
    pub async fn full_raster(
        &self,
        workspace: &Workspace,
        chain: ChainId,
    ) -> Fallible<Arc<Raster>> {
        let job = Job::background();
        self.install(chain, job.clone());
        let data = workspace.full_data(chain, &job).await?;
        materialize(data, &job, &DrainBudget::unbounded()).await
    }
}
