//! FILENAME: flow/src/job.rs
//! PURPOSE: The cancellable handle every long-running operation runs under.
//! CONTEXT: A `Job` bundles a cancellation token, an urgency label and a set
//! of progress observers. Row producers call `check()` at each suspension
//! point so that cancellation is honored between batches, never mid-row.
//! Jobs are cheap to clone; clones share the same token and observers.

use std::future::Future;
use std::sync::{Arc, Mutex};

use log::debug;
use tokio_util::sync::CancellationToken;

use crate::error::{Fallible, FlowError};

/// How eagerly a consumer is waiting on the result.
///
/// Interactive jobs back previews and should be bounded by their caller;
/// background jobs run exports and full evaluations to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Interactive,
    Background,
}

type ProgressObserver = Box<dyn Fn(f64) + Send + Sync>;

struct JobInner {
    token: CancellationToken,
    urgency: Urgency,
    observers: Mutex<Vec<ProgressObserver>>,
}

/// A handle for one unit of cancellable work.
#[derive(Clone)]
pub struct Job {
    inner: Arc<JobInner>,
}

impl Job {
    pub fn new(urgency: Urgency) -> Self {
        Job {
            inner: Arc::new(JobInner {
                token: CancellationToken::new(),
                urgency,
                observers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn interactive() -> Self {
        Job::new(Urgency::Interactive)
    }

    pub fn background() -> Self {
        Job::new(Urgency::Background)
    }

    pub fn urgency(&self) -> Urgency {
        self.inner.urgency
    }

    /// Requests cancellation. Idempotent; takes effect at the next
    /// suspension point of whatever runs under this job.
    pub fn cancel(&self) {
        if !self.is_cancelled() {
            debug!("cancelling a {:?} job", self.inner.urgency);
        }
        self.inner.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// The cooperative cancellation point. Row producers call this once per
    /// batch; whole-table operations call it between phases.
    pub fn check(&self) -> Fallible<()> {
        if self.is_cancelled() {
            Err(FlowError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// A job that is cancelled whenever this one is, but can also be
    /// cancelled on its own. Sub-evaluations (a join pulling on another
    /// chain) run under children so aborting the outer work stops them too.
    pub fn child(&self) -> Job {
        Job {
            inner: Arc::new(JobInner {
                token: self.inner.token.child_token(),
                urgency: self.inner.urgency,
                observers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Registers a progress observer. Observers receive fractions in
    /// `0.0..=1.0` and must be fast; they run on the worker.
    pub fn on_progress(&self, observer: impl Fn(f64) + Send + Sync + 'static) {
        if let Ok(mut observers) = self.inner.observers.lock() {
            observers.push(Box::new(observer));
        }
    }

    pub fn report_progress(&self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        if let Ok(observers) = self.inner.observers.lock() {
            for observer in observers.iter() {
                observer(fraction);
            }
        }
    }

    /// Runs a future to completion unless the job is cancelled first, in
    /// which case the future is dropped and `Cancelled` returned.
    /// Cancellation wins over a finished future when both are ready.
    pub async fn run<T>(&self, future: impl Future<Output = Fallible<T>>) -> Fallible<T> {
        tokio::select! {
            biased;
            _ = self.inner.token.cancelled() => Err(FlowError::Cancelled),
            result = future => result,
        }
    }

    /// Spawns a future onto the runtime under this job's cancellation.
    pub fn spawn<T, F>(&self, future: F) -> tokio::task::JoinHandle<Fallible<T>>
    where
        T: Send + 'static,
        F: Future<Output = Fallible<T>> + Send + 'static,
    {
        let job = self.clone();
        tokio::spawn(async move { job.run(future).await })
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("urgency", &self.inner.urgency)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_check_reports_cancellation() {
        let job = Job::interactive();
        assert!(job.check().is_ok());
        job.cancel();
        assert!(matches!(job.check(), Err(FlowError::Cancelled)));
    }

    #[test]
    fn test_clones_share_cancellation() {
        let job = Job::background();
        let clone = job.clone();
        clone.cancel();
        assert!(job.is_cancelled());
    }

    #[test]
    fn test_child_follows_parent_but_not_back() {
        let parent = Job::interactive();
        let child = parent.child();
        assert_eq!(child.urgency(), Urgency::Interactive);

        child.cancel();
        assert!(!parent.is_cancelled());

        let second = parent.child();
        parent.cancel();
        assert!(second.is_cancelled());
    }

    #[test]
    fn test_progress_observers_receive_clamped_fractions() {
        let job = Job::background();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        job.on_progress(move |f| sink.lock().unwrap().push(f));

        job.report_progress(0.25);
        job.report_progress(7.0);
        assert_eq!(*seen.lock().unwrap(), vec![0.25, 1.0]);
    }

    #[tokio::test]
    async fn test_run_returns_cancelled_for_cancelled_job() {
        let job = Job::interactive();
        job.cancel();
        let result = job.run(async { Ok(42) }).await;
        assert!(matches!(result, Err(FlowError::Cancelled)));
    }

    #[tokio::test]
    async fn test_run_passes_through_results() {
        let job = Job::interactive();
        assert_eq!(job.run(async { Ok(42) }).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_spawned_work_stops_at_next_checkpoint() {
        let job = Job::background();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let worker = job.spawn(async move {
            for _ in 0..1_000_000 {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
            }
            Ok(())
        });

        tokio::task::yield_now().await;
        job.cancel();
        let result = worker.await.unwrap();
        assert!(matches!(result, Err(FlowError::Cancelled)));
    }
}
