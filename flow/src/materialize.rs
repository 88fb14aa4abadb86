//! FILENAME: flow/src/materialize.rs
//! PURPOSE: Drains streams into rasters under row and time budgets.
//! CONTEXT: Materialization is the one place streaming work actually runs,
//! so it is also where budgets apply. A drain cut short by its budget
//! returns a raster marked partial instead of failing; only cancellation
//! and upstream errors abort.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace};
use tokio::time::Instant;

use engine::Raster;

use crate::data::Data;
use crate::error::Fallible;
use crate::job::Job;
use crate::stream::RowStream;

/// Denominator offset for progress when no row cap is known; progress then
/// approaches 1 without reaching it.
const OPEN_ENDED_PROGRESS_SCALE: f64 = 1024.0;

/// Limits on how much a drain may pull.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrainBudget {
    /// Stop after this many rows have been kept.
    pub max_rows: Option<usize>,
    /// Stop this long after the drain started.
    pub deadline: Option<Duration>,
}

impl DrainBudget {
    pub fn unbounded() -> Self {
        DrainBudget::default()
    }

    pub fn rows(max_rows: usize) -> Self {
        DrainBudget { max_rows: Some(max_rows), deadline: None }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Pulls `stream` to exhaustion or until the budget runs out.
///
/// # Returns
/// The landed raster. It is marked partial when the row cap or the
/// deadline cut the drain short of exhausting the source.
pub async fn drain(
    stream: &mut dyn RowStream,
    job: &Job,
    budget: &DrainBudget,
) -> Fallible<Raster> {
    let started = Instant::now();
    let columns = stream.column_names(job).await?;

    let mut rows: Vec<engine::Row> = Vec::new();
    let mut truncated = false;

    loop {
        job.check()?;
        if let Some(deadline) = budget.deadline {
            if started.elapsed() >= deadline {
                trace!("drain deadline elapsed after {} rows", rows.len());
                truncated = true;
                break;
            }
        }

        let fetch = stream.fetch(job).await?;
        let mut batch = fetch.rows;

        if let Some(max) = budget.max_rows {
            let room = max.saturating_sub(rows.len());
            if batch.len() > room {
                batch.truncate(room);
                truncated = true;
            }
            rows.append(&mut batch);
            if rows.len() >= max {
                truncated = truncated || fetch.has_more;
                break;
            }
            job.report_progress(rows.len() as f64 / max as f64);
        } else {
            rows.append(&mut batch);
            let n = rows.len() as f64;
            job.report_progress(n / (n + OPEN_ENDED_PROGRESS_SCALE));
        }

        if !fetch.has_more {
            break;
        }
    }

    debug!(
        "drained {} rows x {} columns{}",
        rows.len(),
        columns.len(),
        if truncated { " (truncated)" } else { "" }
    );
    job.report_progress(1.0);

    let mut raster = Raster::new(columns, rows);
    if truncated {
        raster.mark_partial();
    }
    Ok(raster)
}

/// Lands `data` as a raster. Already-landed data passes through without
/// copying unless the row cap forces a cut.
pub async fn materialize(data: Data, job: &Job, budget: &DrainBudget) -> Fallible<Arc<Raster>> {
    match data {
        Data::Raster(raster) => {
            job.check()?;
            match budget.max_rows {
                Some(max) if raster.row_count() > max => {
                    let mut cut = raster.limit(max);
                    cut.mark_partial();
                    Ok(Arc::new(cut))
                }
                _ => Ok(raster),
            }
        }
        Data::Stream(mut stream) => {
            let raster = drain(stream.as_mut(), job, budget).await?;
            Ok(Arc::new(raster))
        }
    }
}
