use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use typed_builder::TypedBuilder;

use crate::{
    aggregate::{LatencyAggregator, Snapshot},
    error::Result,
    executor::Executor,
    report::{Reporter, SampleDump},
    scenario::Scenario,
    trial::Trial,
};

/// Start and deadline of a run, fixed when the run starts.
#[derive(Clone, Copy, Debug)]
pub struct RunWindow {
    started_at: Instant,
    // None when `duration` does not fit in an Instant
    deadline: Option<Instant>,
}

impl RunWindow {
    pub fn open(duration: Duration) -> Self {
        let started_at = Instant::now();
        Self {
            started_at,
            deadline: started_at.checked_add(duration),
        }
    }

    pub fn is_open(&self) -> bool {
        self.deadline.is_none_or(|deadline| Instant::now() < deadline)
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Everything a finished run produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub batches: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
    pub snapshot: Snapshot,
}

/// Drives batches until the time budget is spent.
///
/// The deadline is checked before each batch and never interrupts one, so a run
/// can overshoot `duration` by one batch's worst-case latency. A zero duration
/// runs no batch at all.
#[derive(Clone, Debug, TypedBuilder)]
pub struct Runner<E> {
    /// Wall-clock budget of the run.
    #[builder(default = Duration::from_secs(300))]
    pub duration: Duration,
    pub executor: E,
}

impl<E> Runner<E> {
    /// Run the scenario and return the final statistics.
    ///
    /// The first successful diagnostic sample is handed to `reporter` as soon as
    /// its batch joins, exactly once per run. Trial failures only show up in the
    /// counts; reporter and scheduler errors abort the run.
    pub async fn run<F, Fut, R>(
        &self,
        scenario: &Scenario<F, Fut>,
        aggregator: &Arc<LatencyAggregator>,
        reporter: &R,
    ) -> Result<RunSummary>
    where
        E: Executor<F, Fut>,
        F: Fn() -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Trial> + Send + 'static,
        R: Reporter<SampleDump>,
    {
        let window = RunWindow::open(self.duration);
        tracing::info!(
            "Running scenario: {} for {:?}",
            scenario.name,
            self.duration
        );

        let mut summary = RunSummary::default();
        let mut sample_done = false;

        while window.is_open() {
            let batch = self.executor.run_batch(scenario, aggregator).await?;
            summary.batches += 1;
            summary.succeeded += batch.succeeded;
            summary.failed += batch.failed;

            if !sample_done {
                if let Some(raw) = batch.sample {
                    reporter.report(&SampleDump::from(raw)).await?;
                    sample_done = true;
                }
            }
        }

        summary.elapsed = window.elapsed();
        summary.snapshot = aggregator.snapshot();
        tracing::info!(
            "Done running scenario: {} ({} batches, {} succeeded, {} failed in {:?})",
            scenario.name,
            summary.batches,
            summary.succeeded,
            summary.failed,
            summary.elapsed
        );
        Ok(summary)
    }
}
