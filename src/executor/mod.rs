//! Executor: fan-out/fan-in of trials in bounded batches
//!
//! The [`Executor`] trait runs one batch of a [`Scenario`]: it dispatches a fixed
//! number of trials, feeds every successful trial's latency into the shared
//! [`LatencyAggregator`], and returns only after all of them finished. Batches are
//! the synchronization points of a run; nothing dispatched in a batch may still
//! be running when the next batch starts.
//!
//! The built-in [`BatchExecutor`] bounds in-flight trials with a counting
//! semaphore. See its docs for the exact contract.
pub mod batch;
pub use batch::{BatchExecutor, BatchSummary};

use crate::{aggregate::LatencyAggregator, error::Result, scenario::Scenario, trial::Trial};
use std::{future::Future, sync::Arc};

/// Runs batches of trials for a [`Scenario`].
///
/// Implementations must join every dispatched trial before the returned future
/// resolves, and must contain per-trial failures: a failed or panicked trial is
/// counted, never propagated.
pub trait Executor<F, Fut>
where
    Self: Send + Sync + Sized,
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = Trial> + Send + 'static,
{
    /// Run one batch to completion.
    fn run_batch(
        &self,
        scenario: &Scenario<F, Fut>,
        aggregator: &Arc<LatencyAggregator>,
    ) -> impl Future<Output = Result<BatchSummary>> + Send;
}
