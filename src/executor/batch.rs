use futures::future::join_all;
use tokio::sync::Semaphore;
use typed_builder::TypedBuilder;

use super::Executor;
use crate::{
    aggregate::LatencyAggregator, client::QueryResult, error::Result, scenario::Scenario,
    trial::Trial,
};
use std::{future::Future, sync::Arc};

/// What one batch did, once every trial in it has finished.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchSummary {
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Raw result set of the first-dispatched trial, if that trial succeeded.
    pub sample: Option<QueryResult>,
}

impl BatchSummary {
    /// Trials that reached a terminal state. Equals `dispatched` once the batch
    /// has returned.
    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Executor that runs `batch_size` trials per batch with at most
/// `max_concurrent` of them in flight.
///
/// - Every trial gets its own tokio task. A task is only spawned after it holds a
///   permit from a semaphore of `max_concurrent` permits, so at most
///   `max_concurrent` queries are in flight at once. A task that is still
///   recording its latency no longer counts against the bound.
/// - The permit is released as soon as the trial's query returns; latency
///   recording happens after that and never holds up dispatch.
/// - All task handles are joined before `run_batch` resolves. A panicked task is
///   logged and counted as a failed trial.
/// - Trial 0 is the diagnostic trial: its raw result set is returned in the
///   summary. This is by dispatch order, not completion order.
#[derive(Clone, Debug, TypedBuilder)]
pub struct BatchExecutor {
    /// Trials per batch.
    #[builder(default = 1)]
    pub batch_size: usize,
    /// Upper bound on simultaneously running trials.
    #[builder(default = 1000)]
    pub max_concurrent: usize,
}

impl<F, Fut> Executor<F, Fut> for BatchExecutor
where
    Self: Send + Sync + Sized,
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = Trial> + Send + 'static,
{
    async fn run_batch(
        &self,
        scenario: &Scenario<F, Fut>,
        aggregator: &Arc<LatencyAggregator>,
    ) -> Result<BatchSummary> {
        // tokio panics above MAX_PERMITS, and zero permits would never dispatch
        let permits = Arc::new(Semaphore::new(
            self.max_concurrent.clamp(1, Semaphore::MAX_PERMITS),
        ));
        let mut handles = Vec::with_capacity(self.batch_size);

        for idx in 0..self.batch_size {
            let permit = Arc::clone(&permits).acquire_owned().await?;
            let action = scenario.action.clone();
            let aggregator = Arc::clone(aggregator);

            handles.push(tokio::spawn(async move {
                let trial = action().await;
                drop(permit);
                settle(idx, trial, &aggregator)
            }));
        }

        let mut summary = BatchSummary {
            dispatched: handles.len(),
            ..BatchSummary::default()
        };
        for (idx, res) in join_all(handles).await.into_iter().enumerate() {
            match res {
                Ok(Settled::Succeeded { sample }) => {
                    summary.succeeded += 1;
                    if sample.is_some() {
                        summary.sample = sample;
                    }
                }
                Ok(Settled::Failed) => summary.failed += 1,
                Err(e) => {
                    // count it and keep the rest of the batch
                    tracing::error!("Trial {idx} of scenario {} panicked: {e}", scenario.name);
                    summary.failed += 1;
                }
            }
        }

        tracing::debug!(
            "Batch joined: {} dispatched, {} succeeded, {} failed",
            summary.dispatched,
            summary.succeeded,
            summary.failed
        );
        Ok(summary)
    }
}

enum Settled {
    Succeeded { sample: Option<QueryResult> },
    Failed,
}

/// Moves the trial's latency into the aggregator and keeps the raw result set
/// only for the diagnostic trial.
fn settle(idx: usize, trial: Trial, aggregator: &LatencyAggregator) -> Settled {
    match trial.into_parts() {
        Some((sample, raw)) => {
            aggregator.record(sample);
            Settled::Succeeded {
                sample: (idx == 0).then_some(raw),
            }
        }
        None => Settled::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Error, QueryClient, QueryExecutor,
        aggregate::OverflowPolicy,
        client::Match,
        workload::{Term, Vocabulary, WorkloadSource},
    };
    use std::{
        pin::Pin,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    type BoxedTrial = Pin<Box<dyn Future<Output = Trial> + Send>>;

    /// Fake service that tracks how many calls overlap and fails every n-th one.
    #[derive(Default)]
    struct Tracking {
        delay: Duration,
        fail_every: Option<usize>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl QueryClient for Tracking {
        async fn submit_query(&self, term: &str) -> Result<QueryResult> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.fail_every {
                Some(n) if call % n == 0 => Err(Error::Query(format!("call {call} dropped"))),
                _ => Ok(QueryResult {
                    total: 1,
                    matches: vec![Match {
                        key: format!("ad:{call}"),
                        fields: vec![("search_term".into(), term.into())],
                    }],
                }),
            }
        }
    }

    fn scenario_for(
        client: Arc<Tracking>,
    ) -> Scenario<impl Fn() -> BoxedTrial + Send + Sync + Clone + 'static, BoxedTrial> {
        let executor = QueryExecutor::from_shared(client);
        let workload = WorkloadSource::new(Vocabulary::new(["cat", "dog"]).unwrap(), Some(1));
        Scenario::builder()
            .name("batch test")
            .action(move || {
                let executor = executor.clone();
                let term: Term = workload.next_term();
                Box::pin(async move { executor.execute(term).await }) as BoxedTrial
            })
            .build()
    }

    fn aggregator() -> Arc<LatencyAggregator> {
        Arc::new(LatencyAggregator::new(10_000, OverflowPolicy::Reservoir, Some(1)))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn joins_exactly_batch_size_trials() {
        for batch_size in [1, 2, 7, 64, 250] {
            let client = Arc::new(Tracking {
                delay: Duration::from_millis(2),
                ..Default::default()
            });
            let agg = aggregator();
            let executor = BatchExecutor::builder()
                .batch_size(batch_size)
                .max_concurrent(16)
                .build();

            let summary = executor
                .run_batch(&scenario_for(Arc::clone(&client)), &agg)
                .await
                .unwrap();

            assert_eq!(summary.dispatched, batch_size);
            assert_eq!(summary.completed(), batch_size);
            assert_eq!(client.calls.load(Ordering::SeqCst), batch_size);
            // nothing is left running once the batch returned
            assert_eq!(client.in_flight.load(Ordering::SeqCst), 0);
            assert_eq!(agg.len(), batch_size);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn in_flight_never_exceeds_bound() {
        let client = Arc::new(Tracking {
            delay: Duration::from_millis(10),
            ..Default::default()
        });
        let executor = BatchExecutor::builder()
            .batch_size(100)
            .max_concurrent(8)
            .build();

        executor
            .run_batch(&scenario_for(Arc::clone(&client)), &aggregator())
            .await
            .unwrap();

        let peak = client.peak.load(Ordering::SeqCst);
        assert!(peak <= 8, "peak in-flight was {peak}");
        assert!(peak > 1, "trials never overlapped");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failed_trials_are_counted_not_recorded() {
        let client = Arc::new(Tracking {
            delay: Duration::from_millis(1),
            fail_every: Some(3),
            ..Default::default()
        });
        let agg = aggregator();
        let executor = BatchExecutor::builder()
            .batch_size(30)
            .max_concurrent(4)
            .build();

        let summary = executor
            .run_batch(&scenario_for(client), &agg)
            .await
            .unwrap();

        assert_eq!(summary.failed, 10);
        assert_eq!(summary.succeeded, 20);
        assert_eq!(agg.snapshot().observed, 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn every_trial_failing_still_completes() {
        let client = Arc::new(Tracking {
            fail_every: Some(1),
            ..Default::default()
        });
        let agg = aggregator();
        let executor = BatchExecutor::builder().batch_size(5).build();

        let summary = executor
            .run_batch(&scenario_for(client), &agg)
            .await
            .unwrap();

        assert_eq!(summary.failed, 5);
        assert_eq!(summary.sample, None);
        assert!(agg.is_empty());
    }

    #[tokio::test]
    async fn first_dispatched_trial_is_the_sample() {
        let client = Arc::new(Tracking::default());
        let executor = BatchExecutor::builder()
            .batch_size(5)
            .max_concurrent(1)
            .build();

        let summary = executor
            .run_batch(&scenario_for(client), &aggregator())
            .await
            .unwrap();

        // with one permit trials run in dispatch order, so trial 0 made call 1
        let sample = summary.sample.expect("first trial succeeded");
        assert_eq!(sample.matches[0].key, "ad:1");
    }

    async fn explode() -> Trial {
        panic!("boom")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn panicking_trial_is_contained() {
        let scenario = Scenario::builder()
            .name("panics")
            .action(|| async { explode().await })
            .build();
        let executor = BatchExecutor::builder().batch_size(3).build();

        let summary = executor.run_batch(&scenario, &aggregator()).await.unwrap();
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.completed(), 3);
    }

    #[tokio::test]
    async fn zero_concurrency_is_clamped() {
        let client = Arc::new(Tracking::default());
        let executor = BatchExecutor::builder()
            .batch_size(3)
            .max_concurrent(0)
            .build();

        let summary = executor
            .run_batch(&scenario_for(client), &aggregator())
            .await
            .unwrap();
        assert_eq!(summary.succeeded, 3);
    }
}
