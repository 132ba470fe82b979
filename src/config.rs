use serde::Serialize;
use std::time::Duration;
use typed_builder::TypedBuilder;

use crate::{
    aggregate::{LatencyAggregator, OverflowPolicy},
    executor::BatchExecutor,
    runner::Runner,
};

/// Knobs of one benchmark run.
#[derive(Clone, Debug, PartialEq, Serialize, TypedBuilder)]
pub struct RunConfig {
    /// Wall-clock budget of the run.
    #[builder(default = Duration::from_secs(300))]
    pub duration: Duration,
    /// Trials dispatched per batch.
    #[builder(default = 1)]
    pub batch_size: usize,
    /// Upper bound on trials in flight.
    #[builder(default = 1000)]
    pub max_concurrent: usize,
    /// Latency samples retained for percentiles.
    #[builder(default = 10_000)]
    pub capacity: usize,
    #[builder(default)]
    pub overflow: OverflowPolicy,
    /// Seeds term selection and reservoir sampling. Entropy when unset.
    #[builder(default)]
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RunConfig {
    pub fn executor(&self) -> BatchExecutor {
        BatchExecutor::builder()
            .batch_size(self.batch_size)
            .max_concurrent(self.max_concurrent)
            .build()
    }

    pub fn aggregator(&self) -> LatencyAggregator {
        // independent of the term-selection stream
        let seed = self.seed.map(|s| s.wrapping_add(0x9E37_79B9_7F4A_7C15));
        LatencyAggregator::new(self.capacity, self.overflow, seed)
    }

    pub fn runner(&self) -> Runner<BatchExecutor> {
        Runner::builder()
            .duration(self.duration)
            .executor(self.executor())
            .build()
    }
}

/// Connection settings for the query service client.
#[derive(Clone, Debug, PartialEq, Serialize, TypedBuilder)]
pub struct PoolConfig {
    #[builder(default = Duration::from_secs(5))]
    pub connect_timeout: Duration,
    /// Bound on a single query; a call exceeding it fails the trial.
    #[builder(default = Duration::from_secs(5))]
    pub response_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
