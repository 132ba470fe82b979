use parking_lot::Mutex;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;
use std::{fmt, fmt::Debug, str::FromStr, time::Duration};

use crate::metric::{LatencySample, Metric};

/// The `Aggregate` trait defines how raw [`Metric`] values are collected into a
/// representation that can later be summarized by a [`crate::Report`].
///
/// Aggregates take ownership of every metric they consume. They should store the
/// information needed to derive statistics later and leave the derivation itself
/// to snapshot/report code, so the hot path stays a cheap insertion.
///
/// # Example
/// ```rust
/// use qlat::{Aggregate, metric::LatencySample};
///
/// #[derive(Debug, Default)]
/// struct Counter(u64);
///
/// impl Aggregate for Counter {
///     type Metric = LatencySample;
///
///     fn consume(&mut self, _: Self::Metric) {
///         self.0 += 1;
///     }
/// }
/// ```
pub trait Aggregate
where
    Self: Send + Sync + Debug,
{
    /// The metric type this aggregate collects.
    type Metric: Metric;

    /// Incorporate a single metric.
    fn consume(&mut self, metric: Self::Metric);

    /// Incorporate every metric of an iterator, in order.
    fn aggregate<I>(&mut self, metrics: I)
    where
        I: IntoIterator<Item = Self::Metric>,
    {
        metrics.into_iter().for_each(|m| self.consume(m));
    }
}

/// What a full [`Reservoir`] does with an incoming sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Algorithm R: the n-th sample replaces a uniformly chosen slot with
    /// probability `capacity / n`, keeping a uniform sample of the whole run.
    #[default]
    Reservoir,
    /// Keep the first `capacity` samples, discard the rest.
    DropNewest,
    /// Ring buffer: replace the oldest retained sample.
    OverwriteOldest,
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reservoir" => Ok(Self::Reservoir),
            "drop-newest" => Ok(Self::DropNewest),
            "overwrite-oldest" => Ok(Self::OverwriteOldest),
            other => Err(format!(
                "unknown overflow policy '{other}' (expected reservoir, drop-newest or overwrite-oldest)"
            )),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reservoir => "reservoir",
            Self::DropNewest => "drop-newest",
            Self::OverwriteOldest => "overwrite-oldest",
        })
    }
}

/// Capacity-bounded store of latency samples.
///
/// Below capacity every sample is appended. At capacity the [`OverflowPolicy`]
/// decides; `len() <= capacity()` holds after every call. For a given seed and
/// arrival order the retained set is deterministic.
#[derive(Debug)]
pub struct Reservoir {
    capacity: usize,
    policy: OverflowPolicy,
    samples: Vec<Duration>,
    observed: u64,
    // next slot to overwrite under `OverwriteOldest`
    cursor: usize,
    rng: StdRng,
}

impl Reservoir {
    pub fn new(capacity: usize, policy: OverflowPolicy, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            capacity,
            policy,
            // preallocation is capped, larger reservoirs grow on demand
            samples: Vec::with_capacity(capacity.min(1 << 16)),
            observed: 0,
            cursor: 0,
            rng,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of samples ever offered, retained or not.
    pub fn observed(&self) -> u64 {
        self.observed
    }

    pub fn samples(&self) -> &[Duration] {
        &self.samples
    }
}

impl Aggregate for Reservoir {
    type Metric = LatencySample;

    fn consume(&mut self, metric: Self::Metric) {
        self.observed += 1;
        if self.capacity == 0 {
            return;
        }
        if self.samples.len() < self.capacity {
            self.samples.push(metric.0);
            return;
        }

        match self.policy {
            OverflowPolicy::DropNewest => {}
            OverflowPolicy::OverwriteOldest => {
                self.samples[self.cursor] = metric.0;
                self.cursor = (self.cursor + 1) % self.capacity;
            }
            OverflowPolicy::Reservoir => {
                let slot = self.rng.gen_range(0..self.observed);
                if slot < self.capacity as u64 {
                    self.samples[slot as usize] = metric.0;
                }
            }
        }
    }
}

/// Order statistics over the retained samples at one point in time.
///
/// An empty snapshot has `count == 0` and every statistic at `Duration::ZERO`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Retained samples the statistics are computed over.
    pub count: usize,
    /// Samples ever recorded, including those the reservoir let go.
    pub observed: u64,
    pub min: Duration,
    pub max: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub p999: Duration,
}

impl Snapshot {
    pub fn from_samples(mut samples: Vec<Duration>, observed: u64) -> Self {
        if samples.is_empty() {
            return Self {
                observed,
                ..Self::default()
            };
        }
        samples.sort_unstable();
        Self {
            count: samples.len(),
            observed,
            min: samples[0],
            max: samples[samples.len() - 1],
            p95: order_statistic(&samples, 950),
            p99: order_statistic(&samples, 990),
            p999: order_statistic(&samples, 999),
        }
    }
}

/// Value at rank `ceil(per_mille / 1000 * N) - 1` of an ascending slice,
/// clamped to `[0, N - 1]`. Integer arithmetic keeps the rank exact.
pub fn order_statistic(sorted: &[Duration], per_mille: usize) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let n = sorted.len();
    let rank = (per_mille * n).div_ceil(1000).saturating_sub(1).min(n - 1);
    sorted[rank]
}

/// The shared latency sink every concurrent trial reports into.
///
/// `record` and `snapshot` are safe to call from any number of tasks. A
/// snapshot sees each concurrent `record` either entirely or not at all.
#[derive(Debug)]
pub struct LatencyAggregator {
    reservoir: Mutex<Reservoir>,
}

impl LatencyAggregator {
    pub fn new(capacity: usize, policy: OverflowPolicy, seed: Option<u64>) -> Self {
        Self {
            reservoir: Mutex::new(Reservoir::new(capacity, policy, seed)),
        }
    }

    pub fn record(&self, sample: LatencySample) {
        self.reservoir.lock().consume(sample);
    }

    /// Copies the retained samples under the lock and sorts outside of it.
    pub fn snapshot(&self) -> Snapshot {
        let (samples, observed) = {
            let reservoir = self.reservoir.lock();
            (reservoir.samples().to_vec(), reservoir.observed())
        };
        Snapshot::from_samples(samples, observed)
    }

    pub fn len(&self) -> usize {
        self.reservoir.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservoir.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.reservoir.lock().capacity()
    }
}
