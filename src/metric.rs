use std::time::Duration;

/// A `Metric` is a single observed measurement produced by one trial.
///
/// Metrics are the most granular level of data in a run. They are handed to an
/// [`crate::Aggregate`] which owns them from then on, and are finally summarized
/// by a [`crate::Report`].
///
/// ## Design principles
/// - **Single owner:** a metric moves from the trial that produced it into the
///   aggregate; nothing else keeps a copy around.
/// - **Comparable:** metrics must support [`PartialEq`] and [`PartialOrd`] so order
///   statistics can be computed over them.
/// - **Thread-safe:** metrics cross task boundaries and must be `Send` and `Sync`.
///
/// ## Example
/// ```rust
/// use qlat::Metric;
/// use std::time::Duration;
///
/// #[derive(Clone, PartialOrd, PartialEq)]
/// struct QueueWait(Duration);
///
/// impl Metric for QueueWait {}
/// ```
pub trait Metric
where
    Self: PartialOrd + PartialEq + Send + Sync + Clone,
{
}

/// Wall-clock latency of one successful query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LatencySample(pub Duration);

impl From<Duration> for LatencySample {
    fn from(value: Duration) -> Self {
        Self(value)
    }
}

impl Metric for LatencySample {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_order_by_latency() {
        let mut samples: Vec<LatencySample> = [30, 5, 12]
            .into_iter()
            .map(|ms| Duration::from_millis(ms).into())
            .collect();
        samples.sort();
        assert_eq!(samples[0], LatencySample(Duration::from_millis(5)));
        assert_eq!(samples[2], LatencySample(Duration::from_millis(30)));
    }
}
