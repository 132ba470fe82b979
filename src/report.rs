use serde::Serialize;
use std::{
    fmt::{self, Debug, Display},
    future::Future,
    time::Duration,
};

use crate::{
    client::{Match, QueryResult},
    error::Result,
    runner::RunSummary,
};

/// A [`Report`] is the processed, presentable form of something a run produced.
///
/// Reports are pure data: they are derived from run results (usually via a
/// `From` impl), carry no I/O, and can be rendered as text through [`Display`]
/// or as structured data through [`Serialize`]. A [`Reporter`] decides which.
pub trait Report
where
    Self: Send + Sync + Debug + Display + Serialize,
{
}

/// A [`Reporter`] consumes a [`Report`] and performs the side effect: printing
/// it, writing it to a file, shipping it to a service.
///
/// # Example
/// ```rust
/// use qlat::{Report, Reporter, Result};
///
/// struct Quiet;
///
/// impl<R: Report> Reporter<R> for Quiet {
///     async fn report(&self, report: &R) -> Result<()> {
///         let _ = format!("{report}");
///         Ok(())
///     }
/// }
/// ```
pub trait Reporter<R: Report> {
    fn report(&self, report: &R) -> impl Future<Output = Result<()>> + Send;
}

/// The one-time dump of a raw result set for manual spot checks.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SampleDump {
    pub total: i64,
    pub matches: Vec<Match>,
}

impl From<QueryResult> for SampleDump {
    fn from(value: QueryResult) -> Self {
        Self {
            total: value.total,
            matches: value.matches,
        }
    }
}

impl Display for SampleDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Sample Search Results for Verification (First Batch, First Search):"
        )?;
        write!(f, "Total Results: {}", self.total)?;
        for m in &self.matches {
            write!(f, "\nKey: {}, Fields: [", m.key)?;
            for (i, (name, value)) in m.fields.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{name}={value}")?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

impl Report for SampleDump {}

/// Final latency statistics of a run.
///
/// Durations serialize as fractional milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LatencyReport {
    /// Samples the percentiles are computed over.
    pub count: usize,
    /// Successful trials recorded, including any the reservoir let go.
    pub observed: u64,
    pub succeeded: usize,
    pub failed: usize,
    pub batches: usize,
    #[serde(rename = "elapsed_ms", serialize_with = "millis")]
    pub elapsed: Duration,
    /// Successful queries per second of wall time.
    pub throughput: f64,
    #[serde(rename = "min_ms", serialize_with = "millis")]
    pub min: Duration,
    #[serde(rename = "max_ms", serialize_with = "millis")]
    pub max: Duration,
    #[serde(rename = "p95_ms", serialize_with = "millis")]
    pub p95: Duration,
    #[serde(rename = "p99_ms", serialize_with = "millis")]
    pub p99: Duration,
    #[serde(rename = "p999_ms", serialize_with = "millis")]
    pub p999: Duration,
}

fn millis<S>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(value.as_secs_f64() * 1000.0)
}

impl From<RunSummary> for LatencyReport {
    fn from(value: RunSummary) -> Self {
        let secs = value.elapsed.as_secs_f64();
        let throughput = if secs > 0.0 {
            value.succeeded as f64 / secs
        } else {
            0.0
        };
        let snapshot = value.snapshot;
        Self {
            count: snapshot.count,
            observed: snapshot.observed,
            succeeded: value.succeeded,
            failed: value.failed,
            batches: value.batches,
            elapsed: value.elapsed,
            throughput,
            min: snapshot.min,
            max: snapshot.max,
            p95: snapshot.p95,
            p99: snapshot.p99,
            p999: snapshot.p999,
        }
    }
}

impl Display for LatencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "------------------ Latency ------------------")?;
        writeln!(f, "Count:\t\t{}", self.count)?;
        writeln!(f, "Max:\t\t{:?}", self.max)?;
        writeln!(f, "Min:\t\t{:?}", self.min)?;
        writeln!(f, "P95:\t\t{:?}", self.p95)?;
        writeln!(f, "P99:\t\t{:?}", self.p99)?;
        writeln!(f, "P99.9:\t\t{:?}", self.p999)?;
        writeln!(f, "------------------- Run ---------------------")?;
        writeln!(f, "Batches:\t{}", self.batches)?;
        writeln!(f, "Succeeded:\t{}", self.succeeded)?;
        writeln!(f, "Failed:\t\t{}", self.failed)?;
        writeln!(f, "Observed:\t{}", self.observed)?;
        writeln!(f, "Elapsed:\t{:?}", self.elapsed)?;
        write!(f, "Throughput:\t{:.2} q/s", self.throughput)
    }
}

impl Report for LatencyReport {}

/// Prints reports as human-readable text on stdout.
pub struct StdoutReporter;

impl<R: Report> Reporter<R> for StdoutReporter {
    async fn report(&self, report: &R) -> Result<()> {
        println!("{report}");
        Ok(())
    }
}

/// Prints reports as pretty JSON on stdout, one document per report.
pub struct JsonReporter;

impl<R: Report> Reporter<R> for JsonReporter {
    async fn report(&self, report: &R) -> Result<()> {
        let value = serde_json::to_string_pretty(report)?;
        println!("{value}");
        Ok(())
    }
}
