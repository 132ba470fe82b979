//! qlat, a concurrent latency benchmark for search services.
//!
//! qlat drives a query service with randomized load for a fixed time budget and
//! reports order statistics (min, max, p95, p99, p99.9) of the query latencies.
//! The service itself is an opaque collaborator behind the [`QueryClient`] trait;
//! a Valkey/Redis cluster client speaking `FT.SEARCH` ships behind the `valkey`
//! feature.
//!
//! # Architecture
//!
//! The main building blocks are:
//!
//! - [`WorkloadSource`]: hands out query terms drawn uniformly from a fixed
//!   [`Vocabulary`].
//! - [`QueryExecutor`]: runs one query, times it, and wraps the outcome into a
//!   [`Trial`].
//! - [`Scenario`]: the named action a run repeats, usually "pick a term, execute it".
//! - [`Executor`]: runs one batch of trials with bounded concurrency and joins all
//!   of them before returning. The built-in [`BatchExecutor`] uses a semaphore.
//! - [`LatencyAggregator`]: a fixed-capacity [`Reservoir`] of latency samples that
//!   any number of trials record into concurrently.
//! - [`Runner`]: owns the time budget and drives batches until the deadline.
//! - [`Report`] / [`Reporter`]: turn the results into text or JSON and print them.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use qlat::{
//!     LatencyReport, QueryClient, QueryExecutor, QueryResult, Reporter, Result, RunConfig,
//!     Scenario, StdoutReporter, Vocabulary, WorkloadSource,
//! };
//!
//! struct Service;
//!
//! impl QueryClient for Service {
//!     async fn submit_query(&self, term: &str) -> Result<QueryResult> {
//!         Ok(QueryResult { total: term.len() as i64, matches: vec![] })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = RunConfig::default();
//!     let workload = WorkloadSource::new(Vocabulary::parse("cat\ndog\n")?, config.seed);
//!     // Build clients once, outside the action: the action is what gets timed.
//!     let executor = QueryExecutor::new(Service);
//!
//!     let scenario = Scenario::builder()
//!         .name("example")
//!         .action(move || {
//!             let executor = executor.clone();
//!             let term = workload.next_term();
//!             async move { executor.execute(term).await }
//!         })
//!         .build();
//!
//!     let aggregator = Arc::new(config.aggregator());
//!     let summary = config.runner().run(&scenario, &aggregator, &StdoutReporter).await?;
//!     StdoutReporter.report(&LatencyReport::from(summary)).await
//! }
//! ```
//!
//! # Feature flags
//!
//! - `valkey`: the [`valkey::ValkeyClient`] and the `qlat` binary. (Enabled by default)

/// Latency reservoir and order statistics
pub mod aggregate;
/// The query service seam
pub mod client;
/// Run and connection settings
pub mod config;
mod error;
/// Bounded fan-out/fan-in of trials
pub mod executor;
/// Single measurements
pub mod metric;
/// Reports and Reporters
pub mod report;
/// Time-budgeted batch loop
pub mod runner;
/// The repeated action of a run
pub mod scenario;
/// Timed single queries
pub mod trial;
#[cfg(feature = "valkey")]
pub mod valkey;
/// Query terms and their random selection
pub mod workload;

pub use aggregate::{Aggregate, LatencyAggregator, OverflowPolicy, Reservoir, Snapshot};
pub use client::{Match, QueryClient, QueryResult};
pub use config::{PoolConfig, RunConfig};
pub use error::{Error, Result};
pub use executor::{BatchExecutor, BatchSummary, Executor};
pub use metric::{LatencySample, Metric};
pub use report::{JsonReporter, LatencyReport, Report, Reporter, SampleDump, StdoutReporter};
pub use runner::{RunSummary, RunWindow, Runner};
pub use scenario::Scenario;
pub use trial::{Outcome, QueryExecutor, Trial};
pub use workload::{Term, Vocabulary, WorkloadSource};
