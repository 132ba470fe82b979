use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use qlat::{
    JsonReporter, LatencyReport, OverflowPolicy, PoolConfig, QueryExecutor, Reporter, Result,
    RunConfig, SampleDump, Scenario, StdoutReporter, Vocabulary, WorkloadSource,
    valkey::ValkeyClient,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Latency benchmark for FT.SEARCH vector queries")]
struct Cli {
    /// Cluster node to connect through (`host:port` or `redis://` URL).
    #[arg(long, env = "QLAT_ENDPOINT", default_value = "127.0.0.1:6379")]
    endpoint: String,

    /// Newline-delimited file of search terms.
    #[arg(long, default_value = "search_terms.txt")]
    terms: PathBuf,

    /// Search index to query.
    #[arg(long, default_value = "ad_index")]
    index: String,

    /// Nearest neighbours requested per query.
    #[arg(long, default_value_t = 100)]
    knn: usize,

    /// How long to keep dispatching batches.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "5m")]
    duration: Duration,

    /// Trials per batch.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    batch_size: u64,

    /// Maximum trials in flight at once.
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    max_concurrent: u64,

    /// Latency samples kept for percentiles.
    #[arg(long, default_value_t = 10_000, value_parser = clap::value_parser!(u64).range(1..))]
    capacity: u64,

    /// What to do with samples once the reservoir is full
    /// (reservoir, drop-newest, overwrite-oldest).
    #[arg(long, default_value_t = OverflowPolicy::Reservoir)]
    overflow: OverflowPolicy,

    /// Seed for term selection and reservoir sampling.
    #[arg(long)]
    seed: Option<u64>,

    /// Timeout for establishing the cluster connection.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "5s")]
    connect_timeout: Duration,

    /// Timeout for a single query.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "5s")]
    response_timeout: Duration,

    /// Print reports as JSON instead of text.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    json: bool,
}

impl Cli {
    fn run_config(&self) -> RunConfig {
        RunConfig::builder()
            .duration(self.duration)
            .batch_size(self.batch_size as usize)
            .max_concurrent(self.max_concurrent as usize)
            .capacity(self.capacity as usize)
            .overflow(self.overflow)
            .seed(self.seed)
            .build()
    }

    fn pool_config(&self) -> PoolConfig {
        PoolConfig::builder()
            .connect_timeout(self.connect_timeout)
            .response_timeout(self.response_timeout)
            .build()
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let outcome = if cli.json {
        bench(&cli, &JsonReporter).await
    } else {
        bench(&cli, &StdoutReporter).await
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn bench<R>(cli: &Cli, reporter: &R) -> Result<()>
where
    R: Reporter<SampleDump> + Reporter<LatencyReport>,
{
    let config = cli.run_config();
    tracing::info!("Run config: {}", serde_json::to_string(&config)?);

    let vocabulary = Vocabulary::load(&cli.terms)?;
    let client =
        ValkeyClient::connect(&cli.endpoint, &cli.pool_config(), &cli.index, cli.knn).await?;

    let workload = WorkloadSource::new(vocabulary, config.seed);
    let executor = QueryExecutor::new(client);
    let scenario = Scenario::builder()
        .name(format!("FT.SEARCH {}", cli.index))
        .action(move || {
            let executor = executor.clone();
            let term = workload.next_term();
            async move { executor.execute(term).await }
        })
        .build();

    let aggregator = Arc::new(config.aggregator());
    let summary = config.runner().run(&scenario, &aggregator, reporter).await?;

    Reporter::<LatencyReport>::report(reporter, &LatencyReport::from(summary)).await
}
