use std::path::PathBuf;

/// Everything that can go wrong while setting up or driving a benchmark run.
///
/// Setup failures (`Connection`, `EmptyVocabulary`, `Io`) are fatal and end the
/// process. `Query` is per-trial: the executor turns it into a failed
/// [`crate::trial::Outcome`] and the run carries on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    #[error("no usable terms in the workload vocabulary")]
    EmptyVocabulary,

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("query failed: {0}")]
    Query(String),

    /// The in-flight permit pool was closed while a batch was dispatching.
    #[error("trial scheduler closed: {0}")]
    Scheduler(#[from] tokio::sync::AcquireError),

    #[error("failed to render report: {0}")]
    Report(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
