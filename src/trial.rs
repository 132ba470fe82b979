use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    client::{QueryClient, QueryResult},
    metric::LatencySample,
    workload::Term,
};

/// How a trial ended.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Success { count: i64, raw: QueryResult },
    Failure { cause: String },
}

/// One query-and-measure attempt.
#[derive(Clone, Debug)]
pub struct Trial {
    pub term: Term,
    pub started_at: Instant,
    pub elapsed: Duration,
    pub outcome: Outcome,
}

impl Trial {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    /// Failed trials have no latency worth aggregating.
    pub fn latency(&self) -> Option<LatencySample> {
        self.is_success().then(|| self.elapsed.into())
    }

    /// Splits the trial into its latency sample and raw result set, consuming it.
    pub fn into_parts(self) -> Option<(LatencySample, QueryResult)> {
        match self.outcome {
            Outcome::Success { raw, .. } => Some((self.elapsed.into(), raw)),
            Outcome::Failure { .. } => None,
        }
    }
}

/// Runs single queries against the collaborator and times them.
///
/// Never retries: a failed call is reported once and returned as-is.
pub struct QueryExecutor<C> {
    client: Arc<C>,
}

impl<C> Clone for QueryExecutor<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
        }
    }
}

impl<C: QueryClient> QueryExecutor<C> {
    pub fn new(client: C) -> Self {
        Self::from_shared(Arc::new(client))
    }

    pub fn from_shared(client: Arc<C>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub async fn execute(&self, term: Term) -> Trial {
        let started_at = Instant::now();
        let result = self.client.submit_query(&term).await;
        let elapsed = started_at.elapsed();

        let outcome = match result {
            Ok(raw) => {
                tracing::debug!("Query '{term}' returned {} results in {elapsed:?}", raw.total);
                Outcome::Success {
                    count: raw.total,
                    raw,
                }
            }
            Err(e) => {
                tracing::warn!("Query '{term}' failed after {elapsed:?}: {e}");
                Outcome::Failure {
                    cause: e.to_string(),
                }
            }
        };

        Trial {
            term,
            started_at,
            elapsed,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Result, client::Match};

    struct Echo;

    impl QueryClient for Echo {
        async fn submit_query(&self, term: &str) -> Result<QueryResult> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(QueryResult {
                total: term.len() as i64,
                matches: vec![Match {
                    key: format!("ad:{term}"),
                    fields: vec![("search_term".into(), term.into())],
                }],
            })
        }
    }

    struct Down;

    impl QueryClient for Down {
        async fn submit_query(&self, _: &str) -> Result<QueryResult> {
            Err(Error::Query("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn success_carries_count_and_latency() {
        let trial = QueryExecutor::new(Echo).execute("book".into()).await;

        assert!(trial.is_success());
        assert!(trial.elapsed >= Duration::from_millis(5));
        assert_eq!(trial.latency(), Some(LatencySample(trial.elapsed)));
        match &trial.outcome {
            Outcome::Success { count, raw } => {
                assert_eq!(*count, 4);
                assert_eq!(raw.matches[0].key, "ad:book");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn failure_has_no_latency() {
        let trial = QueryExecutor::new(Down).execute("book".into()).await;

        assert!(!trial.is_success());
        assert_eq!(trial.latency(), None);
        assert_eq!(
            trial.outcome,
            Outcome::Failure {
                cause: "query failed: connection refused".into()
            }
        );
        assert!(trial.into_parts().is_none());
    }

    #[tokio::test]
    async fn clones_share_the_client() {
        let executor = QueryExecutor::new(Echo);
        let twin = executor.clone();
        assert!(Arc::ptr_eq(executor.client(), twin.client()));
    }
}
