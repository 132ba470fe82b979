//! The query service as seen by the benchmark: an opaque, thread-safe handle
//! that answers one search per call.

use serde::Serialize;
use std::future::Future;

use crate::error::Result;

/// One document returned by a search: its key and the requested fields as
/// name/value pairs, in reply order.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Serialize)]
pub struct Match {
    pub key: String,
    pub fields: Vec<(String, String)>,
}

/// The raw result set of one search.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Serialize)]
pub struct QueryResult {
    /// Total matches reported by the service, which may exceed `matches.len()`.
    pub total: i64,
    pub matches: Vec<Match>,
}

/// A connected handle to the query service.
///
/// Implementations must tolerate concurrent `submit_query` calls from many
/// tasks; the benchmark shares one handle and adds no locking of its own.
/// Errors should be reported as [`crate::Error::Query`].
pub trait QueryClient
where
    Self: Send + Sync + 'static,
{
    fn submit_query(&self, term: &str) -> impl Future<Output = Result<QueryResult>> + Send;
}
