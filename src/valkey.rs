//! Valkey/Redis cluster client issuing KNN vector searches with `FT.SEARCH`.
//!
//! Each term is turned into a query vector deterministically, so the same term
//! always produces the same search. The vector comes from `rand`'s `StdRng`
//! seeded with the term's FNV-1a hash; other tools hashing the same way but
//! using a different generator will not produce the same vector. The reply is kept raw: keys plus the
//! returned field/value pairs, with no scoring applied.

use rand::{Rng, SeedableRng, rngs::StdRng};
use redis::{Value, cluster::ClusterClientBuilder, cluster_async::ClusterConnection};

use crate::{
    client::{Match, QueryClient, QueryResult},
    config::PoolConfig,
    error::{Error, Result},
};

/// Dimensions of the indexed embeddings.
pub const VECTOR_DIM: usize = 128;

/// Fields requested for every match.
pub const RETURN_FIELDS: [&str; 5] = [
    "expected_ctr",
    "ad_relevance",
    "landing_experience",
    "sim_score",
    "search_term",
];

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// A shared, multiplexed cluster connection.
pub struct ValkeyClient {
    conn: ClusterConnection,
    index: String,
    knn: usize,
}

impl ValkeyClient {
    /// Opens a cluster connection through `endpoint` and pings it.
    pub async fn connect(
        endpoint: &str,
        pool: &PoolConfig,
        index: impl Into<String>,
        knn: usize,
    ) -> Result<Self> {
        let connection_error = |e: redis::RedisError| Error::Connection {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        };

        let client = ClusterClientBuilder::new(vec![node_url(endpoint)])
            .connection_timeout(pool.connect_timeout)
            .response_timeout(pool.response_timeout)
            .build()
            .map_err(connection_error)?;
        let mut conn = client
            .get_async_connection()
            .await
            .map_err(connection_error)?;
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(connection_error)?;
        tracing::info!("Connected to {endpoint} ({pong})");

        Ok(Self {
            conn,
            index: index.into(),
            knn,
        })
    }
}

impl QueryClient for ValkeyClient {
    async fn submit_query(&self, term: &str) -> Result<QueryResult> {
        let mut cmd = redis::cmd("FT.SEARCH");
        cmd.arg(&self.index)
            .arg(format!("*=>[KNN {} @vector $vec AS sim_score]", self.knn))
            .arg("PARAMS")
            .arg(2)
            .arg("vec")
            .arg(query_vector(term))
            .arg("DIALECT")
            .arg(2)
            .arg("RETURN")
            .arg(RETURN_FIELDS.len());
        for field in RETURN_FIELDS {
            cmd.arg(field);
        }

        // the connection multiplexes; clones share it
        let mut conn = self.conn.clone();
        let reply: Value = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Query(e.to_string()))?;
        parse_search_reply(reply)
    }
}

/// Accepts both `host:port` and full `redis://` / `rediss://` URLs.
fn node_url(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("redis://{endpoint}")
    }
}

/// FNV-1a, 64 bit.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

/// Little-endian `f32` vector of [`VECTOR_DIM`] components in `[-1, 1)`, seeded
/// from the term's hash.
pub fn query_vector(term: &str) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(fnv1a(term.as_bytes()));
    (0..VECTOR_DIM)
        .flat_map(|_| rng.gen_range(-1.0f32..1.0).to_le_bytes())
        .collect()
}

/// Reads `[total, key, [name, value, ...], key, [...], ...]`.
pub fn parse_search_reply(reply: Value) -> Result<QueryResult> {
    let items = match reply {
        Value::Array(items) => items,
        other => return Err(malformed("reply", &other)),
    };
    let mut items = items.into_iter();

    let total = match items.next() {
        Some(Value::Int(total)) => total,
        Some(other) => return Err(malformed("total", &other)),
        None => return Ok(QueryResult::default()),
    };

    let mut matches = Vec::new();
    while let Some(key) = items.next() {
        let key = text(key)?;
        let fields = match items.next() {
            Some(Value::Array(raw)) => field_pairs(raw)?,
            Some(other) => return Err(malformed("fields", &other)),
            None => Vec::new(),
        };
        matches.push(Match { key, fields });
    }

    Ok(QueryResult { total, matches })
}

fn field_pairs(raw: Vec<Value>) -> Result<Vec<(String, String)>> {
    let mut raw = raw.into_iter();
    let mut pairs = Vec::new();
    while let Some(name) = raw.next() {
        let value = raw.next().map(text).transpose()?.unwrap_or_default();
        pairs.push((text(name)?, value));
    }
    Ok(pairs)
}

fn text(value: Value) -> Result<String> {
    match value {
        Value::BulkString(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Value::SimpleString(s) => Ok(s),
        Value::Int(n) => Ok(n.to_string()),
        Value::Double(d) => Ok(d.to_string()),
        other => Err(malformed("text", &other)),
    }
}

fn malformed(what: &str, value: &Value) -> Error {
    Error::Query(format!("unexpected {what} in FT.SEARCH reply: {value:?}"))
}
