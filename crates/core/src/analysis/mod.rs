//! Analytical queries (C10): complexity, dead-code, security, hotspots, and
//! codebase-map reports computed over a resolved [`ParseResult`]. Each
//! report is a pure function of its inputs; [`cached`] wraps one behind the
//! [`Cache`] component with the 5-minute TTL spec.md calls for.

pub mod codebase_map;
pub mod complexity;
pub mod dead_code;
pub mod dependency_graph;
pub mod hotspots;
pub mod security;

use serde::{Deserialize, Serialize};

use crate::cache::Cache;
use crate::error::OrcResult;

const DEFAULT_ANALYSIS_TTL: u64 = 300;

/// Runs `compute` only on a cache miss for `key`, otherwise returns the
/// cached value. Analytical reports have no single source file to key
/// mtime-invalidation off of, so entries rely on the 5-minute TTL alone —
/// callers that mutate the index should call `cache.invalidate(None)`.
pub fn cached<T, F>(cache: &mut Cache, key: &str, compute: F) -> OrcResult<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
    F: FnOnce() -> T,
{
    if let Some(value) = cache.get::<T>(key) {
        return Ok(value);
    }
    let value = compute();
    cache.set(key, &value, Some(DEFAULT_ANALYSIS_TTL), None)?;
    Ok(value)
}
