//! Read-route cache wrapping: build key, `get`, serve on hit; on miss,
//! run the handler's fetch and `set` the result.

use std::future::Future;

use axum::http::HeaderValue;
use axum::response::Response;
use serde_json::Value;

use crate::cache::ClusterCache;

use super::errors::HttpError;

pub const HEADER_CACHE: &str = "x-cache";
pub const HEADER_CACHE_CONTROL: &str = "cache-control";
pub const ID_ROUTE_CACHE_CONTROL: &str = "max-age=86400, must-revalidate";

/// Serve `key` from `cache` if present; otherwise run `compute`, cache
/// its result, and return it. The bool indicates whether it was a hit.
///
/// With `enabled = false` (the `CACHING` env var), the cache is
/// bypassed entirely: every read recomputes and nothing is stored.
pub async fn read_through<F, Fut>(
    cache: &ClusterCache,
    key: &str,
    enabled: bool,
    compute: F,
) -> Result<(Value, bool), HttpError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, HttpError>>,
{
    if enabled {
        if let Some(hit) = cache.get(key) {
            return Ok((hit, true));
        }
    }
    let value = compute().await?;
    if enabled {
        cache.set(key.to_string(), value.clone());
    }
    Ok((value, false))
}

/// Stamp the `X-Cache` header (and, for `/id/{_id}`, `Cache-Control`)
/// on an otherwise-built response.
pub fn stamp_cache_headers(mut response: Response, hit: bool, is_id_route: bool) -> Response {
    let value = if hit { "HIT" } else { "MISS" };
    response.headers_mut().insert(HEADER_CACHE, HeaderValue::from_static(value));
    if is_id_route {
        response
            .headers_mut()
            .insert(HEADER_CACHE_CONTROL, HeaderValue::from_static(ID_ROUTE_CACHE_CONTROL));
    }
    response
}
