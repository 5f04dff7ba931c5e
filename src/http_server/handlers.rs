//! Route handlers. Each wires its cache or barrier behavior explicitly
//! rather than through a generic middleware stack, since the
//! per-route contracts (which header, which namespace, whether a
//! mutation invalidates at all) differ enough to make a one-size
//! wrapper more confusing than the direct call.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::extract_agent;
use crate::invalidation::MutationKind;
use crate::keys::Namespace;
use crate::store::SortKey;

use super::cache_middleware::{read_through, stamp_cache_headers};
use super::errors::HttpError;
use super::state::AppState;
use super::write_middleware::invalidate_under_barrier;

fn bearer_header<'a>(headers: &'a HeaderMap) -> Option<&'a str> {
    headers.get("authorization").and_then(|v| v.to_str().ok())
}

fn overwritten_version_header(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static(""))
}

async fn require_agent(state: &AppState, headers: &HeaderMap) -> Result<String, HttpError> {
    let claim = extract_agent(state.jwt.as_ref(), bearer_header(headers), &state.agent_claim).await?;
    Ok(claim.as_str().to_string())
}

fn created_response(doc: Value) -> Response {
    let location = doc.get("@id").and_then(Value::as_str).unwrap_or_default().to_string();
    let mut response = (StatusCode::CREATED, Json(doc)).into_response();
    if let Ok(value) = location.parse() {
        response.headers_mut().insert(axum::http::header::LOCATION, value);
    }
    response
}

fn updated_response(doc: Value) -> Response {
    let location = doc.get("@id").and_then(Value::as_str).unwrap_or_default().to_string();
    let mut response = (StatusCode::OK, Json(doc)).into_response();
    if let Ok(value) = location.parse() {
        response.headers_mut().insert(axum::http::header::LOCATION, value);
    }
    response
}

// ---- Reads ----

pub async fn get_by_id(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, HttpError> {
    let key = crate::keys::scalar_key(Namespace::Id, &id);
    let store = state.store.clone();
    let (value, hit) = read_through(&state.cache, &key, state.caching_enabled, || async move {
        store.find_one(&id).await?.ok_or_else(|| HttpError::Versioning(crate::versioning::VersioningError::NotFound(id.clone())))
    })
    .await?;

    let overwritten_version = value
        .get("__rerum")
        .and_then(|m| m.get("isOverwritten"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut response = (StatusCode::OK, Json(value)).into_response();
    response
        .headers_mut()
        .insert("current-overwritten-version", overwritten_version_header(&overwritten_version));
    Ok(stamp_cache_headers(response, hit, true))
}

pub async fn get_history(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, HttpError> {
    let key = crate::keys::scalar_key(Namespace::History, &id);
    let store = state.store.clone();
    let (value, hit) = read_through(&state.cache, &key, state.caching_enabled, || async move { lineage_chain(&*store, &id).await }).await?;
    Ok(stamp_cache_headers((StatusCode::OK, Json(value)).into_response(), hit, false))
}

pub async fn get_since(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, HttpError> {
    let key = crate::keys::scalar_key(Namespace::Since, &id);
    let store = state.store.clone();
    let (value, hit) =
        read_through(&state.cache, &key, state.caching_enabled, || async move { descendants_since(&*store, &id).await }).await?;
    Ok(stamp_cache_headers((StatusCode::OK, Json(value)).into_response(), hit, false))
}

async fn lineage_chain(store: &dyn crate::store::DocumentStore, id: &str) -> Result<Value, HttpError> {
    let current = store.find_one(id).await?.ok_or_else(|| HttpError::Versioning(crate::versioning::VersioningError::NotFound(id.to_string())))?;
    let mut chain = vec![current.clone()];

    let mut cursor = crate::versioning::RerumMeta::extract(&current).and_then(|m| m.history.previous);
    while let Some(previous_at_id) = cursor {
        let Some(previous_id) = at_id_to_id(&previous_at_id) else { break };
        let Some(doc) = store.find_one(previous_id).await? else { break };
        cursor = crate::versioning::RerumMeta::extract(&doc).and_then(|m| m.history.previous);
        chain.push(doc);
    }
    chain.reverse();
    Ok(Value::Array(chain))
}

async fn descendants_since(store: &dyn crate::store::DocumentStore, id: &str) -> Result<Value, HttpError> {
    let current = store.find_one(id).await?.ok_or_else(|| HttpError::Versioning(crate::versioning::VersioningError::NotFound(id.to_string())))?;
    let mut descendants = Vec::new();
    let mut frontier = crate::versioning::RerumMeta::extract(&current).map(|m| m.history.next).unwrap_or_default();
    while let Some(next_at_id) = frontier.pop() {
        let Some(next_id) = at_id_to_id(&next_at_id) else { continue };
        let Some(doc) = store.find_one(next_id).await? else { continue };
        frontier.extend(crate::versioning::RerumMeta::extract(&doc).map(|m| m.history.next).unwrap_or_default());
        descendants.push(doc);
    }
    Ok(Value::Array(descendants))
}

fn at_id_to_id(at_id: &str) -> Option<&str> {
    at_id.rsplit('/').next()
}

#[derive(Debug, Deserialize)]
pub struct QueryBody {
    #[serde(default)]
    pub query: Value,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub skip: u64,
}

pub async fn query(State(state): State<AppState>, Json(body): Json<QueryBody>) -> Result<Response, HttpError> {
    let key = crate::keys::structured_key(Namespace::Query, &body.query, body.limit, body.skip);
    let store = state.store.clone();
    let (limit, skip, filter) = (body.limit, body.skip, body.query.clone());
    let (value, hit) = read_through(&state.cache, &key, state.caching_enabled, || async move {
        let docs = store.find(&filter, limit, skip, &Vec::<SortKey>::new()).await?;
        Ok(Value::Array(docs))
    })
    .await?;
    Ok(stamp_cache_headers((StatusCode::OK, Json(value)).into_response(), hit, false))
}

#[derive(Debug, Deserialize)]
pub struct SearchBody {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub skip: u64,
}

async fn search_impl(state: AppState, body: SearchBody, phrase: bool, namespace: Namespace) -> Result<Response, HttpError> {
    let payload = json!({ "q": body.q });
    let key = crate::keys::structured_key(namespace, &payload, body.limit, body.skip);
    let store = state.store.clone();
    let (text, limit, skip) = (body.q.clone(), body.limit, body.skip);
    let (value, hit) = read_through(&state.cache, &key, state.caching_enabled, || async move {
        let docs = store.search(&text, phrase, limit, skip).await?;
        Ok(Value::Array(docs))
    })
    .await?;
    Ok(stamp_cache_headers((StatusCode::OK, Json(value)).into_response(), hit, false))
}

pub async fn search(State(state): State<AppState>, Json(body): Json<SearchBody>) -> Result<Response, HttpError> {
    search_impl(state, body, false, Namespace::Search).await
}

pub async fn search_phrase(State(state): State<AppState>, Json(body): Json<SearchBody>) -> Result<Response, HttpError> {
    search_impl(state, body, true, Namespace::SearchPhrase).await
}

// ---- Writes ----

pub async fn create(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<Value>) -> Result<Response, HttpError> {
    let agent = require_agent(&state, &headers).await?;
    let slug = headers.get("slug").and_then(|v| v.to_str().ok()).map(str::to_string);
    let (doc, event) = state.writer.create(body, Some(agent), slug).await?;
    invalidate_under_barrier(&state, event).await;
    Ok(created_response(doc))
}

pub async fn bulk_create(State(state): State<AppState>, headers: HeaderMap, Json(items): Json<Vec<Value>>) -> Result<Response, HttpError> {
    let agent = require_agent(&state, &headers).await?;
    let mut results = Vec::with_capacity(items.len());
    for item in items {
        match state.writer.create(item, Some(agent.clone()), None).await {
            Ok((doc, event)) => {
                invalidate_under_barrier(&state, event).await;
                results.push(json!({ "ok": true, "document": doc }));
            }
            Err(e) => results.push(json!({ "ok": false, "error": e.to_string() })),
        }
    }
    Ok((StatusCode::CREATED, Json(Value::Array(results))).into_response())
}

pub async fn update(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<Value>) -> Result<Response, HttpError> {
    let agent = require_agent(&state, &headers).await?;
    let id = body.get("_id").and_then(Value::as_str).ok_or_else(|| HttpError::BadRequest("missing _id".to_string()))?.to_string();
    let (doc, event) = state.writer.update(&id, body, &agent).await?;
    invalidate_under_barrier(&state, event).await;
    Ok(updated_response(doc))
}

pub async fn bulk_update(State(state): State<AppState>, headers: HeaderMap, Json(items): Json<Vec<Value>>) -> Result<Response, HttpError> {
    let agent = require_agent(&state, &headers).await?;
    let mut results = Vec::with_capacity(items.len());
    for item in items {
        let Some(id) = item.get("_id").and_then(Value::as_str).map(str::to_string) else {
            results.push(json!({ "ok": false, "error": "missing _id" }));
            continue;
        };
        match state.writer.update(&id, item, &agent).await {
            Ok((doc, event)) => {
                invalidate_under_barrier(&state, event).await;
                results.push(json!({ "ok": true, "document": doc }));
            }
            Err(e) => results.push(json!({ "ok": false, "error": e.to_string() })),
        }
    }
    Ok((StatusCode::OK, Json(Value::Array(results))).into_response())
}

#[derive(Debug, Deserialize)]
pub struct KeyedPayload {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub body: Value,
}

pub async fn patch(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<KeyedPayload>) -> Result<Response, HttpError> {
    let agent = require_agent(&state, &headers).await?;
    let (doc, event) = state.writer.patch(&body.id, body.body, &agent).await?;
    invalidate_under_barrier(&state, event).await;
    Ok(updated_response(doc))
}

pub async fn set(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<KeyedPayload>) -> Result<Response, HttpError> {
    let agent = require_agent(&state, &headers).await?;
    let (doc, event) = state.writer.set(&body.id, body.body, &agent).await?;
    invalidate_under_barrier(&state, event).await;
    Ok(updated_response(doc))
}

pub async fn unset(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<KeyedPayload>) -> Result<Response, HttpError> {
    let agent = require_agent(&state, &headers).await?;
    let (doc, event) = state.writer.unset(&body.id, body.body, &agent).await?;
    invalidate_under_barrier(&state, event).await;
    Ok(updated_response(doc))
}

pub async fn overwrite(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<KeyedPayload>) -> Result<Response, HttpError> {
    let agent = require_agent(&state, &headers).await?;
    let expected_version = headers
        .get("if-overwritten-version")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| body.body.get("__expectedVersion").and_then(Value::as_str).map(str::to_string));

    let (doc, event) = state.writer.overwrite(&body.id, body.body, &agent, expected_version).await?;
    invalidate_under_barrier(&state, event).await;

    let current_version = doc.get("__rerum").and_then(|m| m.get("isOverwritten")).and_then(Value::as_str).unwrap_or_default().to_string();
    let mut response = (StatusCode::OK, Json(doc)).into_response();
    response
        .headers_mut()
        .insert("current-overwritten-version", overwritten_version_header(&current_version));
    Ok(response)
}

pub async fn delete(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<String>) -> Result<Response, HttpError> {
    let agent = require_agent(&state, &headers).await?;
    let event = state.writer.delete(&id, &agent).await?;
    invalidate_under_barrier(&state, event).await;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn release(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<String>) -> Result<Response, HttpError> {
    let agent = require_agent(&state, &headers).await?;
    let (doc, mut event) = state.writer.release(&id, &agent).await?;
    event.kind = MutationKind::Release;
    invalidate_under_barrier(&state, event).await;
    Ok((StatusCode::OK, Json(doc)).into_response())
}

// ---- Cache management ----

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(default)]
    pub details: bool,
}

pub async fn cache_stats(State(state): State<AppState>, Query(q): Query<StatsQuery>) -> Response {
    let snapshot = state.cache.stats();
    let mut body = json!({
        "hits": snapshot.hits,
        "misses": snapshot.misses,
        "sets": snapshot.sets,
        "evictions": snapshot.evictions,
        "invalidations": snapshot.invalidations,
        "length": state.cache.len(),
    });
    if q.details {
        let entries = state
            .cache
            .entries()
            .into_iter()
            .enumerate()
            .map(|(position, e)| {
                json!({
                    "position": position,
                    "key": e.key,
                    "age": e.age.as_millis() as u64,
                    "hits": e.hits,
                    "length": e.key.len(),
                    "bytes": e.size_bytes,
                })
            })
            .collect();
        body["keys"] = Value::Array(entries);
    }
    (StatusCode::OK, Json(body)).into_response()
}

pub async fn cache_clear(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, HttpError> {
    require_agent(&state, &headers).await?;
    state.cache.clear();
    Ok(StatusCode::OK.into_response())
}
