//! End-to-end HTTP tests driving the real axum `Router` in-process via
//! `tower::ServiceExt::oneshot`. Covers cache freshness, query-aware
//! invalidation, search's unconditional invalidation, optimistic-locked
//! overwrite, delete/lineage rewiring, and auth rejection.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

use rerum_core::cache::CacheConfig;
use rerum_core::http_server::{build_router, router_for_state, HttpConfig};
use rerum_core::store::InMemoryStore;

const SECRET: &str = "test-secret";

fn config() -> HttpConfig {
    HttpConfig {
        port: 0,
        id_prefix: "http://test.example/id/".to_string(),
        jwt_secret: SECRET.to_string(),
        worker_count: 1,
        invalidation_timeout: Duration::from_secs(2),
        cache: CacheConfig::new(1_000, 10_000_000, Duration::from_secs(300)).unwrap(),
        caching_enabled: true,
        mongo_connection_string: None,
        agent_claim: "agent".to_string(),
        jwks_uri: None,
        audience: None,
        issuer: None,
    }
}

fn app() -> Router {
    let store = Arc::new(InMemoryStore::new());
    build_router(&config(), store).0
}

fn agent_token(agent: &str) -> String {
    #[derive(serde::Serialize)]
    struct Claims<'a> {
        sub: &'a str,
        exp: usize,
        agent: &'a str,
    }
    let claims = Claims { sub: "tester", exp: 9_999_999_999, agent };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

fn authed(method: &str, uri: &str, agent: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", agent_token(agent)))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn anon(method: &str, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn create_then_get_round_trips_and_caches() {
    let app = app();

    let create_req = authed("POST", "/api/create", "http://test.example/agent/1", json!({"label": "hello"}));
    let create_resp = app.clone().oneshot(create_req).await.unwrap();
    assert_eq!(create_resp.status(), StatusCode::CREATED);
    let created = json_body(create_resp).await;
    let id = created["_id"].as_str().unwrap().to_string();

    let first = app.clone().oneshot(anon("GET", &format!("/id/{id}"))).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers().get("x-cache").unwrap(), "MISS");
    let first_body = json_body(first).await;
    assert_eq!(first_body["label"], "hello");

    let second = app.clone().oneshot(anon("GET", &format!("/id/{id}"))).await.unwrap();
    assert_eq!(second.headers().get("x-cache").unwrap(), "HIT");
}

#[tokio::test]
async fn create_requires_bearer_token() {
    let app = app();
    let req = Request::builder()
        .method("POST")
        .uri("/api/create")
        .header("content-type", "application/json")
        .body(Body::from(json!({"label": "nope"}).to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn update_creates_new_version_with_its_own_uncached_id() {
    let app = app();
    let agent = "http://test.example/agent/2";

    let created = json_body(
        app.clone().oneshot(authed("POST", "/api/create", agent, json!({"label": "v1"}))).await.unwrap(),
    )
    .await;
    let id = created["_id"].as_str().unwrap().to_string();

    // Warm the cache for the root version and its history, both of
    // which an update must invalidate: the root's own `__rerum.history`
    // gains a `next` pointer, even though its user fields don't change.
    let warm = app.clone().oneshot(anon("GET", &format!("/id/{id}"))).await.unwrap();
    assert_eq!(warm.headers().get("x-cache").unwrap(), "MISS");
    let warm_again = app.clone().oneshot(anon("GET", &format!("/id/{id}"))).await.unwrap();
    assert_eq!(warm_again.headers().get("x-cache").unwrap(), "HIT");
    let history_warm = app.clone().oneshot(anon("GET", &format!("/history/{id}"))).await.unwrap();
    assert_eq!(history_warm.headers().get("x-cache").unwrap(), "MISS");
    let history_warm_again = app.clone().oneshot(anon("GET", &format!("/history/{id}"))).await.unwrap();
    assert_eq!(history_warm_again.headers().get("x-cache").unwrap(), "HIT");

    let update_req = authed("PUT", "/api/update", agent, json!({"_id": id, "label": "v2"}));
    let update_resp = app.clone().oneshot(update_req).await.unwrap();
    assert_eq!(update_resp.status(), StatusCode::OK);
    let updated = json_body(update_resp).await;
    let new_id = updated["_id"].as_str().unwrap().to_string();
    assert_ne!(new_id, id);
    assert_eq!(updated["label"], "v2");

    let fresh = app.clone().oneshot(anon("GET", &format!("/id/{new_id}"))).await.unwrap();
    assert_eq!(fresh.headers().get("x-cache").unwrap(), "MISS");

    // The root id's own cached `/id` and `/history` entries must also
    // go stale: its `__rerum.history.next` now points at the new version.
    let root_after_update = app.clone().oneshot(anon("GET", &format!("/id/{id}"))).await.unwrap();
    assert_eq!(root_after_update.headers().get("x-cache").unwrap(), "MISS");
    let history_after_update = app.clone().oneshot(anon("GET", &format!("/history/{id}"))).await.unwrap();
    assert_eq!(history_after_update.headers().get("x-cache").unwrap(), "MISS");
}

#[tokio::test]
async fn query_cache_invalidates_on_matching_write() {
    let app = app();
    let agent = "http://test.example/agent/3";

    app.clone()
        .oneshot(authed("POST", "/api/create", agent, json!({"type": "Annotation", "tag": "alpha"})))
        .await
        .unwrap();

    let query_body = json!({"query": {"tag": "alpha"}, "limit": 0, "skip": 0});
    let first = app
        .clone()
        .oneshot(Request::builder().method("POST").uri("/api/query").header("content-type", "application/json").body(Body::from(query_body.to_string())).unwrap())
        .await
        .unwrap();
    assert_eq!(first.headers().get("x-cache").unwrap(), "MISS");
    let first_results = json_body(first).await;
    assert_eq!(first_results.as_array().unwrap().len(), 1);

    let second = app
        .clone()
        .oneshot(Request::builder().method("POST").uri("/api/query").header("content-type", "application/json").body(Body::from(query_body.to_string())).unwrap())
        .await
        .unwrap();
    assert_eq!(second.headers().get("x-cache").unwrap(), "HIT");

    // Creating a second document matching the same predicate must
    // invalidate the cached query result.
    app.clone()
        .oneshot(authed("POST", "/api/create", agent, json!({"type": "Annotation", "tag": "alpha"})))
        .await
        .unwrap();

    let third = app
        .clone()
        .oneshot(Request::builder().method("POST").uri("/api/query").header("content-type", "application/json").body(Body::from(query_body.to_string())).unwrap())
        .await
        .unwrap();
    assert_eq!(third.headers().get("x-cache").unwrap(), "MISS");
    let third_results = json_body(third).await;
    assert_eq!(third_results.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn search_cache_invalidates_unconditionally_on_any_write() {
    let app = app();
    let agent = "http://test.example/agent/4";

    app.clone()
        .oneshot(authed("POST", "/api/create", agent, json!({"body": "quick brown fox"})))
        .await
        .unwrap();

    let search_body = json!({"q": "fox", "limit": 0, "skip": 0});
    let first = app
        .clone()
        .oneshot(Request::builder().method("POST").uri("/api/search").header("content-type", "application/json").body(Body::from(search_body.to_string())).unwrap())
        .await
        .unwrap();
    assert_eq!(first.headers().get("x-cache").unwrap(), "MISS");

    let second = app
        .clone()
        .oneshot(Request::builder().method("POST").uri("/api/search").header("content-type", "application/json").body(Body::from(search_body.to_string())).unwrap())
        .await
        .unwrap();
    assert_eq!(second.headers().get("x-cache").unwrap(), "HIT");

    // A write with no field matching the search text still evicts the
    // cached search result, since full-text queries have no predicate
    // to evaluate against the mutated document.
    app.clone()
        .oneshot(authed("POST", "/api/create", agent, json!({"body": "unrelated content"})))
        .await
        .unwrap();

    let third = app
        .clone()
        .oneshot(Request::builder().method("POST").uri("/api/search").header("content-type", "application/json").body(Body::from(search_body.to_string())).unwrap())
        .await
        .unwrap();
    assert_eq!(third.headers().get("x-cache").unwrap(), "MISS");
}

#[tokio::test]
async fn overwrite_rejects_stale_expected_version() {
    let app = app();
    let agent = "http://test.example/agent/5";

    let created = json_body(
        app.clone().oneshot(authed("POST", "/api/create", agent, json!({"label": "v1"}))).await.unwrap(),
    )
    .await;
    let id = created["_id"].as_str().unwrap().to_string();

    let req = Request::builder()
        .method("PUT")
        .uri("/api/overwrite")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", agent_token(agent)))
        .header("if-overwritten-version", "bogus")
        .body(Body::from(json!({"_id": id, "label": "v2"}).to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body = json_body(resp).await;
    assert_eq!(body["currentVersion"], "");
}

#[tokio::test]
async fn overwrite_mutates_in_place() {
    let app = app();
    let agent = "http://test.example/agent/6";

    let created = json_body(
        app.clone().oneshot(authed("POST", "/api/create", agent, json!({"label": "v1"}))).await.unwrap(),
    )
    .await;
    let id = created["_id"].as_str().unwrap().to_string();

    let warm = app.clone().oneshot(anon("GET", &format!("/id/{id}"))).await.unwrap();
    assert_eq!(warm.headers().get("x-cache").unwrap(), "MISS");
    let warm_again = app.clone().oneshot(anon("GET", &format!("/id/{id}"))).await.unwrap();
    assert_eq!(warm_again.headers().get("x-cache").unwrap(), "HIT");

    let overwrite_resp = app
        .clone()
        .oneshot(authed("PUT", "/api/overwrite", agent, json!({"_id": id, "label": "v2"})))
        .await
        .unwrap();
    assert_eq!(overwrite_resp.status(), StatusCode::OK);
    let overwritten = json_body(overwrite_resp).await;
    assert_eq!(overwritten["_id"], id);
    assert_eq!(overwritten["label"], "v2");

    // Overwrite mutates the same _id in place, so the cached read must
    // be invalidated and reflect the new content on the next GET.
    let after = app.clone().oneshot(anon("GET", &format!("/id/{id}"))).await.unwrap();
    assert_eq!(after.headers().get("x-cache").unwrap(), "MISS");
    let after_body = json_body(after).await;
    assert_eq!(after_body["label"], "v2");
}

#[tokio::test]
async fn delete_tombstones_and_rewires_lineage_visible_through_history_and_since() {
    let app = app();
    let agent = "http://test.example/agent/7";

    let root = json_body(
        app.clone().oneshot(authed("POST", "/api/create", agent, json!({"label": "v1"}))).await.unwrap(),
    )
    .await;
    let root_id = root["_id"].as_str().unwrap().to_string();

    let mid = json_body(
        app.clone().oneshot(authed("PUT", "/api/update", agent, json!({"_id": root_id, "label": "v2"}))).await.unwrap(),
    )
    .await;
    let mid_id = mid["_id"].as_str().unwrap().to_string();

    let leaf = json_body(
        app.clone().oneshot(authed("PUT", "/api/update", agent, json!({"_id": mid_id, "label": "v3"}))).await.unwrap(),
    )
    .await;
    let leaf_id = leaf["_id"].as_str().unwrap().to_string();

    let delete_resp = app
        .clone()
        .oneshot(Request::builder()
            .method("DELETE")
            .uri(format!("/api/delete/{mid_id}"))
            .header("authorization", format!("Bearer {}", agent_token(agent)))
            .body(Body::empty())
            .unwrap())
        .await
        .unwrap();
    assert_eq!(delete_resp.status(), StatusCode::NO_CONTENT);

    let history = json_body(app.clone().oneshot(anon("GET", &format!("/history/{leaf_id}"))).await.unwrap()).await;
    let chain = history.as_array().unwrap();
    // mid is tombstoned and skipped; root -> leaf directly.
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0]["_id"], root_id);
    assert_eq!(chain[1]["_id"], leaf_id);

    let since = json_body(app.clone().oneshot(anon("GET", &format!("/since/{root_id}"))).await.unwrap()).await;
    let descendants = since.as_array().unwrap();
    assert_eq!(descendants.len(), 1);
    assert_eq!(descendants[0]["_id"], leaf_id);
}

#[tokio::test]
async fn release_never_invalidates_cache() {
    let app = app();
    let agent = "http://test.example/agent/8";

    let created = json_body(
        app.clone().oneshot(authed("POST", "/api/create", agent, json!({"label": "v1"}))).await.unwrap(),
    )
    .await;
    let id = created["_id"].as_str().unwrap().to_string();

    app.clone().oneshot(anon("GET", &format!("/id/{id}"))).await.unwrap();
    let warm = app.clone().oneshot(anon("GET", &format!("/id/{id}"))).await.unwrap();
    assert_eq!(warm.headers().get("x-cache").unwrap(), "HIT");

    let release_resp = app
        .clone()
        .oneshot(Request::builder()
            .method("PATCH")
            .uri(format!("/api/release/{id}"))
            .header("authorization", format!("Bearer {}", agent_token(agent)))
            .body(Body::empty())
            .unwrap())
        .await
        .unwrap();
    assert_eq!(release_resp.status(), StatusCode::OK);

    let after_release = app.clone().oneshot(anon("GET", &format!("/id/{id}"))).await.unwrap();
    assert_eq!(after_release.headers().get("x-cache").unwrap(), "HIT");
}

#[tokio::test]
async fn cache_stats_reports_length_and_clear_resets_it() {
    let app = app();
    let agent = "http://test.example/agent/9";

    let created = json_body(
        app.clone().oneshot(authed("POST", "/api/create", agent, json!({"label": "v1"}))).await.unwrap(),
    )
    .await;
    let id = created["_id"].as_str().unwrap().to_string();
    app.clone().oneshot(anon("GET", &format!("/id/{id}"))).await.unwrap();

    let stats = json_body(app.clone().oneshot(anon("GET", "/api/cache/stats")).await.unwrap()).await;
    assert!(stats["length"].as_u64().unwrap() >= 1);

    let clear_resp = app
        .clone()
        .oneshot(authed("POST", "/api/cache/clear", agent, Value::Null))
        .await
        .unwrap();
    assert_eq!(clear_resp.status(), StatusCode::OK);

    let stats_after = json_body(app.clone().oneshot(anon("GET", "/api/cache/stats")).await.unwrap()).await;
    assert_eq!(stats_after["length"], 0);
}

#[tokio::test]
async fn cache_stats_details_reports_entries_mru_to_lru() {
    let app = app();
    let agent = "http://test.example/agent/10";

    let first = json_body(
        app.clone().oneshot(authed("POST", "/api/create", agent, json!({"label": "v1"}))).await.unwrap(),
    )
    .await;
    let first_id = first["_id"].as_str().unwrap().to_string();
    let second = json_body(
        app.clone().oneshot(authed("POST", "/api/create", agent, json!({"label": "v2"}))).await.unwrap(),
    )
    .await;
    let second_id = second["_id"].as_str().unwrap().to_string();

    app.clone().oneshot(anon("GET", &format!("/id/{first_id}"))).await.unwrap();
    app.clone().oneshot(anon("GET", &format!("/id/{second_id}"))).await.unwrap();
    // Re-access the first id so it becomes most-recently-used.
    app.clone().oneshot(anon("GET", &format!("/id/{first_id}"))).await.unwrap();

    let stats =
        json_body(app.clone().oneshot(anon("GET", "/api/cache/stats?details=true")).await.unwrap()).await;
    let entries = stats["keys"].as_array().unwrap();
    assert!(entries.len() >= 2);
    assert_eq!(entries[0]["position"], 0);
    assert_eq!(entries[0]["key"], format!("id:{first_id}"));
    for entry in entries {
        assert!(entry.get("age").is_some());
        assert!(entry.get("hits").is_some());
        assert!(entry.get("bytes").is_some());
    }
}

#[tokio::test]
async fn a_write_on_one_worker_invalidates_the_read_cache_of_its_sibling() {
    let store = Arc::new(InMemoryStore::new());
    let (app_a, state_a) = build_router(&config(), store);
    let app_b = router_for_state(state_a.join_worker(&config()));
    let agent = "http://test.example/agent/11";

    let created = json_body(
        app_a.clone().oneshot(authed("POST", "/api/create", agent, json!({"label": "v1"}))).await.unwrap(),
    )
    .await;
    let id = created["_id"].as_str().unwrap().to_string();

    // Warm worker B's own local cache for this id.
    let warm = app_b.clone().oneshot(anon("GET", &format!("/id/{id}"))).await.unwrap();
    assert_eq!(warm.headers().get("x-cache").unwrap(), "MISS");
    let warm_again = app_b.clone().oneshot(anon("GET", &format!("/id/{id}"))).await.unwrap();
    assert_eq!(warm_again.headers().get("x-cache").unwrap(), "HIT");

    // Overwrite through worker A. Its invalidation sweep runs under
    // the write/response barrier, which only returns once the
    // broadcast op has had a chance to reach worker B's listener task.
    let overwrite_resp = app_a
        .clone()
        .oneshot(authed("PUT", "/api/overwrite", agent, json!({"_id": id, "label": "v2"})))
        .await
        .unwrap();
    assert_eq!(overwrite_resp.status(), StatusCode::OK);

    // Give worker B's cluster listener task a turn to apply the
    // replicated invalidation before polling its cache.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let after = app_b.clone().oneshot(anon("GET", &format!("/id/{id}"))).await.unwrap();
    assert_eq!(after.headers().get("x-cache").unwrap(), "MISS");
    let after_body = json_body(after).await;
    assert_eq!(after_body["label"], "v2");
}
