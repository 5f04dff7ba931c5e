use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;

use super::handlers;
use super::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/id/:id", get(handlers::get_by_id))
        .route("/history/:id", get(handlers::get_history))
        .route("/since/:id", get(handlers::get_since))
        .route("/api/query", post(handlers::query))
        .route("/api/search", post(handlers::search))
        .route("/api/search/phrase", post(handlers::search_phrase))
        .route("/api/create", post(handlers::create))
        .route("/api/bulkCreate", post(handlers::bulk_create))
        .route("/api/update", put(handlers::update))
        .route("/api/bulkUpdate", put(handlers::bulk_update))
        .route("/api/patch", patch(handlers::patch))
        .route("/api/set", patch(handlers::set))
        .route("/api/unset", patch(handlers::unset))
        .route("/api/overwrite", put(handlers::overwrite))
        .route("/api/delete/:id", delete(handlers::delete))
        .route("/api/release/:id", patch(handlers::release))
        .route("/api/cache/stats", get(handlers::cache_stats))
        .route("/api/cache/clear", post(handlers::cache_clear))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
