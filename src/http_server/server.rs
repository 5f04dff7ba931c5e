use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::observability::{Logger, Severity};
use crate::store::DocumentStore;

use super::config::HttpConfig;
use super::routes::router;
use super::state::AppState;

pub fn build_router(config: &HttpConfig, store: Arc<dyn DocumentStore>) -> (Router, AppState) {
    let state = AppState::new(config, store);
    (router(state.clone()), state)
}

/// Build the route table for a worker's [`AppState`] directly — used
/// to stand up a sibling worker (via [`AppState::join_worker`]) that
/// shares a cluster with one built through [`build_router`].
pub fn router_for_state(state: AppState) -> Router {
    router(state)
}

pub async fn serve(config: HttpConfig, store: Arc<dyn DocumentStore>) -> std::io::Result<()> {
    let (app, _state) = build_router(&config, store);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    Logger::log(Severity::Info, "server_listening", &[("addr", addr.as_str())]);
    axum::serve(listener, app).await
}
