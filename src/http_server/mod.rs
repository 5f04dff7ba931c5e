//! The HTTP surface: route table, auth/cache/barrier wiring, and the
//! axum `Router` that ties them together.

mod cache_middleware;
mod config;
mod errors;
mod handlers;
mod routes;
mod server;
mod state;
mod write_middleware;

pub use config::HttpConfig;
pub use errors::HttpError;
pub use server::{build_router, router_for_state, serve};
pub use state::AppState;
