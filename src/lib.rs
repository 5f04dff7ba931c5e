pub mod auth;
pub mod barrier;
pub mod cache;
pub mod cli;
pub mod http_server;
pub mod invalidation;
pub mod keys;
pub mod observability;
pub mod store;
pub mod versioning;
