//! Startup configuration, loaded from the environment.

use std::time::Duration;

use crate::cache::CacheConfig;

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub port: u16,
    pub id_prefix: String,
    /// Dev/test-only HS256 signing secret. Not part of the spec's own
    /// environment contract (which is JWKS-oriented for production) —
    /// it backs [`crate::auth::HsAgentValidator`], the in-memory
    /// deployment's validator.
    pub jwt_secret: String,
    pub worker_count: usize,
    /// Hard timeout on the write/response barrier. Resolved equal to
    /// `D_sync` (the client-visible ordering SLA) since no stricter
    /// bound is specified and the barrier contract requires
    /// `D_sync <= T_inv`.
    pub invalidation_timeout: Duration,
    pub cache: CacheConfig,
    /// Whether the cache layer is engaged at all; `false` routes every
    /// read straight to the store.
    pub caching_enabled: bool,
    /// Unused by [`crate::store::InMemoryStore`]; carried so a future
    /// Mongo-backed `DocumentStore` can be wired in without another
    /// config pass.
    pub mongo_connection_string: Option<String>,
    /// Name of the JWT claim carrying the RERUM agent URL.
    pub agent_claim: String,
    pub jwks_uri: Option<String>,
    pub audience: Option<String>,
    pub issuer: Option<String>,
}

impl HttpConfig {
    pub fn from_env() -> Result<Self, crate::cache::CacheError> {
        Ok(Self {
            port: env_u16("PORT", 8080),
            id_prefix: std::env::var("RERUM_ID_PREFIX")
                .unwrap_or_else(|_| "http://localhost:8080/id/".to_string()),
            jwt_secret: std::env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret".to_string()),
            worker_count: env_u16("WORKER_COUNT", 4) as usize,
            invalidation_timeout: Duration::from_secs(2),
            cache: CacheConfig::from_env()?,
            caching_enabled: env_bool("CACHING", true),
            mongo_connection_string: std::env::var("MONGO_CONNECTION_STRING").ok(),
            agent_claim: std::env::var("RERUM_AGENT_CLAIM").unwrap_or_else(|_| "agent".to_string()),
            jwks_uri: std::env::var("JWKS_URI").ok(),
            audience: std::env::var("AUDIENCE").ok(),
            issuer: std::env::var("ISSUER").ok(),
        })
    }
}

fn env_u16(name: &str, default: u16) -> u16 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
