//! Bounds-checked cache configuration, loaded from environment
//! variables at startup.

use std::time::Duration;

use super::errors::CacheError;

const MAX_LENGTH_CEILING: u64 = 100_000_000;
const MAX_BYTES_CEILING: u64 = 100_000_000_000;
const MAX_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_length: usize,
    pub max_bytes: usize,
    pub ttl: Duration,
}

impl CacheConfig {
    pub fn new(max_length: u64, max_bytes: u64, ttl: Duration) -> Result<Self, CacheError> {
        if max_length == 0 || max_length >= MAX_LENGTH_CEILING {
            return Err(CacheError::InvalidConfig(format!(
                "maxLength must be in (0, {MAX_LENGTH_CEILING}), got {max_length}"
            )));
        }
        if max_bytes == 0 || max_bytes >= MAX_BYTES_CEILING {
            return Err(CacheError::InvalidConfig(format!(
                "maxBytes must be in (0, {MAX_BYTES_CEILING}), got {max_bytes}"
            )));
        }
        if ttl > MAX_TTL {
            return Err(CacheError::InvalidConfig(format!(
                "ttl must not exceed 30 days, got {}s",
                ttl.as_secs()
            )));
        }
        Ok(Self { max_length: max_length as usize, max_bytes: max_bytes as usize, ttl })
    }

    /// Load from `CACHE_MAX_LENGTH` / `CACHE_MAX_BYTES` / `CACHE_TTL`
    /// (milliseconds), falling back to the defaults for unset variables.
    pub fn from_env() -> Result<Self, CacheError> {
        let max_length = env_u64("CACHE_MAX_LENGTH", 1_000);
        let max_bytes = env_u64("CACHE_MAX_BYTES", 1_000_000_000);
        let ttl_millis = env_u64("CACHE_TTL", 86_400_000);
        Self::new(max_length, max_bytes, Duration::from_millis(ttl_millis))
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
