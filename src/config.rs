//! Projector Configuration
//!
//! Runtime knobs for the worker: store location, queue name, per-delivery
//! timeout, and the bounds on optimistic-retry and idempotency tracking.

use std::time::Duration;

/// Default Redis connection URL
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default queue the ingestion endpoint pushes raw deliveries onto
pub const DEFAULT_DELIVERY_QUEUE: &str = "deliveries";

/// Maximum attempts for one optimistic compare-and-swap loop
pub const MAX_UPDATE_RETRIES: u32 = 8;

/// Idempotency keys retained per aggregate document
pub const APPLIED_WINDOW: usize = 256;

/// Upper bound on one delivery's total processing time
pub const DELIVERY_TIMEOUT_MS: u64 = 10_000;

/// Configuration for the projector worker
#[derive(Debug, Clone)]
pub struct ProjectorConfig {
    /// Redis URL for both the document store and the delivery queue
    pub redis_url: String,
    /// List key holding raw delivery JSON
    pub delivery_queue: String,
    /// Per-delivery processing timeout in milliseconds
    pub delivery_timeout_ms: u64,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            delivery_queue: DEFAULT_DELIVERY_QUEUE.to_string(),
            delivery_timeout_ms: DELIVERY_TIMEOUT_MS,
        }
    }
}

impl ProjectorConfig {
    /// Create a config pointing at a specific Redis URL
    pub fn with_redis_url(redis_url: impl Into<String>) -> Self {
        Self {
            redis_url: redis_url.into(),
            ..Default::default()
        }
    }

    /// Build from environment variables, falling back to defaults:
    /// `PROJECTOR_REDIS_URL`, `PROJECTOR_DELIVERY_QUEUE`,
    /// `PROJECTOR_DELIVERY_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("PROJECTOR_REDIS_URL") {
            config.redis_url = url;
        }
        if let Ok(queue) = std::env::var("PROJECTOR_DELIVERY_QUEUE") {
            config.delivery_queue = queue;
        }
        if let Ok(timeout) = std::env::var("PROJECTOR_DELIVERY_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                config.delivery_timeout_ms = ms;
            }
        }
        config
    }

    /// Per-delivery timeout as a `Duration`
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}
