//! Rate limiter for login and one-time code attempts

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of attempts allowed per window
    pub max_attempts: u32,
    /// Time window in seconds
    pub window_seconds: u64,
    /// Ban duration in seconds
    pub ban_duration_seconds: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 300,       // 5 minutes
            ban_duration_seconds: 900, // 15 minutes
        }
    }
}

#[derive(Debug)]
struct RateLimiterEntry {
    attempts: u32,
    window_start: Instant,
    ban_expires: Option<Instant>,
}

/// In-process attempt counter keyed by an arbitrary string
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, RateLimiterEntry>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record an attempt for `key` and report whether it may proceed
    pub async fn is_allowed(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let window = Duration::from_secs(self.config.window_seconds);

        // Drop keys whose window and ban have both run out
        entries.retain(|_, entry| match entry.ban_expires {
            Some(ban_expires) => now < ban_expires,
            None => now.duration_since(entry.window_start) < window,
        });

        let entry = entries.entry(key.to_string()).or_insert(RateLimiterEntry {
            attempts: 0,
            window_start: now,
            ban_expires: None,
        });

        if let Some(ban_expires) = entry.ban_expires {
            if now < ban_expires {
                return false;
            }
            entry.attempts = 0;
            entry.ban_expires = None;
            entry.window_start = now;
        }

        if now.duration_since(entry.window_start) >= window {
            entry.attempts = 0;
            entry.window_start = now;
        }

        if entry.attempts >= self.config.max_attempts {
            entry.ban_expires = Some(now + Duration::from_secs(self.config.ban_duration_seconds));
            warn!(
                "Too many attempts for {}, blocked for {} seconds",
                key, self.config.ban_duration_seconds
            );
            return false;
        }

        entry.attempts += 1;
        true
    }

    /// Forget the attempts recorded for `key`
    pub async fn reset(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}
