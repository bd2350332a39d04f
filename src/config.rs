//! Throttler Configuration
//!
//! Construction-time settings for a throttler, loadable from the
//! environment for hosts that configure by deployment rather than in code.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default concurrency limit
pub const DEFAULT_LIMIT: u32 = 10;

/// Default window length in milliseconds
pub const DEFAULT_WINDOW_MS: u64 = 1_000;

/// Throttler construction settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottlerConfig {
    /// Maximum concurrently in-flight tasks
    pub limit: u32,

    /// Per-window admission quota; defaults to `limit` when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota: Option<u32>,

    /// Window length in milliseconds
    pub window_ms: u64,
}

impl Default for ThrottlerConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            quota: None,
            window_ms: DEFAULT_WINDOW_MS,
        }
    }
}

impl ThrottlerConfig {
    /// Create a configuration with explicit limit and window.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            quota: None,
            window_ms: window.as_millis() as u64,
        }
    }

    /// Set a quota independent of the concurrency limit.
    pub fn with_quota(mut self, quota: u32) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    ///
    /// Recognized variables: `TASK_THROTTLER_LIMIT`, `TASK_THROTTLER_QUOTA`,
    /// `TASK_THROTTLER_WINDOW_MS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("TASK_THROTTLER_LIMIT") {
            if let Ok(limit) = val.parse() {
                config.limit = limit;
            }
        }

        if let Ok(val) = std::env::var("TASK_THROTTLER_QUOTA") {
            if let Ok(quota) = val.parse() {
                config.quota = Some(quota);
            }
        }

        if let Ok(val) = std::env::var("TASK_THROTTLER_WINDOW_MS") {
            if let Ok(window_ms) = val.parse() {
                config.window_ms = window_ms;
            }
        }

        config
    }

    /// The effective per-window quota.
    pub fn quota(&self) -> u32 {
        self.quota.unwrap_or(self.limit)
    }

    /// The window length as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ThrottlerConfig::default();

        assert_eq!(config.limit, DEFAULT_LIMIT);
        assert_eq!(config.quota(), DEFAULT_LIMIT);
        assert_eq!(config.window(), Duration::from_millis(DEFAULT_WINDOW_MS));
    }

    #[test]
    fn test_quota_defaults_to_limit() {
        let config = ThrottlerConfig::new(7, Duration::from_secs(2));

        assert_eq!(config.quota(), 7);
        assert_eq!(config.window_ms, 2_000);
    }

    #[test]
    fn test_with_quota_overrides_limit() {
        let config = ThrottlerConfig::new(2, Duration::from_secs(1)).with_quota(50);

        assert_eq!(config.limit, 2);
        assert_eq!(config.quota(), 50);
    }

    #[test]
    fn test_serde_round_trip() {
        let config = ThrottlerConfig::new(4, Duration::from_millis(250)).with_quota(8);

        let json = serde_json::to_string(&config).unwrap();
        let back: ThrottlerConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(back, config);
    }
}
