//! Runtime configuration for the collection engine.
//!
//! Reading these values from files or the environment is left to the
//! embedding application; everything here has a working default.

use std::time::Duration;

/// Rules applied to host credentials when the monitor is built.
#[derive(Debug, Clone, Default)]
pub struct ValidationConfig {
    /// Minimum zxcvbn score a password must reach (`None` disables the check).
    pub password_min_score: Option<zxcvbn::Score>,
    /// Reject well-known privileged account names such as `root`.
    pub block_reserved_usernames: bool,
}

/// Token-bucket limit applied to the data calls of one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_size: u32,
}

/// Timing, retention and transport settings of a monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between the starts of two consecutive cycles.
    pub interval: Duration,
    /// Wait before retrying after a cycle failed entirely.
    pub failure_backoff: Duration,
    /// Timeout of every single HTTP call.
    pub request_timeout: Duration,
    /// Upper bound for a whole cycle; a cycle exceeding it counts as failed.
    pub cycle_timeout: Duration,
    /// Age after which history rows are pruned (`None` keeps them forever).
    pub history_retention: Option<Duration>,
    /// Minimum time between two retention sweeps.
    pub retention_sweep_interval: Duration,
    pub rate_limit: Option<RateLimitConfig>,
    pub validation: ValidationConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            failure_backoff: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            cycle_timeout: Duration::from_secs(60),
            history_retention: Some(Duration::from_secs(7 * 24 * 3600)),
            retention_sweep_interval: Duration::from_secs(3600),
            rate_limit: None,
            validation: ValidationConfig::default(),
        }
    }
}
