//! Pool configuration.
//!
//! The size-class geometry is fixed at compile time. The only runtime knob
//! is the lifecycle log level, read from the `SMALLPOOL_LOG` environment
//! variable:
//! - `trace`, `debug`, `info`, `warn`, `error`: retain records at or above
//!   that level.
//! - `off`: retain nothing.
//!
//! Unknown values fall back to `warn`.
//!
//! Records are retained until drained. At `trace` every free-list hit adds
//! one, so a long-running pool at that level should drain its log
//! periodically.

use crate::log::PoolLogLevel;

/// Requests above this many bytes bypass the size-class system entirely.
pub const SMALL_OBJECT_THRESHOLD: usize = 4096;

/// Number of size classes (and free lists) covering `1..=SMALL_OBJECT_THRESHOLD`.
pub const NUM_SIZE_CLASSES: usize = 56;

/// Slots a refill asks the arena for. The arena may serve fewer.
pub const REFILL_BATCH: usize = 10;

/// Growth requests add `total_acquired >> GROWTH_HISTORY_SHIFT` bytes on top
/// of twice the immediate need.
pub const GROWTH_HISTORY_SHIFT: u32 = 4;

/// Environment variable holding the lifecycle log level.
pub const LOG_ENV_VAR: &str = "SMALLPOOL_LOG";

/// Runtime configuration for a [`PoolAllocator`](crate::PoolAllocator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Minimum level of retained lifecycle records; `None` disables logging.
    pub log_level: Option<PoolLogLevel>,
}

impl PoolConfig {
    /// Reads the configuration from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        let log_level = std::env::var(LOG_ENV_VAR)
            .map(|raw| parse_log_env(&raw))
            .unwrap_or(Some(PoolLogLevel::Warn));
        Self { log_level }
    }

    /// A configuration that retains no lifecycle records.
    #[must_use]
    pub const fn quiet() -> Self {
        Self { log_level: None }
    }

    /// Returns a copy with the given log level.
    #[must_use]
    pub const fn with_log_level(mut self, level: Option<PoolLogLevel>) -> Self {
        self.log_level = level;
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            log_level: Some(PoolLogLevel::Warn),
        }
    }
}

fn parse_log_env(raw: &str) -> Option<PoolLogLevel> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "off" | "none" | "disabled" => None,
        other => Some(PoolLogLevel::from_str_loose(other)),
    }
}
