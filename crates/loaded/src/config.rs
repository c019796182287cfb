//! Configuration settings for load-state detection.
//!
//! Settings can be loaded from environment variables or constructed
//! programmatically.

use core::time::Duration;
use std::env;

/// Runtime configuration for [`crate::Loader`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LoadedConfig {
    /// Timeout applied when a call supplies none (`None` = wait forever)
    pub default_timeout_ms: Option<u64>,
    /// Whether to emit detection counters through the log after each cycle
    pub telemetry_enabled: bool,
}

impl LoadedConfig {
    /// Construct a configuration with explicit values.
    ///
    /// A zero `default_timeout_ms` is treated as no timeout.
    #[inline]
    #[must_use]
    pub const fn new(default_timeout_ms: Option<u64>, telemetry_enabled: bool) -> Self {
        let default_timeout_ms = match default_timeout_ms {
            Some(0) => None,
            other => other,
        };
        Self {
            default_timeout_ms,
            telemetry_enabled,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `LOADED_DEFAULT_TIMEOUT_MS`: default timeout in milliseconds (unset or 0: none)
    /// - `LOADED_TELEMETRY`: set to "1" to enable telemetry (default: disabled)
    #[inline]
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default_timeout_ms = lookup("LOADED_DEFAULT_TIMEOUT_MS")
            .and_then(|val| val.trim().parse::<u64>().ok())
            .and_then(|millis| (millis > 0).then_some(millis));
        let telemetry_enabled = lookup("LOADED_TELEMETRY").as_deref() == Some("1");
        Self {
            default_timeout_ms,
            telemetry_enabled,
        }
    }

    /// Get the default timeout as an optional `Duration`.
    #[inline]
    #[must_use]
    pub const fn default_timeout(&self) -> Option<Duration> {
        if let Some(millis) = self.default_timeout_ms {
            Some(Duration::from_millis(millis))
        } else {
            None
        }
    }
}
