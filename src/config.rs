//! Configuration for the demonstration driver.
//!
//! Timing parameters come from the environment (a `.env` file is loaded if
//! present) and can be overridden on the command line.

use std::time::Duration;

use crate::error::{ConfigError, Error};

pub const DEFAULT_TIMEOUT_ENV: &str = "DETACH_DEFAULT_TIMEOUT_MS";
pub const API_LATENCY_ENV: &str = "DETACH_API_LATENCY_MS";
pub const SHORT_EXTENSION_ENV: &str = "DETACH_SHORT_EXTENSION_MS";
pub const LONG_EXTENSION_ENV: &str = "DETACH_LONG_EXTENSION_MS";

/// Timing parameters for the four scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    /// Deadline of the caller's scope.
    pub default_timeout: Duration,
    /// How long the simulated API call takes.
    pub api_latency: Duration,
    /// Extended deadline that is still too short for the call.
    pub short_extension: Duration,
    /// Extended deadline long enough for the call.
    pub long_extension: Duration,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(2),
            api_latency: Duration::from_secs(4),
            short_extension: Duration::from_secs(3),
            long_extension: Duration::from_secs(5),
        }
    }
}

impl DemoConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        Ok(Self {
            default_timeout: duration_ms_env(DEFAULT_TIMEOUT_ENV, defaults.default_timeout)?,
            api_latency: duration_ms_env(API_LATENCY_ENV, defaults.api_latency)?,
            short_extension: duration_ms_env(SHORT_EXTENSION_ENV, defaults.short_extension)?,
            long_extension: duration_ms_env(LONG_EXTENSION_ENV, defaults.long_extension)?,
        })
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn api_latency(mut self, latency: Duration) -> Self {
        self.api_latency = latency;
        self
    }

    pub fn short_extension(mut self, timeout: Duration) -> Self {
        self.short_extension = timeout;
        self
    }

    pub fn long_extension(mut self, timeout: Duration) -> Self {
        self.long_extension = timeout;
        self
    }

    /// Rejects zero durations, which would make every scenario trivially time out.
    pub fn validate(&self) -> Result<(), Error> {
        for (name, value) in [
            ("default_timeout", self.default_timeout),
            ("api_latency", self.api_latency),
            ("short_extension", self.short_extension),
            ("long_extension", self.long_extension),
        ] {
            if value.is_zero() {
                return Err(Error::InvalidArgument(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

/// Reads a positive millisecond count from `key`.
///
/// An unset or blank variable yields `default`. Zero is rejected, as is
/// anything that is not a whole number of milliseconds.
pub(crate) fn duration_ms_env(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    let raw = match std::env::var(key) {
        Ok(raw) => raw,
        Err(std::env::VarError::NotPresent) => return Ok(default),
        Err(e) => {
            return Err(ConfigError::ParseError(format!("failed to read {key}: {e}")));
        }
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(default);
    }

    let invalid = |message: String| ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    };
    match raw.parse::<u64>() {
        Ok(0) => Err(invalid("must be greater than zero".to_string())),
        Ok(millis) => Ok(Duration::from_millis(millis)),
        Err(e) => Err(invalid(format!("expected milliseconds, got {raw:?}: {e}"))),
    }
}
