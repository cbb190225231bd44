//! Construction-time configuration for a [`BioRng`](crate::BioRng).
//!
//! All values are fixed once the generator starts. Defaults can be
//! overridden from the environment:
//!
//! | Variable | Field | Default |
//! |---|---|---|
//! | `BIORNG_SAMPLE_SIZE` | `sample_size` | 100 |
//! | `BIORNG_MEA_ID` | `mea` | 4 |
//! | `BIORNG_POLL_INTERVAL_MS` | `poll_interval_ms` | 10 |
//! | `BIORNG_REQUEST_TIMEOUT_MS` | `request_timeout_ms` (0 = none) | 5000 |
//! | `BIORNG_RETRY_DELAY_MS` | `retry_delay_ms` | 100 |
//! | `BIORNG_MAX_FAILURES` | `max_consecutive_failures` (0 = unlimited) | unlimited |
//! | `BIORNG_SEED` | `seed` | OS entropy |

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::{InvalidMeaId, MeaId};

pub const ENV_SAMPLE_SIZE: &str = "BIORNG_SAMPLE_SIZE";
pub const ENV_MEA_ID: &str = "BIORNG_MEA_ID";
pub const ENV_POLL_INTERVAL_MS: &str = "BIORNG_POLL_INTERVAL_MS";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "BIORNG_REQUEST_TIMEOUT_MS";
pub const ENV_RETRY_DELAY_MS: &str = "BIORNG_RETRY_DELAY_MS";
pub const ENV_MAX_FAILURES: &str = "BIORNG_MAX_FAILURES";
pub const ENV_SEED: &str = "BIORNG_SEED";

/// Invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("sample_size must be at least 1")]
    ZeroSampleSize,
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
    #[error(transparent)]
    Mea(#[from] InvalidMeaId),
    #[error("{var}={value:?}: {reason}")]
    Env {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Generator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RngConfig {
    /// Normalized samples to accumulate before one is moved into the pool.
    pub sample_size: usize,
    /// MEA to record from.
    pub mea: MeaId,
    /// Re-check interval for consumers waiting on an empty pool.
    pub poll_interval_ms: u64,
    /// Bound on a single sample request; `None` waits indefinitely.
    pub request_timeout_ms: Option<u64>,
    /// Pause after a failed sample request.
    pub retry_delay_ms: u64,
    /// Consecutive failed requests after which the producer gives up.
    /// `None` retries forever.
    pub max_consecutive_failures: Option<u32>,
    /// Seed for the staging selection RNG; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for RngConfig {
    fn default() -> Self {
        Self {
            sample_size: 100,
            mea: MeaId::DEFAULT,
            poll_interval_ms: 10,
            request_timeout_ms: Some(5_000),
            retry_delay_ms: 100,
            max_consecutive_failures: None,
            seed: None,
        }
    }
}

impl RngConfig {
    /// Defaults overridden by `BIORNG_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var::<usize>(&lookup, ENV_SAMPLE_SIZE)? {
            config.sample_size = v;
        }
        if let Some(v) = parse_var::<u8>(&lookup, ENV_MEA_ID)? {
            config.mea = MeaId::new(v)?;
        }
        if let Some(v) = parse_var::<u64>(&lookup, ENV_POLL_INTERVAL_MS)? {
            config.poll_interval_ms = v;
        }
        if let Some(v) = parse_var::<u64>(&lookup, ENV_REQUEST_TIMEOUT_MS)? {
            config.request_timeout_ms = (v > 0).then_some(v);
        }
        if let Some(v) = parse_var::<u64>(&lookup, ENV_RETRY_DELAY_MS)? {
            config.retry_delay_ms = v;
        }
        if let Some(v) = parse_var::<u32>(&lookup, ENV_MAX_FAILURES)? {
            config.max_consecutive_failures = (v > 0).then_some(v);
        }
        if let Some(v) = parse_var::<u64>(&lookup, ENV_SEED)? {
            config.seed = Some(v);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the producer or pool cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_size == 0 {
            return Err(ConfigError::ZeroSampleSize);
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed.parse::<T>().map(Some).map_err(|e| ConfigError::Env {
        var,
        value: raw.clone(),
        reason: e.to_string(),
    })
}
