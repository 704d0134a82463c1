//! Runtime configuration: command-line arguments and environment.

use std::path::PathBuf;

use thiserror::Error;

/// Environment variable bounding optimistic commit retries.
pub const MAX_COMMIT_ATTEMPTS_ENV: &str = "BOOKING_MAX_COMMIT_ATTEMPTS";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("usage: room-booking <inventory.csv> <requests.jsonl>")]
    Usage,

    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
}

/// Environment lookups, swappable in tests.
pub trait ConfigEnv {
    fn string(&self, name: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl ConfigEnv for ProcessEnv {
    fn string(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Tuning for the booking workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingConfig {
    max_commit_attempts: u32,
}

impl BookingConfig {
    const DEFAULT_COMMIT_ATTEMPTS: u32 = 3;
    const MIN_COMMIT_ATTEMPTS: u32 = 1;
    const MAX_COMMIT_ATTEMPTS: u32 = 10;

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(&ProcessEnv)
    }

    /// Reads [`MAX_COMMIT_ATTEMPTS_ENV`], clamped to 1..=10.
    pub fn from_env_with(env: &impl ConfigEnv) -> Result<Self, ConfigError> {
        let Some(raw) = env.string(MAX_COMMIT_ATTEMPTS_ENV) else {
            return Ok(Self::default());
        };
        let attempts = raw
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidNumber {
                name: MAX_COMMIT_ATTEMPTS_ENV,
                value: raw.clone(),
            })?;
        Ok(Self::with_max_commit_attempts(attempts))
    }

    pub fn with_max_commit_attempts(attempts: u32) -> Self {
        Self {
            max_commit_attempts: attempts
                .clamp(Self::MIN_COMMIT_ATTEMPTS, Self::MAX_COMMIT_ATTEMPTS),
        }
    }

    /// How many times a booking may read, decrement and commit before a
    /// persistent version conflict is reported as unavailability.
    pub fn max_commit_attempts(&self) -> u32 {
        self.max_commit_attempts
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: Self::DEFAULT_COMMIT_ATTEMPTS,
        }
    }
}

/// Positional arguments of the binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub inventory: PathBuf,
    pub requests: PathBuf,
}

impl Args {
    /// Parse from an argument list whose first item is the program name.
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, ConfigError> {
        let mut args = args.into_iter().skip(1);
        match (args.next(), args.next(), args.next()) {
            (Some(inventory), Some(requests), None) => Ok(Self {
                inventory: inventory.into(),
                requests: requests.into(),
            }),
            _ => Err(ConfigError::Usage),
        }
    }
}
