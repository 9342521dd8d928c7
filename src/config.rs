//! Configuration types.

use std::str::FromStr;
use std::time::Duration;

use crate::channels::queue::DEFAULT_QUEUE_CAPACITY;
use crate::error::ConfigError;

const POLL_INTERVAL_MS: &str = "CONDUIT_POLL_INTERVAL_MS";
const POLL_INITIAL_DELAY_MS: &str = "CONDUIT_POLL_INITIAL_DELAY_MS";
const POLL_FIXED_RATE: &str = "CONDUIT_POLL_FIXED_RATE";
const POLL_MAX_MESSAGES: &str = "CONDUIT_POLL_MAX_MESSAGES";
const RECEIVE_TIMEOUT_MS: &str = "CONDUIT_RECEIVE_TIMEOUT_MS";
const QUEUE_CAPACITY: &str = "CONDUIT_QUEUE_CAPACITY";

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Polling schedule for a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Time between polls.
    pub interval: Duration,
    /// Delay before the first poll.
    pub initial_delay: Duration,
    /// Fixed rate (interval measured from poll start) instead of fixed delay
    /// (interval measured from poll end).
    pub fixed_rate: bool,
    /// Messages handled per poll; `None` drains the channel.
    pub max_messages_per_poll: Option<usize>,
    /// How long a single receive waits for a message.
    pub receive_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            initial_delay: Duration::ZERO,
            fixed_rate: false,
            max_messages_per_poll: None,
            receive_timeout: Duration::from_millis(100),
        }
    }
}

impl PollerConfig {
    /// Build from `CONDUIT_*` environment variables, falling back to defaults
    /// for anything unset or invalid.
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    /// Like [`from_env`](Self::from_env) but rejects values that are set and
    /// cannot be used.
    pub fn try_from_env() -> Result<Self, ConfigError> {
        Self::try_from_lookup(env_lookup)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let lenient = |key| lookup_parse::<u64>(&lookup, key).ok().flatten();

        Self {
            interval: lenient(POLL_INTERVAL_MS)
                .filter(|&ms| ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.interval),
            initial_delay: lenient(POLL_INITIAL_DELAY_MS)
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_delay),
            fixed_rate: lookup_parse::<bool>(&lookup, POLL_FIXED_RATE)
                .ok()
                .flatten()
                .unwrap_or(defaults.fixed_rate),
            max_messages_per_poll: lookup_parse::<usize>(&lookup, POLL_MAX_MESSAGES)
                .ok()
                .flatten()
                .filter(|&n| n > 0)
                .or(defaults.max_messages_per_poll),
            receive_timeout: lenient(RECEIVE_TIMEOUT_MS)
                .map(Duration::from_millis)
                .unwrap_or(defaults.receive_timeout),
        }
    }

    fn try_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let interval = match lookup_parse::<u64>(&lookup, POLL_INTERVAL_MS)? {
            Some(0) => return Err(must_be_positive(POLL_INTERVAL_MS)),
            Some(ms) => Duration::from_millis(ms),
            None => defaults.interval,
        };
        let max_messages_per_poll = match lookup_parse::<usize>(&lookup, POLL_MAX_MESSAGES)? {
            Some(0) => return Err(must_be_positive(POLL_MAX_MESSAGES)),
            Some(n) => Some(n),
            None => defaults.max_messages_per_poll,
        };

        Ok(Self {
            interval,
            initial_delay: lookup_parse::<u64>(&lookup, POLL_INITIAL_DELAY_MS)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_delay),
            fixed_rate: lookup_parse::<bool>(&lookup, POLL_FIXED_RATE)?
                .unwrap_or(defaults.fixed_rate),
            max_messages_per_poll,
            receive_timeout: lookup_parse::<u64>(&lookup, RECEIVE_TIMEOUT_MS)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.receive_timeout),
        })
    }
}

/// Channel settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub queue_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ChannelConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    /// Rejects an unparsable or zero `CONDUIT_QUEUE_CAPACITY`.
    pub fn try_from_env() -> Result<Self, ConfigError> {
        Self::try_from_lookup(env_lookup)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let queue_capacity = lookup_parse::<usize>(&lookup, QUEUE_CAPACITY)
            .ok()
            .flatten()
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_QUEUE_CAPACITY);
        Self { queue_capacity }
    }

    fn try_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        match lookup_parse::<usize>(&lookup, QUEUE_CAPACITY)? {
            Some(0) => Err(must_be_positive(QUEUE_CAPACITY)),
            Some(queue_capacity) => Ok(Self { queue_capacity }),
            None => Ok(Self::default()),
        }
    }
}

/// `Ok(None)` when unset, `Err` when set but unparsable.
fn lookup_parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        })
}

fn must_be_positive(key: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: "must be greater than zero".into(),
    }
}
