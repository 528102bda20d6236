//! Rate limit policies.
//!
//! A policy names one rate limiting rule: the key prefix that namespaces its
//! records in the store, the trailing window length, and the number of
//! admitted events allowed inside that window.

use std::time::Duration;

use crate::error::{GateError, Result};

/// An immutable, validated `(prefix, interval, rate)` rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    prefix: String,
    interval: Duration,
    rate: u64,
}

impl Policy {
    /// Create a policy, rejecting configurations that can never admit anything
    /// or that have no window at all.
    pub fn new(prefix: impl Into<String>, interval: Duration, rate: u64) -> Result<Self> {
        let prefix = prefix.into();

        if prefix.is_empty() {
            return Err(GateError::InvalidConfig(
                "policy prefix must not be empty".to_string(),
            ));
        }
        if interval.as_millis() == 0 {
            return Err(GateError::InvalidConfig(format!(
                "policy '{}' must have an interval of at least 1ms",
                prefix
            )));
        }
        if rate == 0 {
            return Err(GateError::InvalidConfig(format!(
                "policy '{}' must allow at least one event per interval",
                prefix
            )));
        }

        Ok(Self {
            prefix,
            interval,
            rate,
        })
    }

    /// The key prefix for this policy.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The trailing window length.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The window length in whole milliseconds.
    pub fn interval_ms(&self) -> u64 {
        self.interval.as_millis() as u64
    }

    /// Maximum admitted events per interval.
    pub fn rate(&self) -> u64 {
        self.rate
    }

    /// Build the store key for a subject under this policy.
    pub fn window_key(&self, subject: &str) -> String {
        format!("{}:{}", self.prefix, subject)
    }
}
