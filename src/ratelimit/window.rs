//! Sliding window admission algorithm.
//!
//! A window record holds the timestamps of admitted events for one key. Each
//! check runs the following steps as one indivisible unit inside the store:
//!
//! 1. drop timestamps strictly older than `now - interval`
//! 2. count what remains
//! 3. if the count has reached `rate`, deny without recording anything
//! 4. otherwise record `now`, refresh the key expiry to `interval`, admit
//!
//! The steps are written twice: as [`WindowRecord::apply`] for in-process
//! stores and as [`SLIDING_WINDOW_SCRIPT`] for Redis. The two must stay in
//! lockstep.

use tracing::trace;
use uuid::Uuid;

use super::store::WindowStore;
use crate::error::Result;

/// Lua rendition of the window check, run by Redis without interleaving.
///
/// `KEYS[1]` is the window key. `ARGV` holds the interval in ms, the rate,
/// the current time in ms, and a member unique to this event so that events
/// landing on the same millisecond are all kept.
pub const SLIDING_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local interval = tonumber(ARGV[1])
local rate = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local member = ARGV[4]

redis.call('ZREMRANGEBYSCORE', key, '-inf', '(' .. (now - interval))
local count = redis.call('ZCARD', key)
if count >= rate then
    return 0
end

redis.call('ZADD', key, now, member)
redis.call('PEXPIRE', key, interval)
return 1
"#;

/// Arguments for one window check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowOp {
    /// Window length in milliseconds
    pub interval_ms: u64,
    /// Maximum admitted events per window
    pub rate: u64,
    /// Caller-supplied wall-clock time in milliseconds
    pub now_ms: u64,
    /// Unique sorted-set member for this event
    pub member: String,
}

impl WindowOp {
    /// Build the arguments for a check at `now_ms`.
    pub fn new(interval_ms: u64, rate: u64, now_ms: u64) -> Self {
        Self {
            interval_ms,
            rate,
            now_ms,
            member: format!("{}-{}", now_ms, Uuid::new_v4()),
        }
    }

    /// Oldest timestamp still inside the window.
    pub fn window_start(&self) -> u64 {
        self.now_ms.saturating_sub(self.interval_ms)
    }
}

/// In-process copy of a window key's state.
#[derive(Debug, Clone, Default)]
pub struct WindowRecord {
    /// Admitted event timestamps, unordered
    timestamps: Vec<u64>,
    /// When the record lapses if nothing else is admitted
    expires_at_ms: u64,
}

impl WindowRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one window check against this record.
    ///
    /// Returns `true` when the event is admitted.
    pub fn apply(&mut self, op: &WindowOp) -> bool {
        if self.is_expired(op.now_ms) {
            self.timestamps.clear();
        }

        let start = op.window_start();
        self.timestamps.retain(|&ts| ts >= start);

        if self.timestamps.len() as u64 >= op.rate {
            return false;
        }

        self.timestamps.push(op.now_ms);
        self.expires_at_ms = op.now_ms.saturating_add(op.interval_ms);
        true
    }

    /// Whether the record has outlived its expiry at `now_ms`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms <= now_ms
    }

    /// Number of timestamps currently held.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the record holds no timestamps.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Decide whether an event for `key` is admitted at `now_ms`.
///
/// A `rate` of zero denies without touching the store.
pub async fn check(
    store: &dyn WindowStore,
    key: &str,
    interval_ms: u64,
    rate: u64,
    now_ms: u64,
) -> Result<bool> {
    if rate == 0 {
        return Ok(false);
    }

    let op = WindowOp::new(interval_ms, rate, now_ms);
    let admitted = store.execute(key, &op).await?;

    trace!(
        key = %key,
        now_ms = now_ms,
        admitted = admitted,
        "Sliding window checked"
    );

    Ok(admitted)
}
