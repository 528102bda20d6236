//! Reusable admission gate for one policy.

use std::sync::Arc;

use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::policy::Policy;
use super::store::WindowStore;
use super::window;
use crate::error::Result;

/// Decides admission for subjects under a single [`Policy`].
///
/// The gate holds no counts of its own; every decision is a round-trip to the
/// shared store, so gates are cheap to clone and safe to use from any number
/// of tasks.
#[derive(Clone)]
pub struct RateLimiterGate {
    policy: Policy,
    store: Arc<dyn WindowStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiterGate {
    /// Create a gate reading the system clock.
    pub fn new(policy: Policy, store: Arc<dyn WindowStore>) -> Self {
        Self::with_clock(policy, store, Arc::new(SystemClock::new()))
    }

    /// Create a gate with an explicit clock.
    pub fn with_clock(policy: Policy, store: Arc<dyn WindowStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            store,
            clock,
        }
    }

    /// The policy this gate enforces.
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Record an attempt by `subject` and report whether it is admitted.
    ///
    /// Store errors are returned as-is; whether to fail open or closed is up
    /// to the caller.
    pub async fn allow(&self, subject: &str) -> Result<bool> {
        let key = self.policy.window_key(subject);
        let now_ms = self.clock.now_ms();

        trace!(key = %key, now_ms = now_ms, "Checking admission");

        let admitted = window::check(
            self.store.as_ref(),
            &key,
            self.policy.interval_ms(),
            self.policy.rate(),
            now_ms,
        )
        .await?;

        if !admitted {
            debug!(
                key = %key,
                rate = self.policy.rate(),
                interval_ms = self.policy.interval_ms(),
                "Rate limit exceeded"
            );
        }

        Ok(admitted)
    }
}

impl std::fmt::Debug for RateLimiterGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterGate")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
