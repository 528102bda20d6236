//! Send and check throttling for verification codes.

use std::sync::Arc;

use tracing::info;

use crate::error::{GateError, Result};
use crate::ratelimit::{Clock, Policy, RateLimiterGate, SystemClock, WindowStore};

/// Independent send and check limits per `(biz_type, phone)` pair.
///
/// The send policy spaces out code issuance; the check policy caps how many
/// guesses can be made against an issued code.
#[derive(Debug, Clone)]
pub struct VerificationThrottle {
    send: RateLimiterGate,
    check: RateLimiterGate,
}

impl VerificationThrottle {
    /// Create a throttle over `store` with the system clock.
    ///
    /// # Errors
    /// Returns [`GateError::InvalidConfig`] if both policies share a prefix.
    pub fn new(send: Policy, check: Policy, store: Arc<dyn WindowStore>) -> Result<Self> {
        Self::with_clock(send, check, store, Arc::new(SystemClock::new()))
    }

    /// Create a throttle with an explicit clock.
    pub fn with_clock(
        send: Policy,
        check: Policy,
        store: Arc<dyn WindowStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if send.prefix() == check.prefix() {
            return Err(GateError::InvalidConfig(format!(
                "send and check policies must use distinct prefixes, both are '{}'",
                send.prefix()
            )));
        }

        Ok(Self {
            send: RateLimiterGate::with_clock(send, store.clone(), clock.clone()),
            check: RateLimiterGate::with_clock(check, store, clock),
        })
    }

    /// Whether another code may be sent to `phone` for `biz_type`.
    ///
    /// # Errors
    /// [`GateError::InvalidRequest`] if either part is empty or contains `:`.
    pub async fn can_send(&self, biz_type: &str, phone: &str) -> Result<bool> {
        self.send.allow(&subject(biz_type, phone)?).await
    }

    /// Whether another code check may be made for `phone` and `biz_type`.
    pub async fn can_check(&self, biz_type: &str, phone: &str) -> Result<bool> {
        self.check.allow(&subject(biz_type, phone)?).await
    }

    /// Like [`can_send`](Self::can_send), but denial is
    /// [`GateError::SendRateLimited`].
    pub async fn require_send(&self, biz_type: &str, phone: &str) -> Result<()> {
        if self.can_send(biz_type, phone).await? {
            Ok(())
        } else {
            info!(biz_type = %biz_type, "Verification code send rate limited");
            Err(GateError::SendRateLimited)
        }
    }

    /// Like [`can_check`](Self::can_check), but denial is
    /// [`GateError::CheckRateLimited`].
    pub async fn require_check(&self, biz_type: &str, phone: &str) -> Result<()> {
        if self.can_check(biz_type, phone).await? {
            Ok(())
        } else {
            info!(biz_type = %biz_type, "Verification code check rate limited");
            Err(GateError::CheckRateLimited)
        }
    }
}

/// Joins the pair into one subject. `:` is the separator, so it may not
/// appear inside either part.
fn subject(biz_type: &str, phone: &str) -> Result<String> {
    for (name, part) in [("biz_type", biz_type), ("phone", phone)] {
        if part.is_empty() || part.contains(':') {
            return Err(GateError::InvalidRequest(format!(
                "{} must be non-empty and must not contain ':'",
                name
            )));
        }
    }
    Ok(format!("{}:{}", biz_type, phone))
}
