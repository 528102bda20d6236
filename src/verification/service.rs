//! Verification code issuance and checking.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info};

use super::code_store::CodeStore;
use super::sms::SmsSender;
use super::throttle::VerificationThrottle;
use crate::error::{GateError, Result};

/// Settings for issued codes.
#[derive(Debug, Clone)]
pub struct CodeSettings {
    /// SMS template used to deliver the code
    pub template_id: String,
    /// How long an issued code stays valid
    pub code_ttl: Duration,
    /// Business types codes may be issued for
    pub biz_types: Vec<String>,
}

impl Default for CodeSettings {
    fn default() -> Self {
        Self {
            template_id: "verification-code".to_string(),
            code_ttl: Duration::from_secs(600),
            biz_types: vec!["login".to_string()],
        }
    }
}

/// Issues six digit codes over SMS and checks submitted codes.
///
/// Every operation passes the [`VerificationThrottle`] first, so a denied
/// caller never reaches the code store or the SMS sender.
#[derive(Clone)]
pub struct CodeService {
    throttle: VerificationThrottle,
    codes: Arc<dyn CodeStore>,
    sms: Arc<dyn SmsSender>,
    settings: CodeSettings,
}

impl CodeService {
    /// Create a new code service.
    pub fn new(
        throttle: VerificationThrottle,
        codes: Arc<dyn CodeStore>,
        sms: Arc<dyn SmsSender>,
        settings: CodeSettings,
    ) -> Self {
        Self {
            throttle,
            codes,
            sms,
            settings,
        }
    }

    /// Generate, store and send a fresh code.
    ///
    /// # Errors
    /// [`GateError::InvalidRequest`] for an unknown `biz_type`.
    ///
    /// [`GateError::SendRateLimited`](crate::error::GateError::SendRateLimited)
    /// when codes for this pair were sent too recently.
    pub async fn send(&self, biz_type: &str, phone: &str) -> Result<()> {
        self.check_biz_type(biz_type)?;
        self.throttle.require_send(biz_type, phone).await?;

        let code = generate_code();
        self.codes
            .put(&code_key(biz_type, phone), &code, self.settings.code_ttl)
            .await?;
        self.sms
            .send(&self.settings.template_id, &[code], &[phone.to_string()])
            .await?;

        info!(biz_type = %biz_type, "Verification code sent");
        Ok(())
    }

    /// Check `input` against the pending code. A matching code is consumed.
    ///
    /// # Errors
    /// [`GateError::CheckRateLimited`](crate::error::GateError::CheckRateLimited)
    /// when this pair has made too many checks.
    pub async fn verify(&self, biz_type: &str, phone: &str, input: &str) -> Result<bool> {
        self.check_biz_type(biz_type)?;
        self.throttle.require_check(biz_type, phone).await?;

        let key = code_key(biz_type, phone);
        match self.codes.get(&key).await? {
            Some(expected) if constant_time_eq(&expected, input) => {
                self.codes.remove(&key).await?;
                debug!(biz_type = %biz_type, "Verification code accepted");
                Ok(true)
            }
            _ => {
                debug!(biz_type = %biz_type, "Verification code rejected");
                Ok(false)
            }
        }
    }

    fn check_biz_type(&self, biz_type: &str) -> Result<()> {
        if self.settings.biz_types.iter().any(|known| known == biz_type) {
            Ok(())
        } else {
            debug!(biz_type = %biz_type, "Unknown business type");
            Err(GateError::InvalidRequest(format!(
                "unknown biz_type '{}'",
                biz_type
            )))
        }
    }
}

impl std::fmt::Debug for CodeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeService")
            .field("throttle", &self.throttle)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

fn code_key(biz_type: &str, phone: &str) -> String {
    format!("code:{}:{}", biz_type, phone)
}

/// Compares without short-circuiting on the first differing byte.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (a_byte, b_byte) in a.bytes().zip(b.bytes()) {
        result |= a_byte ^ b_byte;
    }

    result == 0
}

fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}
