//! Verification code throttling and issuance.

mod code_store;
mod service;
mod sms;
mod throttle;

pub use code_store::{CodeStore, MemoryCodeStore, RedisCodeStore};
pub use service::{CodeService, CodeSettings};
pub use sms::{LogSmsSender, SmsSender};
pub use throttle::VerificationThrottle;
