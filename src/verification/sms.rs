//! SMS delivery port.

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;

/// Sends templated text messages.
#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Send template `template_id` filled with `args` to every number.
    async fn send(&self, template_id: &str, args: &[String], numbers: &[String]) -> Result<()>;
}

/// Sender that only logs the message. Stands in for a real SMS vendor.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSmsSender;

impl LogSmsSender {
    /// Create a new logging sender.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send(&self, template_id: &str, args: &[String], numbers: &[String]) -> Result<()> {
        info!(
            template_id = %template_id,
            args = ?args,
            numbers = ?numbers,
            "Mock SMS sent"
        );
        Ok(())
    }
}
