//! Redis-backed window store.
//!
//! Each window key is a sorted set of event members scored by their
//! timestamp. The check runs as a Lua script, so Redis executes the trim,
//! count and insert for a key without interleaving other commands. The key's
//! `PEXPIRE` is refreshed on every admission, so idle subjects disappear on
//! their own.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisResult, Script};
use tracing::{debug, warn};

use super::store::WindowStore;
use super::window::{WindowOp, SLIDING_WINDOW_SCRIPT};
use crate::error::{GateError, Result};

/// Window store shared by every process connected to the same Redis.
#[derive(Clone)]
pub struct RedisWindowStore {
    connection: ConnectionManager,
    script: Script,
    command_timeout: Duration,
}

impl fmt::Debug for RedisWindowStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisWindowStore")
            .field("script_hash", &self.script.get_hash())
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

impl RedisWindowStore {
    /// Connect to Redis at `url`.
    ///
    /// # Errors
    /// Returns [`GateError::StoreUnavailable`] if the URL is invalid or the
    /// first connection cannot be established.
    pub async fn connect(url: &str, command_timeout: Duration) -> Result<Self> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;

        debug!("Connected window store to Redis");
        Ok(Self::with_connection(connection, command_timeout))
    }

    /// Build a store over an existing connection manager.
    pub fn with_connection(connection: ConnectionManager, command_timeout: Duration) -> Self {
        Self {
            connection,
            script: Script::new(SLIDING_WINDOW_SCRIPT),
            command_timeout,
        }
    }

    /// A handle to the underlying connection, for sharing with other stores.
    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }

    /// Round-trip a `PING` to check the store is reachable.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: String = tokio::time::timeout(
            self.command_timeout,
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| timeout_error(self.command_timeout))??;
        Ok(())
    }
}

#[async_trait]
impl WindowStore for RedisWindowStore {
    async fn execute(&self, key: &str, op: &WindowOp) -> Result<bool> {
        let mut conn = self.connection.clone();

        let mut invocation = self.script.prepare_invoke();
        invocation
            .key(key)
            .arg(op.interval_ms)
            .arg(op.rate)
            .arg(op.now_ms)
            .arg(&op.member);

        // Abandoning the call on timeout is safe: the script applies fully or not at all
        let outcome: RedisResult<i64> =
            match tokio::time::timeout(self.command_timeout, invocation.invoke_async(&mut conn))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(key = %key, "Window check timed out");
                    return Err(timeout_error(self.command_timeout));
                }
            };

        match outcome {
            Ok(admitted) => Ok(admitted == 1),
            Err(e) => {
                warn!(key = %key, error = %e, "Window check failed");
                Err(e.into())
            }
        }
    }
}

fn timeout_error(after: Duration) -> GateError {
    GateError::StoreUnavailable(format!("command timed out after {:?}", after))
}
