//! Sliding window rate limiting against a shared store.

mod clock;
mod gate;
mod policy;
mod redis_store;
mod store;
pub mod window;

pub use clock::{Clock, MockClock, SystemClock};
pub use gate::RateLimiterGate;
pub use policy::Policy;
pub use redis_store::RedisWindowStore;
pub use store::{MemoryWindowStore, WindowStore};
pub use window::{WindowOp, WindowRecord, SLIDING_WINDOW_SCRIPT};
