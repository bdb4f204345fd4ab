//! chainfeed-queue: where forwarded messages go.
//!
//! - [`QueuePublisher`]: the async trait the bridge publishes through
//! - [`RedisQueuePublisher`]: pushes onto a Redis list over its own connection
//! - [`MemoryQueue`]: in-process queue for tests and dry runs

pub mod memory;
pub mod publisher;
pub mod redis_list;

pub use memory::MemoryQueue;
pub use publisher::{PushSide, QueuePublisher};
pub use redis_list::{RedisConfig, RedisQueuePublisher};
