//! Redis list backend.
//!
//! Holds one multiplexed connection, established on first publish and
//! re-established after any failure. The connection is shared by concurrent
//! callers; the lock only guards the cached handle.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use chainfeed_core::error::PublishError;
use chainfeed_core::message::ForwardedMessage;

use crate::publisher::{PushSide, QueuePublisher};

#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// `redis://` or `rediss://` connection URL.
    pub url: String,
    pub push: PushSide,
    /// Upper bound for one publish, connect included.
    pub timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".into(),
            push: PushSide::Right,
            timeout: Duration::from_secs(5),
        }
    }
}

pub struct RedisQueuePublisher {
    client: Client,
    config: RedisConfig,
    conn: Mutex<Option<MultiplexedConnection>>,
    target: String,
}

impl RedisQueuePublisher {
    /// Parse the URL. No connection is made until the first publish.
    pub fn new(config: RedisConfig) -> Result<Self, PublishError> {
        let client =
            Client::open(config.url.as_str()).map_err(|e| PublishError::Connect(e.to_string()))?;
        let target = redacted(&config.url);
        Ok(Self {
            client,
            config,
            conn: Mutex::new(None),
            target,
        })
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    async fn connection(&self) -> Result<MultiplexedConnection, PublishError> {
        let mut cached = self.conn.lock().await;
        if let Some(conn) = cached.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| PublishError::Connect(e.to_string()))?;
        info!(target_url = %self.target, "redis connection established");
        *cached = Some(conn.clone());
        Ok(conn)
    }

    async fn invalidate(&self) {
        self.conn.lock().await.take();
    }

    async fn push(&self, message: &ForwardedMessage) -> Result<i64, PublishError> {
        let mut conn = self.connection().await?;
        let queue = message.queue.as_str();
        let payload = message.payload.as_str();

        let result = match self.config.push {
            PushSide::Right => conn.rpush::<_, _, i64>(queue, payload).await,
            PushSide::Left => conn.lpush::<_, _, i64>(queue, payload).await,
        };
        result.map_err(|e| PublishError::Command {
            queue: message.queue.clone(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl QueuePublisher for RedisQueuePublisher {
    async fn publish(&self, message: &ForwardedMessage) -> Result<(), PublishError> {
        let outcome = tokio::time::timeout(self.config.timeout, self.push(message)).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(PublishError::Timeout {
                queue: message.queue.clone(),
                ms: self.config.timeout.as_millis() as u64,
            }),
        };

        match result {
            Ok(depth) => {
                debug!(queue = %message.queue, depth, side = %self.config.push, "pushed");
                Ok(())
            }
            Err(e) => {
                warn!(
                    target_url = %self.target,
                    queue = %message.queue,
                    error = %e,
                    "publish failed, dropping redis connection"
                );
                self.invalidate().await;
                Err(e)
            }
        }
    }

    fn target(&self) -> &str {
        &self.target
    }
}

/// Strips the password from a connection URL for logging.
fn redacted(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            let userinfo = &url[scheme_end + 3..at];
            let user = userinfo.split(':').next().unwrap_or_default();
            format!("{}{}:***{}", &url[..scheme_end + 3], user, &url[at..])
        }
        _ => url.to_string(),
    }
}
