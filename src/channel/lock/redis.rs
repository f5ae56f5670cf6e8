//! Redis-backed distributed lock.
//!
//! Uses `SET key owner NX PX ttl` to acquire and a compare-and-delete
//! script to release, so a holder whose lease already expired can never
//! release a lock that another process has since taken.

use super::{DistributedLock, LockHandle};
use crate::ChannelError;
use async_trait::async_trait;
use redis::{Client, aio::MultiplexedConnection};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// A lock shared by every process talking to the same Redis.
///
/// # Example
///
/// ```rust,no_run
/// use open_platform_channel::lock::{DistributedLock, RedisLock};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), open_platform_channel::ChannelError> {
/// let lock = RedisLock::new("redis://localhost:6379", "open_platform")?
///     .with_lease(Duration::from_secs(15));
/// let handle = lock.acquire("component_access_token").await?;
/// drop(handle);
/// # Ok(())
/// # }
/// ```
pub struct RedisLock {
    client: Client,
    key_prefix: String,
    lease: Duration,
    acquire_timeout: Duration,
    retry_interval: Duration,
    /// Shared persistent connection
    conn: Arc<Mutex<Option<MultiplexedConnection>>>,
}

impl RedisLock {
    /// Creates a lock against the given Redis URL.
    ///
    /// Defaults: 30 s lease (longer than the 10 s token call timeout),
    /// 15 s acquisition timeout, 50 ms polling interval.
    pub fn new(redis_url: &str, key_prefix: &str) -> Result<Self, ChannelError> {
        let client = Client::open(redis_url).map_err(|e| {
            ChannelError::LockAcquisitionFailure(format!("Redis client error: {e}"))
        })?;

        Ok(Self {
            client,
            key_prefix: key_prefix.to_string(),
            lease: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(15),
            retry_interval: Duration::from_millis(50),
            conn: Arc::new(Mutex::new(None)),
        })
    }

    /// Sets how long an unreleased lock survives a crashed holder.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Sets how long `acquire` keeps polling before failing.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Sets the delay between acquisition attempts.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    async fn get_connection(&self) -> Result<MultiplexedConnection, ChannelError> {
        let mut conn_guard = self.conn.lock().await;
        if let Some(conn) = conn_guard.as_ref() {
            return Ok(conn.clone());
        }

        let new_conn = self
            .client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| {
                ChannelError::LockAcquisitionFailure(format!("Redis connection failed: {e}"))
            })?;
        *conn_guard = Some(new_conn.clone());
        Ok(new_conn)
    }

    fn make_key(&self, scope: &str) -> String {
        let mut key = String::with_capacity(self.key_prefix.len() + scope.len() + 6);
        key.push_str(&self.key_prefix);
        key.push_str(":lock:");
        key.push_str(scope);
        key
    }
}

#[async_trait]
impl DistributedLock for RedisLock {
    async fn acquire(&self, scope: &str) -> Result<LockHandle, ChannelError> {
        let key = self.make_key(scope);
        let owner = uuid::Uuid::new_v4().to_string();
        let deadline = Instant::now() + self.acquire_timeout;
        let mut conn = self.get_connection().await?;

        loop {
            let acquired: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(&owner)
                .arg("NX")
                .arg("PX")
                .arg(self.lease.as_millis() as u64)
                .query_async(&mut conn)
                .await
                .map_err(|e| ChannelError::LockAcquisitionFailure(e.to_string()))?;

            if acquired.is_some() {
                debug!(key = %key, "Redis lock acquired");
                break;
            }
            if Instant::now() >= deadline {
                return Err(ChannelError::LockAcquisitionFailure(format!(
                    "timed out after {:?} waiting for {key}",
                    self.acquire_timeout
                )));
            }
            tokio::time::sleep(self.retry_interval).await;
        }

        Ok(LockHandle::new(move || {
            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                warn!(key = %key, "No runtime to release Redis lock; it expires with its lease");
                return;
            };
            runtime.spawn(async move {
                let script = redis::Script::new(RELEASE_SCRIPT);
                let released: redis::RedisResult<i32> = script
                    .key(&key)
                    .arg(&owner)
                    .invoke_async(&mut conn)
                    .await;
                match released {
                    Ok(1) => debug!(key = %key, "Redis lock released"),
                    Ok(_) => warn!(key = %key, "Redis lock lease expired before release"),
                    Err(e) => warn!(key = %key, error = %e, "Failed to release Redis lock"),
                }
            });
        }))
    }
}
