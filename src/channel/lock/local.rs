//! In-process keyed lock.

use super::{DistributedLock, LockHandle};
use crate::ChannelError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::trace;

/// A lock that serializes refreshes within one process.
///
/// Each scope gets its own tokio mutex, so refreshing one tenant never
/// blocks another. Clones share the same set of mutexes.
///
/// # Example
///
/// ```rust
/// use open_platform_channel::lock::{DistributedLock, LocalLock};
///
/// # async fn example() -> Result<(), open_platform_channel::ChannelError> {
/// let lock = LocalLock::new();
/// let handle = lock.acquire("component_access_token").await?;
/// drop(handle);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default, Clone)]
pub struct LocalLock {
    scopes: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
    wait_timeout: Option<Duration>,
}

impl LocalLock {
    /// Creates a lock that waits indefinitely.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails acquisition with `LockAcquisitionFailure` after waiting `timeout`.
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    fn scope_mutex(&self, scope: &str) -> Result<Arc<tokio::sync::Mutex<()>>, ChannelError> {
        let mut scopes = self
            .scopes
            .lock()
            .map_err(|_| ChannelError::LockAcquisitionFailure("lock registry poisoned".to_string()))?;
        Ok(Arc::clone(scopes.entry(scope.to_string()).or_default()))
    }
}

#[async_trait]
impl DistributedLock for LocalLock {
    async fn acquire(&self, scope: &str) -> Result<LockHandle, ChannelError> {
        let mutex = self.scope_mutex(scope)?;

        let guard = match self.wait_timeout {
            Some(timeout) => tokio::time::timeout(timeout, mutex.lock_owned())
                .await
                .map_err(|_| {
                    ChannelError::LockAcquisitionFailure(format!(
                        "timed out after {timeout:?} waiting for {scope}"
                    ))
                })?,
            None => mutex.lock_owned().await,
        };

        trace!(scope = %scope, "Local lock acquired");
        Ok(LockHandle::new(move || drop(guard)))
    }
}
