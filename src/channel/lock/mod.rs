//! Locking around credential refreshes.
//!
//! A refresh is an expensive upstream round trip and the platform may
//! invalidate the previous token when a new one is minted, so concurrent
//! holders must not refresh the same credential twice. The token manager
//! takes a scoped lock, re-reads the store, and only then calls upstream.
//!
//! Correctness across processes depends entirely on the supplied lock being
//! shared by every holder; [`NoopLock`] and [`LocalLock`] only cover a
//! single process.

use crate::{ChannelError, CredentialKind};
use async_trait::async_trait;
use std::fmt;

mod local;
pub use local::LocalLock;

#[cfg(feature = "redis-lock")]
mod redis;
#[cfg(feature = "redis-lock")]
pub use self::redis::RedisLock;

/// Lock scope guarding the component credential refresh.
pub const COMPONENT_SCOPE: &str = CredentialKind::Component.as_str();

/// Lock scope guarding one tenant's authorizer credential refresh.
pub fn authorizer_scope(tenant_id: &str) -> String {
    format!("{}:{tenant_id}", CredentialKind::Authorizer)
}

/// An acquired lock.
///
/// Owned exclusively by the acquirer. [`release`](Self::release) is
/// idempotent, and dropping the handle releases it, so a guard held in a
/// scope is released on every exit path, including early returns through
/// `?`.
#[must_use = "the lock is released as soon as the handle is dropped"]
pub struct LockHandle {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl LockHandle {
    /// Wraps a release callback.
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A handle with nothing to release.
    pub fn noop() -> Self {
        Self { release: None }
    }

    /// Releases the lock. Calling it again does nothing.
    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    /// Whether the lock is still held through this handle.
    pub fn is_held(&self) -> bool {
        self.release.is_some()
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockHandle")
            .field("held", &self.is_held())
            .finish()
    }
}

/// A lock primitive, possibly spanning processes and machines.
///
/// Distinct scopes must be independent: holding one scope never blocks
/// another.
///
/// # Example Implementation
///
/// ```rust
/// use open_platform_channel::lock::{DistributedLock, LockHandle};
/// use open_platform_channel::ChannelError;
/// use async_trait::async_trait;
///
/// struct LoggingLock;
///
/// #[async_trait]
/// impl DistributedLock for LoggingLock {
///     async fn acquire(&self, scope: &str) -> Result<LockHandle, ChannelError> {
///         let scope = scope.to_string();
///         println!("acquired {scope}");
///         Ok(LockHandle::new(move || println!("released {scope}")))
///     }
/// }
/// ```
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Acquires the lock for `scope`, waiting as the backend sees fit.
    ///
    /// # Returns
    ///
    /// * `Ok(LockHandle)` - The lock is held until the handle is released or dropped
    /// * `Err(ChannelError::LockAcquisitionFailure)` - The lock could not be obtained
    async fn acquire(&self, scope: &str) -> Result<LockHandle, ChannelError>;
}

/// A lock that never blocks.
///
/// The default when nothing is supplied, suitable only when a single caller
/// refreshes at a time.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLock;

#[async_trait]
impl DistributedLock for NoopLock {
    async fn acquire(&self, _scope: &str) -> Result<LockHandle, ChannelError> {
        Ok(LockHandle::noop())
    }
}
