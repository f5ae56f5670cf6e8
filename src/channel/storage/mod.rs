//! Pluggable storage for credentials and the secrets used to mint them.
//!
//! This module provides a trait-based storage system so that tokens can be
//! shared across processes and machines. The crate only ships an in-memory
//! backend; deployments running more than one process must supply a shared
//! store (database, Redis, ...) together with a shared
//! [`DistributedLock`](crate::DistributedLock).

use crate::{ChannelError, Credential};
use async_trait::async_trait;

mod memory;
pub use memory::MemoryCredentialStore;

/// Abstract storage backend for component and authorizer credentials.
///
/// # Thread Safety
///
/// All methods are async and must be thread-safe. The token manager only
/// guarantees a single refresh per expiry window when every holder of the
/// lock reads and writes through the same logical store.
///
/// # Error Handling
///
/// Backend failures should be mapped to [`ChannelError::Storage`].
///
/// # Example Implementation
///
/// ```rust
/// use open_platform_channel::storage::CredentialStore;
/// use open_platform_channel::{ChannelError, Credential};
/// use async_trait::async_trait;
/// use std::collections::HashMap;
/// use tokio::sync::RwLock;
///
/// #[derive(Default)]
/// pub struct SingleTenantStore {
///     component: RwLock<Option<Credential>>,
///     authorizers: RwLock<HashMap<String, Credential>>,
/// }
///
/// #[async_trait]
/// impl CredentialStore for SingleTenantStore {
///     async fn get_component_credential(&self) -> Result<Option<Credential>, ChannelError> {
///         Ok(self.component.read().await.clone())
///     }
///
///     async fn save_component_credential(&self, credential: &Credential) -> Result<(), ChannelError> {
///         *self.component.write().await = Some(credential.clone());
///         Ok(())
///     }
///
///     async fn clear_component_credential(&self) -> Result<(), ChannelError> {
///         *self.component.write().await = None;
///         Ok(())
///     }
///
///     async fn get_authorizer_credential(&self, tenant_id: &str) -> Result<Option<Credential>, ChannelError> {
///         Ok(self.authorizers.read().await.get(tenant_id).cloned())
///     }
///
///     async fn save_authorizer_credential(&self, tenant_id: &str, credential: &Credential) -> Result<(), ChannelError> {
///         self.authorizers.write().await.insert(tenant_id.to_string(), credential.clone());
///         Ok(())
///     }
///
///     async fn clear_authorizer_credential(&self, tenant_id: &str) -> Result<(), ChannelError> {
///         self.authorizers.write().await.remove(tenant_id);
///         Ok(())
///     }
///
///     async fn get_refresh_token(&self, _tenant_id: &str) -> Result<String, ChannelError> {
///         Ok("refresh-token-from-vault".to_string())
///     }
///
///     async fn get_verify_ticket(&self) -> Result<String, ChannelError> {
///         Ok("ticket@@@pushed-by-platform".to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns the cached component credential, if any.
    ///
    /// Expired credentials may be returned; the caller checks validity.
    async fn get_component_credential(&self) -> Result<Option<Credential>, ChannelError>;

    /// Persists a freshly acquired component credential.
    async fn save_component_credential(&self, credential: &Credential) -> Result<(), ChannelError>;

    /// Removes the cached component credential so the next lookup refetches.
    async fn clear_component_credential(&self) -> Result<(), ChannelError>;

    /// Returns the cached authorizer credential for a tenant, if any.
    async fn get_authorizer_credential(
        &self,
        tenant_id: &str,
    ) -> Result<Option<Credential>, ChannelError>;

    /// Persists a freshly acquired authorizer credential for a tenant.
    async fn save_authorizer_credential(
        &self,
        tenant_id: &str,
        credential: &Credential,
    ) -> Result<(), ChannelError>;

    /// Removes the tenant's authorizer credential so the next lookup refetches.
    async fn clear_authorizer_credential(&self, tenant_id: &str) -> Result<(), ChannelError>;

    /// Returns the tenant's refresh token, handed out once at authorization time.
    async fn get_refresh_token(&self, tenant_id: &str) -> Result<String, ChannelError>;

    /// Returns the latest verify ticket pushed by the platform.
    async fn get_verify_ticket(&self) -> Result<String, ChannelError>;
}
