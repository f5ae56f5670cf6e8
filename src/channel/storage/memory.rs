//! In-memory credential store.
//!
//! This module provides the default store used when none is supplied. It
//! keeps everything in the current process, which is fine for a single
//! instance but silently breaks the single-refresh guarantee once several
//! processes or machines share an integration.

use super::CredentialStore;
use crate::{ChannelError, Credential, CredentialKind};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// A process-local credential store.
///
/// Credentials live behind tokio `RwLock`s; authorizer credentials and
/// refresh tokens are keyed by tenant id. In production mode every save
/// logs a warning, because tokens kept here are invisible to other
/// processes.
///
/// # Example
///
/// ```rust
/// use open_platform_channel::storage::{CredentialStore, MemoryCredentialStore};
/// use open_platform_channel::Credential;
///
/// # async fn example() -> Result<(), open_platform_channel::ChannelError> {
/// let store = MemoryCredentialStore::new("ticket@@@xyz")
///     .with_refresh_token("wx_tenant", "refreshtoken@@@abc");
///
/// store
///     .save_authorizer_credential("wx_tenant", &Credential::new("token", i64::MAX))
///     .await?;
/// assert!(store.get_authorizer_credential("wx_tenant").await?.is_some());
/// assert_eq!(store.get_verify_ticket().await?, "ticket@@@xyz");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryCredentialStore {
    component: Arc<RwLock<Option<Credential>>>,
    authorizers: Arc<RwLock<HashMap<String, Credential>>>,
    refresh_tokens: Arc<RwLock<HashMap<String, String>>>,
    verify_ticket: Arc<RwLock<String>>,
    production: bool,
}

impl MemoryCredentialStore {
    /// Creates a store seeded with the current verify ticket.
    pub fn new(verify_ticket: impl Into<String>) -> Self {
        Self {
            verify_ticket: Arc::new(RwLock::new(verify_ticket.into())),
            ..Self::default()
        }
    }

    /// Seeds the refresh token for a tenant.
    pub fn with_refresh_token(self, tenant_id: &str, refresh_token: impl Into<String>) -> Self {
        // No guard can be held while the store is still being built.
        if let Ok(mut tokens) = self.refresh_tokens.try_write() {
            tokens.insert(tenant_id.to_string(), refresh_token.into());
        }
        self
    }

    /// Enables the production-mode warning on every save.
    pub fn with_production_mode(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    /// Replaces the verify ticket, typically from a `component_verify_ticket` push.
    pub async fn update_verify_ticket(&self, ticket: impl Into<String>) {
        *self.verify_ticket.write().await = ticket.into();
    }

    /// Replaces the refresh token for a tenant.
    pub async fn update_refresh_token(&self, tenant_id: &str, refresh_token: impl Into<String>) {
        self.refresh_tokens
            .write()
            .await
            .insert(tenant_id.to_string(), refresh_token.into());
    }

    fn warn_if_production(&self, kind: CredentialKind) {
        if self.production {
            warn!(
                credential = %kind,
                "Don't keep tokens in process memory when running in a cluster or on multiple machines"
            );
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get_component_credential(&self) -> Result<Option<Credential>, ChannelError> {
        Ok(self.component.read().await.clone())
    }

    async fn save_component_credential(&self, credential: &Credential) -> Result<(), ChannelError> {
        *self.component.write().await = Some(credential.clone());
        self.warn_if_production(CredentialKind::Component);
        Ok(())
    }

    async fn clear_component_credential(&self) -> Result<(), ChannelError> {
        *self.component.write().await = None;
        Ok(())
    }

    async fn get_authorizer_credential(
        &self,
        tenant_id: &str,
    ) -> Result<Option<Credential>, ChannelError> {
        Ok(self.authorizers.read().await.get(tenant_id).cloned())
    }

    async fn save_authorizer_credential(
        &self,
        tenant_id: &str,
        credential: &Credential,
    ) -> Result<(), ChannelError> {
        self.authorizers
            .write()
            .await
            .insert(tenant_id.to_string(), credential.clone());
        self.warn_if_production(CredentialKind::Authorizer);
        Ok(())
    }

    async fn clear_authorizer_credential(&self, tenant_id: &str) -> Result<(), ChannelError> {
        self.authorizers.write().await.remove(tenant_id);
        Ok(())
    }

    async fn get_refresh_token(&self, tenant_id: &str) -> Result<String, ChannelError> {
        self.refresh_tokens
            .read()
            .await
            .get(tenant_id)
            .cloned()
            .ok_or_else(|| {
                ChannelError::Storage(format!("No refresh token stored for tenant {tenant_id}"))
            })
    }

    async fn get_verify_ticket(&self) -> Result<String, ChannelError> {
        let ticket = self.verify_ticket.read().await.clone();
        if ticket.is_empty() {
            return Err(ChannelError::Storage(
                "No component verify ticket received yet".to_string(),
            ));
        }
        Ok(ticket)
    }
}
