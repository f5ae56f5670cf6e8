//! Component and authorizer credential lifecycle.
//!
//! Both credentials follow the same shape: read the store, return a valid
//! value without locking, otherwise take the scoped lock, re-read (another
//! holder may have refreshed while we waited) and only then call the
//! platform's token endpoint. The lock is released on every path because
//! the [`LockHandle`](crate::lock::LockHandle) guard is dropped.

use crate::channel::config::ChannelConfig;
use crate::channel::lock::{COMPONENT_SCOPE, DistributedLock, LockHandle, authorizer_scope};
use crate::channel::request::{RequestExecutor, RequestOptions};
use crate::channel::storage::CredentialStore;
use crate::{ChannelError, Credential};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct ComponentTokenResponse {
    component_access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct AuthorizerTokenResponse {
    authorizer_access_token: String,
    expires_in: i64,
}

/// Identity of the third-party platform integration.
#[derive(Clone, PartialEq, Eq)]
pub struct ComponentIdentity {
    pub appid: String,
    pub secret: String,
}

impl fmt::Debug for ComponentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentIdentity")
            .field("appid", &self.appid)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Keeps the component credential and per-tenant authorizer credentials
/// fresh.
///
/// Cheap to clone; clones share the store, lock and executor.
#[derive(Clone)]
pub struct TokenManager {
    identity: Arc<ComponentIdentity>,
    store: Arc<dyn CredentialStore>,
    lock: Arc<dyn DistributedLock>,
    executor: RequestExecutor,
    config: Arc<ChannelConfig>,
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("identity", &self.identity)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    pub fn new(
        identity: ComponentIdentity,
        store: Arc<dyn CredentialStore>,
        lock: Arc<dyn DistributedLock>,
        executor: RequestExecutor,
        config: Arc<ChannelConfig>,
    ) -> Self {
        Self {
            identity: Arc::new(identity),
            store,
            lock,
            executor,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn component_appid(&self) -> &str {
        &self.identity.appid
    }

    /// Returns a valid component credential, refreshing only when needed.
    pub async fn ensure_component(&self) -> Result<Credential, ChannelError> {
        if let Some(credential) = self
            .store
            .get_component_credential()
            .await?
            .filter(Credential::is_valid)
        {
            return Ok(credential);
        }
        self.acquire_component().await
    }

    /// Takes the component lock and refreshes unless another holder already
    /// did.
    pub async fn acquire_component(&self) -> Result<Credential, ChannelError> {
        let _guard = self.lock_scope(COMPONENT_SCOPE).await?;

        if let Some(credential) = self
            .store
            .get_component_credential()
            .await?
            .filter(Credential::is_valid)
        {
            debug!(scope = COMPONENT_SCOPE, "Credential refreshed by another holder");
            return Ok(credential);
        }

        let ticket = self.store.get_verify_ticket().await?;
        let url = format!("{}component/api_component_token", self.config.api_base);
        let body = json!({
            "component_appid": self.identity.appid,
            "component_appsecret": self.identity.secret,
            "component_verify_ticket": ticket,
        });
        let response: ComponentTokenResponse =
            self.call_token_endpoint(&self.identity.appid, &url, body).await?;

        let credential = Credential::from_lifetime(
            response.component_access_token,
            response.expires_in,
            self.config.expiry_margin,
        )?;
        self.store.save_component_credential(&credential).await?;
        info!(
            scope = COMPONENT_SCOPE,
            expires_in = response.expires_in,
            "Component credential refreshed"
        );
        Ok(credential)
    }

    /// Returns a valid authorizer credential for `tenant_id`, refreshing
    /// only when needed.
    pub async fn ensure_authorizer(&self, tenant_id: &str) -> Result<Credential, ChannelError> {
        if let Some(credential) = self
            .store
            .get_authorizer_credential(tenant_id)
            .await?
            .filter(Credential::is_valid)
        {
            return Ok(credential);
        }
        self.acquire_authorizer(tenant_id).await
    }

    /// Takes the tenant's lock and refreshes unless another holder already
    /// did.
    ///
    /// The component credential is obtained before the authorizer lock is
    /// taken, so locks never nest and the authorizer lock spans at most one
    /// upstream round trip.
    pub async fn acquire_authorizer(&self, tenant_id: &str) -> Result<Credential, ChannelError> {
        let component = self.ensure_component().await?;

        let scope = authorizer_scope(tenant_id);
        let _guard = self.lock_scope(&scope).await?;

        if let Some(credential) = self
            .store
            .get_authorizer_credential(tenant_id)
            .await?
            .filter(Credential::is_valid)
        {
            debug!(scope = %scope, "Credential refreshed by another holder");
            return Ok(credential);
        }

        let refresh_token = self.store.get_refresh_token(tenant_id).await?;
        let url = format!(
            "{}component/api_authorizer_token?component_access_token={}",
            self.config.api_base, component.secret
        );
        let body = json!({
            "component_appid": self.identity.appid,
            "authorizer_appid": tenant_id,
            "authorizer_refresh_token": refresh_token,
        });
        let response: AuthorizerTokenResponse =
            self.call_token_endpoint(tenant_id, &url, body).await?;

        let credential = Credential::from_lifetime(
            response.authorizer_access_token,
            response.expires_in,
            self.config.expiry_margin,
        )?;
        self.store
            .save_authorizer_credential(tenant_id, &credential)
            .await?;
        info!(
            scope = %scope,
            tenant = %tenant_id,
            expires_in = response.expires_in,
            "Authorizer credential refreshed"
        );
        Ok(credential)
    }

    /// Forgets the tenant's authorizer credential so the next ensure refetches.
    pub async fn invalidate_authorizer(&self, tenant_id: &str) -> Result<(), ChannelError> {
        debug!(tenant = %tenant_id, "Invalidating authorizer credential");
        self.store.clear_authorizer_credential(tenant_id).await
    }

    /// Forgets the component credential so the next ensure refetches.
    pub async fn invalidate_component(&self) -> Result<(), ChannelError> {
        debug!("Invalidating component credential");
        self.store.clear_component_credential().await
    }

    async fn lock_scope(&self, scope: &str) -> Result<LockHandle, ChannelError> {
        self.lock.acquire(scope).await.map_err(|e| match e {
            ChannelError::LockAcquisitionFailure(_) => e,
            other => ChannelError::LockAcquisitionFailure(format!("{scope}: {other}")),
        })
    }

    /// Single attempt against a token endpoint; never retried.
    async fn call_token_endpoint<T: DeserializeOwned>(
        &self,
        tenant_id: &str,
        url: &str,
        body: serde_json::Value,
    ) -> Result<T, ChannelError> {
        let options = RequestOptions::post_json(body).with_timeout(self.config.token_timeout);
        let value = self
            .executor
            .execute(tenant_id, url, &options)
            .await?
            .into_json()?;
        serde_json::from_value(value)
            .map_err(|e| ChannelError::MalformedResponse(format!("token response: {e}")))
    }
}
