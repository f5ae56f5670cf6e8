use crate::ChannelError;
use crate::channel::client::PlatformClient;
use crate::channel::config::ChannelConfig;
use crate::channel::lock::{DistributedLock, NoopLock};
use crate::channel::request::{NoopHook, RequestExecutor, RequestHook, RequestOptions};
use crate::channel::retrier::RequestRetrier;
use crate::channel::storage::{CredentialStore, MemoryCredentialStore};
use crate::channel::token_manager::{ComponentIdentity, TokenManager};
use crate::channel::transport::Transport;
use std::sync::Arc;

/// A builder for creating a [`PlatformClient`].
///
/// Defaults to a [`MemoryCredentialStore`] seeded from
/// [`with_verify_ticket`](Self::with_verify_ticket) and
/// [`with_refresh_token`](Self::with_refresh_token), a [`NoopLock`], a
/// silent hook and, with the `reqwest-transport` feature, a `reqwest`
/// transport.
#[must_use = "The builder does nothing unless `.build()` is called."]
pub struct PlatformClientBuilder {
    component_appid: String,
    component_secret: String,
    authorizer_appid: String,
    verify_ticket: Option<String>,
    refresh_token: Option<String>,
    store: Option<Arc<dyn CredentialStore>>,
    lock: Arc<dyn DistributedLock>,
    transport: Option<Arc<dyn Transport>>,
    hook: Arc<dyn RequestHook>,
    config: Option<ChannelConfig>,
    defaults: RequestOptions,
}

impl PlatformClientBuilder {
    pub(crate) fn new(
        component_appid: impl Into<String>,
        component_secret: impl Into<String>,
        authorizer_appid: impl Into<String>,
    ) -> Self {
        Self {
            component_appid: component_appid.into(),
            component_secret: component_secret.into(),
            authorizer_appid: authorizer_appid.into(),
            verify_ticket: None,
            refresh_token: None,
            store: None,
            lock: Arc::new(NoopLock),
            transport: None,
            hook: Arc::new(NoopHook),
            config: None,
            defaults: RequestOptions::default(),
        }
    }

    /// Seeds the default in-memory store with the latest verify ticket.
    ///
    /// Ignored when a store is supplied with [`with_store`](Self::with_store).
    pub fn with_verify_ticket(mut self, ticket: impl Into<String>) -> Self {
        self.verify_ticket = Some(ticket.into());
        self
    }

    /// Seeds the default in-memory store with the authorizer's refresh token.
    ///
    /// Ignored when a store is supplied with [`with_store`](Self::with_store).
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Uses a shared credential store instead of process memory.
    pub fn with_store<T: CredentialStore + 'static>(mut self, store: Arc<T>) -> Self {
        self.store = Some(store);
        self
    }

    /// Uses a lock around credential refreshes.
    ///
    /// Must be shared by every process using the same store for the
    /// single-refresh guarantee to hold.
    pub fn with_lock<T: DistributedLock + 'static>(mut self, lock: Arc<T>) -> Self {
        self.lock = lock;
        self
    }

    pub fn with_transport<T: Transport + 'static>(mut self, transport: Arc<T>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Observes every request attempt, including token endpoint calls.
    pub fn with_request_hook<H: RequestHook + 'static>(mut self, hook: H) -> Self {
        self.hook = Arc::new(hook);
        self
    }

    /// Replaces the configuration. Defaults to [`ChannelConfig::default`].
    pub fn with_config(mut self, config: ChannelConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Options merged under every call.
    pub fn with_default_options(mut self, defaults: RequestOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// `Configuration` when no transport was supplied and the
    /// `reqwest-transport` feature is disabled.
    pub fn build(self) -> Result<PlatformClient, ChannelError> {
        let config = Arc::new(self.config.unwrap_or_default());
        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };

        let store: Arc<dyn CredentialStore> = match self.store {
            Some(store) => store,
            None => {
                let mut store = MemoryCredentialStore::new(self.verify_ticket.unwrap_or_default())
                    .with_production_mode(config.production);
                if let Some(refresh_token) = self.refresh_token {
                    store = store.with_refresh_token(&self.authorizer_appid, refresh_token);
                }
                Arc::new(store)
            }
        };

        for warning in config.validate() {
            tracing::warn!(warning = %warning, "Questionable channel configuration");
        }

        let executor = RequestExecutor::new(transport, self.hook, config.api_timeout)
            .with_defaults(self.defaults);
        let tokens = TokenManager::new(
            ComponentIdentity {
                appid: self.component_appid,
                secret: self.component_secret,
            },
            store,
            self.lock,
            executor.clone(),
            Arc::clone(&config),
        );
        let retrier = RequestRetrier::new(executor, tokens.clone(), config.max_retries);

        Ok(PlatformClient::from_parts(
            self.authorizer_appid,
            tokens,
            retrier,
            config,
        ))
    }
}

#[cfg(feature = "reqwest-transport")]
fn default_transport() -> Result<Arc<dyn Transport>, ChannelError> {
    Ok(Arc::new(crate::channel::transport::ReqwestTransport::new()))
}

#[cfg(not(feature = "reqwest-transport"))]
fn default_transport() -> Result<Arc<dyn Transport>, ChannelError> {
    Err(ChannelError::Configuration(
        "No transport supplied and the reqwest-transport feature is disabled".to_string(),
    ))
}
