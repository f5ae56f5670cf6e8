use std::sync::Arc;

use crate::channel::client_builder::PlatformClientBuilder;
use crate::channel::config::ChannelConfig;
use crate::channel::request::{ApiResponse, RequestOptions};
use crate::channel::retrier::RequestRetrier;
use crate::channel::token_manager::TokenManager;
use crate::{ChannelError, Credential};

/// Client for platform APIs called on behalf of one authorizer (tenant).
///
/// Holds the token manager and retrier; cloning or rebinding with
/// [`for_tenant`](Self::for_tenant) shares both, so every handle sees the
/// same credentials and lock.
///
/// # Example
///
/// ```rust,no_run
/// use open_platform_channel::{PlatformClient, RequestOptions};
///
/// # async fn example() -> Result<(), open_platform_channel::ChannelError> {
/// let client = PlatformClient::builder("wx_component", "component_secret", "wx_tenant")
///     .with_verify_ticket("ticket@@@xyz")
///     .with_refresh_token("refreshtoken@@@abc")
///     .build()?;
///
/// let token = client.ensure_access_token().await?;
/// let url = client.url_for(&client.config().wxa_base, "get_category", &token.secret);
/// let categories = client.request(&url, &RequestOptions::get()).await?;
/// # let _ = categories;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PlatformClient {
    tenant_id: String,
    tokens: TokenManager,
    retrier: RequestRetrier,
    config: Arc<ChannelConfig>,
}

impl PlatformClient {
    /// Starts building a client for `authorizer_appid`.
    pub fn builder(
        component_appid: impl Into<String>,
        component_secret: impl Into<String>,
        authorizer_appid: impl Into<String>,
    ) -> PlatformClientBuilder {
        PlatformClientBuilder::new(component_appid, component_secret, authorizer_appid)
    }

    pub(crate) fn from_parts(
        tenant_id: String,
        tokens: TokenManager,
        retrier: RequestRetrier,
        config: Arc<ChannelConfig>,
    ) -> Self {
        Self {
            tenant_id,
            tokens,
            retrier,
            config,
        }
    }

    /// The authorizer app id this client acts for.
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn token_manager(&self) -> &TokenManager {
        &self.tokens
    }

    /// A client for another authorizer sharing this client's store, lock
    /// and transport.
    pub fn for_tenant(&self, authorizer_appid: impl Into<String>) -> Self {
        Self {
            tenant_id: authorizer_appid.into(),
            ..self.clone()
        }
    }

    /// Returns a valid authorizer credential, refreshing only when needed.
    pub async fn ensure_access_token(&self) -> Result<Credential, ChannelError> {
        self.tokens.ensure_authorizer(&self.tenant_id).await
    }

    /// Returns a valid component credential, refreshing only when needed.
    pub async fn ensure_component_token(&self) -> Result<Credential, ChannelError> {
        self.tokens.ensure_component().await
    }

    /// Goes straight to the locked refresh path for the authorizer credential.
    ///
    /// Still returns a credential another holder refreshed while this call
    /// waited for the lock.
    pub async fn access_token(&self) -> Result<Credential, ChannelError> {
        self.tokens.acquire_authorizer(&self.tenant_id).await
    }

    /// Goes straight to the locked refresh path for the component credential.
    pub async fn component_access_token(&self) -> Result<Credential, ChannelError> {
        self.tokens.acquire_component().await
    }

    /// Calls a platform API with the configured credential retry budget.
    pub async fn request(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<ApiResponse, ChannelError> {
        self.retrier.call(&self.tenant_id, url, options).await
    }

    /// Calls a platform API with an explicit credential retry budget.
    pub async fn request_with_retries(
        &self,
        url: &str,
        options: &RequestOptions,
        retries: u32,
    ) -> Result<ApiResponse, ChannelError> {
        self.retrier
            .call_with_retries(&self.tenant_id, url, options, retries)
            .await
    }

    /// Joins `prefix` and `path` and appends the access token.
    pub fn url_for(&self, prefix: &str, path: &str, access_token: &str) -> String {
        let separator = if path.contains('?') { '&' } else { '?' };
        format!("{prefix}{path}{separator}access_token={access_token}")
    }

    /// Ensures the authorizer credential and returns the authenticated URL.
    pub(crate) async fn authorized_url(
        &self,
        prefix: &str,
        path: &str,
    ) -> Result<String, ChannelError> {
        let credential = self.ensure_access_token().await?;
        Ok(self.url_for(prefix, path, &credential.secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::transport::{HttpRequest, HttpResponse, Transport};
    use async_trait::async_trait;

    struct UnreachableTransport;

    #[async_trait]
    impl Transport for UnreachableTransport {
        async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ChannelError> {
            Err(ChannelError::transport(&request.url, None, "offline"))
        }
    }

    fn client() -> PlatformClient {
        PlatformClient::builder("wx_component", "secret", "wx_tenant")
            .with_transport(Arc::new(UnreachableTransport))
            .with_verify_ticket("ticket")
            .with_refresh_token("refresh")
            .build()
            .unwrap()
    }

    #[test]
    fn test_url_for() {
        let client = client();
        assert_eq!(
            client.url_for("https://api.weixin.qq.com/wxa/", "get_category", "T"),
            "https://api.weixin.qq.com/wxa/get_category?access_token=T"
        );
        assert_eq!(
            client.url_for("https://api.weixin.qq.com/wxa/", "getpage?lang=en", "T"),
            "https://api.weixin.qq.com/wxa/getpage?lang=en&access_token=T"
        );
    }

    #[tokio::test]
    async fn test_for_tenant_shares_store() -> Result<(), ChannelError> {
        let client = client();
        let other = client.for_tenant("wx_other");
        assert_eq!(other.tenant_id(), "wx_other");

        client
            .token_manager()
            .store()
            .save_authorizer_credential("wx_other", &Credential::new("shared", i64::MAX))
            .await?;
        assert_eq!(other.ensure_access_token().await?.secret, "shared");
        Ok(())
    }

    #[tokio::test]
    async fn test_default_store_is_seeded() -> Result<(), ChannelError> {
        let client = client();
        let store = client.token_manager().store();
        assert_eq!(store.get_verify_ticket().await?, "ticket");
        assert_eq!(store.get_refresh_token("wx_tenant").await?, "refresh");
        Ok(())
    }

    #[tokio::test]
    async fn test_transport_errors_surface() {
        let err = client().ensure_component_token().await.unwrap_err();
        assert!(matches!(err, ChannelError::Transport { status: None, .. }));
    }
}
