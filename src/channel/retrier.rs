//! Credential-invalid retry policy.

use crate::ChannelError;
use crate::channel::request::{ApiResponse, RequestExecutor, RequestOptions};
use crate::channel::token_manager::TokenManager;
use tracing::{info, warn};
use url::Url;

/// Retries calls the platform rejected because of a stale access token.
///
/// On `CredentialInvalid` with budget left, the tenant's authorizer
/// credential is invalidated, a fresh one is ensured, the `access_token`
/// query parameter of the URL is rewritten (only when present) and the call
/// is repeated. Every other error surfaces immediately.
#[derive(Debug, Clone)]
pub struct RequestRetrier {
    executor: RequestExecutor,
    tokens: TokenManager,
    max_retries: u32,
}

impl RequestRetrier {
    pub fn new(executor: RequestExecutor, tokens: TokenManager, max_retries: u32) -> Self {
        Self {
            executor,
            tokens,
            max_retries,
        }
    }

    /// Calls `url` for `tenant_id` with the configured retry budget.
    pub async fn call(
        &self,
        tenant_id: &str,
        url: &str,
        options: &RequestOptions,
    ) -> Result<ApiResponse, ChannelError> {
        self.call_with_retries(tenant_id, url, options, self.max_retries)
            .await
    }

    /// Calls `url` for `tenant_id`, retrying at most `retries` times after
    /// credential rejections.
    ///
    /// When the budget is exhausted the last error is returned.
    pub async fn call_with_retries(
        &self,
        tenant_id: &str,
        url: &str,
        options: &RequestOptions,
        retries: u32,
    ) -> Result<ApiResponse, ChannelError> {
        let mut url = url.to_string();
        let mut remaining = retries;

        loop {
            match self.executor.execute(tenant_id, &url, options).await {
                Err(e) if e.is_credential_invalid() && remaining > 0 => {
                    remaining -= 1;
                    warn!(
                        tenant = %tenant_id,
                        code = ?e.code(),
                        remaining,
                        "Access token rejected, refreshing and retrying"
                    );
                    self.tokens.invalidate_authorizer(tenant_id).await?;
                    let credential = self.tokens.ensure_authorizer(tenant_id).await?;
                    url = rewrite_access_token(&url, &credential.secret)?;
                }
                Err(e) if e.is_credential_invalid() => {
                    info!(tenant = %tenant_id, retries, "Retry budget exhausted");
                    return Err(e);
                }
                other => return other,
            }
        }
    }
}

/// Replaces the value of the `access_token` query parameter.
///
/// URLs without that parameter are returned unchanged.
pub fn rewrite_access_token(url: &str, token: &str) -> Result<String, ChannelError> {
    let mut parsed = Url::parse(url)
        .map_err(|e| ChannelError::Configuration(format!("Invalid request URL {url}: {e}")))?;

    if !parsed.query_pairs().any(|(k, _)| k == "access_token") {
        return Ok(url.to_string());
    }

    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| {
            let value = if k == "access_token" {
                token.to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), value)
        })
        .collect();
    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    Ok(parsed.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_replaces_only_access_token() {
        let rewritten = rewrite_access_token(
            "https://api.weixin.qq.com/wxa/get_category?access_token=OLD&lang=zh_CN",
            "NEW",
        )
        .unwrap();
        assert_eq!(
            rewritten,
            "https://api.weixin.qq.com/wxa/get_category?access_token=NEW&lang=zh_CN"
        );
    }

    #[test]
    fn test_rewrite_without_parameter_is_identity() {
        let url = "https://api.weixin.qq.com/cgi-bin/component/api_component_token";
        assert_eq!(rewrite_access_token(url, "NEW").unwrap(), url);

        let other = "https://example.test/path?component_access_token=C1";
        assert_eq!(rewrite_access_token(other, "NEW").unwrap(), other);
    }

    #[test]
    fn test_rewrite_rejects_relative_urls() {
        assert!(matches!(
            rewrite_access_token("/relative?access_token=x", "NEW"),
            Err(ChannelError::Configuration(_))
        ));
    }
}
