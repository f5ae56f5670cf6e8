use super::{HttpRequest, HttpResponse, Method, Transport};
use crate::ChannelError;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::trace;

/// [`Transport`] backed by a shared `reqwest` client.
///
/// The per-request timeout from [`HttpRequest`] is applied on every call;
/// the client itself carries no default timeout.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuses an existing client, e.g. one configured with a proxy.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ChannelError> {
        trace!(
            method = %request.method,
            url = %request.url,
            timeout_secs = %request.timeout.as_secs(),
            "sending platform request"
        );

        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        }
        .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ChannelError::transport(&request.url, None, e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| ChannelError::transport(&request.url, Some(status), e.to_string()))?
            .to_vec();

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
