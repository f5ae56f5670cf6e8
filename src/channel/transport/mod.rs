//! HTTP transport abstraction.
//!
//! The request layer only needs one operation from the network: send a
//! request, get status, content type and body back. Keeping it behind a
//! trait lets tests script upstream answers and lets deployments bring
//! their own HTTP stack.

use crate::ChannelError;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

#[cfg(feature = "reqwest-transport")]
mod reqwest_transport;
#[cfg(feature = "reqwest-transport")]
pub use reqwest_transport::ReqwestTransport;

/// HTTP method of a platform call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

/// A fully prepared outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

/// The parts of a response the request layer inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Value of the `content-type` header, empty when absent
    pub content_type: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// A `200 OK` JSON response, handy for scripted transports.
    pub fn json(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: "application/json; charset=utf-8".to_string(),
            body: body.into(),
        }
    }
}

/// Sends HTTP requests.
///
/// Implementations report connection failures and timeouts as
/// [`ChannelError::Transport`]; status-code handling is left to the caller,
/// so any received response is returned as `Ok`.
///
/// # Example Implementation
///
/// ```rust
/// use open_platform_channel::transport::{HttpRequest, HttpResponse, Transport};
/// use open_platform_channel::ChannelError;
/// use async_trait::async_trait;
///
/// struct FixedTransport;
///
/// #[async_trait]
/// impl Transport for FixedTransport {
///     async fn send(&self, _request: &HttpRequest) -> Result<HttpResponse, ChannelError> {
///         Ok(HttpResponse::json(r#"{"errcode":0,"errmsg":"ok"}"#))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ChannelError>;
}
