//! Single-attempt platform calls.
//!
//! [`RequestExecutor`] turns [`RequestOptions`] into one HTTP exchange,
//! classifies the outcome and reports it to the [`RequestHook`]. Retrying
//! on a rejected credential lives one layer up, in the retrier.

use crate::ChannelError;
use crate::channel::transport::{HttpRequest, Method, Transport};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Per-call options.
///
/// Header names are stored lowercase. `data` is serialized as the JSON
/// request body; `timeout` falls back to the configured API timeout.
///
/// # Example
///
/// ```rust
/// use open_platform_channel::RequestOptions;
/// use serde_json::json;
/// use std::time::Duration;
///
/// let options = RequestOptions::post_json(json!({ "privacy_ver": 2 }))
///     .with_timeout(Duration::from_secs(5))
///     .with_header("X-Trace-Id", "abc");
/// assert_eq!(options.headers.get("x-trace-id").map(String::as_str), Some("abc"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub data: Option<Value>,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// A bodiless GET.
    pub fn get() -> Self {
        Self::default()
    }

    /// A POST carrying `data` as JSON.
    pub fn post_json(data: Value) -> Self {
        Self {
            method: Method::Post,
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Overlays `self` on `defaults`: headers merge key by key, every other
    /// field set on `self` wins.
    fn merged_over(&self, defaults: &RequestOptions) -> RequestOptions {
        let mut headers = defaults.headers.clone();
        headers.extend(self.headers.clone());
        RequestOptions {
            method: self.method,
            headers,
            data: self.data.clone().or_else(|| defaults.data.clone()),
            timeout: self.timeout.or(defaults.timeout),
        }
    }
}

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// JSON body whose `errcode` was zero or absent
    Json(Value),
    /// Any non-JSON body, e.g. media downloads
    Raw(Vec<u8>),
}

impl ApiResponse {
    /// Returns the JSON body, failing for raw responses.
    pub fn into_json(self) -> Result<Value, ChannelError> {
        match self {
            ApiResponse::Json(value) => Ok(value),
            ApiResponse::Raw(bytes) => Err(ChannelError::MalformedResponse(format!(
                "expected a JSON body, got {} raw bytes",
                bytes.len()
            ))),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ApiResponse::Json(value) => Some(value),
            ApiResponse::Raw(_) => None,
        }
    }
}

/// Observes every request attempt.
///
/// Called once per attempt, after the outcome is known, with the tenant the
/// call was made for, the elapsed time, the attempted URL, the effective
/// options and the error if the attempt failed. Implemented for closures.
///
/// # Example
///
/// ```rust
/// use open_platform_channel::{ChannelError, RequestHook, RequestOptions};
/// use std::time::Duration;
///
/// let hook = |tenant: &str, elapsed: Duration, url: &str, _: &RequestOptions, error: Option<&ChannelError>| {
///     println!("{tenant} {url} took {elapsed:?} (failed: {})", error.is_some());
/// };
/// fn takes_hook(_: impl RequestHook) {}
/// takes_hook(hook);
/// ```
pub trait RequestHook: Send + Sync {
    fn on_request(
        &self,
        tenant_id: &str,
        elapsed: Duration,
        url: &str,
        options: &RequestOptions,
        error: Option<&ChannelError>,
    );
}

impl<F> RequestHook for F
where
    F: Fn(&str, Duration, &str, &RequestOptions, Option<&ChannelError>) + Send + Sync,
{
    fn on_request(
        &self,
        tenant_id: &str,
        elapsed: Duration,
        url: &str,
        options: &RequestOptions,
        error: Option<&ChannelError>,
    ) {
        self(tenant_id, elapsed, url, options, error)
    }
}

/// A hook that ignores every attempt.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl RequestHook for NoopHook {
    fn on_request(
        &self,
        _: &str,
        _: Duration,
        _: &str,
        _: &RequestOptions,
        _: Option<&ChannelError>,
    ) {
    }
}

/// Performs one attempt of a platform call.
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    hook: Arc<dyn RequestHook>,
    defaults: RequestOptions,
    default_timeout: Duration,
}

impl fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("defaults", &self.defaults)
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl RequestExecutor {
    pub fn new(
        transport: Arc<dyn Transport>,
        hook: Arc<dyn RequestHook>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            hook,
            defaults: RequestOptions::default(),
            default_timeout,
        }
    }

    /// Options merged under every call, e.g. a shared header.
    pub fn with_defaults(mut self, defaults: RequestOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Sends one request and classifies the response.
    ///
    /// # Errors
    ///
    /// * `Transport` - The exchange failed or the status is outside `200..=204`
    /// * `MalformedResponse` - A JSON content type carried an unparseable body
    /// * `CredentialInvalid` / `UpstreamApi` - The body carried a non-zero `errcode`
    pub async fn execute(
        &self,
        tenant_id: &str,
        url: &str,
        options: &RequestOptions,
    ) -> Result<ApiResponse, ChannelError> {
        let started = Instant::now();
        let mut effective = options.merged_over(&self.defaults);
        effective
            .headers
            .entry("content-type".to_string())
            .or_insert_with(|| "application/json".to_string());
        let timeout = *effective.timeout.get_or_insert(self.default_timeout);

        let result = self.attempt(url, &effective, timeout).await;

        self.hook.on_request(
            tenant_id,
            started.elapsed(),
            url,
            &effective,
            result.as_ref().err(),
        );
        match &result {
            Ok(_) => debug!(tenant = %tenant_id, url = %url, "Platform request succeeded"),
            Err(e) => warn!(
                tenant = %tenant_id,
                url = %url,
                kind = e.kind().as_str(),
                error = %e,
                "Platform request failed"
            ),
        }
        result
    }

    async fn attempt(
        &self,
        url: &str,
        options: &RequestOptions,
        timeout: Duration,
    ) -> Result<ApiResponse, ChannelError> {
        let body = options
            .data
            .as_ref()
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| ChannelError::Configuration(format!("Unserializable request body: {e}")))?;

        let request = HttpRequest {
            method: options.method,
            url: url.to_string(),
            headers: options
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            body,
            timeout,
        };
        let response = self.transport.send(&request).await?;

        if !(200..=204).contains(&response.status) {
            return Err(ChannelError::transport(
                url,
                Some(response.status),
                format!("status code: {}", response.status),
            ));
        }

        if !response.content_type.contains("application/json") {
            return Ok(ApiResponse::Raw(response.body));
        }

        let data: Value = serde_json::from_slice(&response.body).map_err(|e| {
            ChannelError::MalformedResponse(format!(
                "JSON parse error ({e}); body is {}",
                String::from_utf8_lossy(&response.body)
            ))
        })?;
        check_errcode(&data)?;
        Ok(ApiResponse::Json(data))
    }
}

fn check_errcode(data: &Value) -> Result<(), ChannelError> {
    let code = data.get("errcode").and_then(Value::as_i64).unwrap_or(0);
    if code == 0 {
        return Ok(());
    }
    let message = data
        .get("errmsg")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Err(ChannelError::from_upstream(code, message))
}
