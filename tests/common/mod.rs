//! Shared test utilities: a scripted in-process transport.

#![allow(dead_code)]

use async_trait::async_trait;
use open_platform_channel::ChannelError;
use open_platform_channel::transport::{HttpRequest, HttpResponse, Transport};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Answers requests from per-path scripts and records every request.
///
/// A route is matched when the request URL contains its key; the first
/// scripted response is popped, and the last one is repeated once the
/// script runs dry.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<(String, VecDeque<HttpResponse>)>>,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps before answering, widening race windows in concurrency tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Appends JSON bodies to the script for URLs containing `path`.
    pub fn route<S: AsRef<str>>(mut self, path: &str, bodies: &[S]) -> Self {
        for body in bodies {
            self = self.route_response(path, HttpResponse::json(body.as_ref()));
        }
        self
    }

    /// Appends a raw response to the script for URLs containing `path`.
    pub fn route_response(self, path: &str, response: HttpResponse) -> Self {
        {
            let mut routes = self.routes.lock().unwrap();
            match routes.iter_mut().find(|(p, _)| p.as_str() == path) {
                Some((_, queue)) => queue.push_back(response),
                None => routes.push((path.to_string(), VecDeque::from([response]))),
            }
        }
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests whose URL contains `path`.
    pub fn calls_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.contains(path))
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ChannelError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut routes = self.routes.lock().unwrap();
        let Some((_, queue)) = routes
            .iter_mut()
            .find(|(path, _)| request.url.contains(path.as_str()))
        else {
            return Ok(HttpResponse {
                status: 404,
                content_type: String::new(),
                body: Vec::new(),
            });
        };

        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(response.unwrap_or_else(|| HttpResponse {
            status: 500,
            content_type: String::new(),
            body: Vec::new(),
        }))
    }
}

pub const COMPONENT_TOKEN_PATH: &str = "component/api_component_token";
pub const AUTHORIZER_TOKEN_PATH: &str = "component/api_authorizer_token";

pub fn component_token(token: &str) -> String {
    format!(r#"{{"component_access_token":"{token}","expires_in":7200}}"#)
}

pub fn authorizer_token(token: &str) -> String {
    format!(r#"{{"authorizer_access_token":"{token}","expires_in":7200,"authorizer_refresh_token":"refresh@@@1"}}"#)
}

/// Value of the `access_token` query parameter of a request URL.
pub fn access_token_of(request: &HttpRequest) -> Option<String> {
    url::Url::parse(&request.url)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == "access_token")
        .map(|(_, v)| v.into_owned())
}
