//! Request metrics collected through the request hook.
//!
//! Enabled with the `metrics` feature. [`RequestMetrics`] is a
//! [`RequestHook`] that counts attempts, outcomes by error kind and
//! latency using atomic counters.

use crate::ChannelError;
use crate::channel::error::ErrorKind;
use crate::channel::request::{RequestHook, RequestOptions};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Point-in-time view of the collected request metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMetricsSnapshot {
    /// Total number of attempts, retries included
    pub attempts: u64,
    /// Attempts that returned a usable response
    pub successes: u64,
    /// Attempts that failed for any reason
    pub failures: u64,
    /// Error counts by category
    pub errors: ErrorCounts,
    /// Average attempt latency in microseconds
    pub avg_latency_us: u64,
}

/// Failed attempts by category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorCounts {
    /// The platform rejected the access token
    pub credential_invalid: u64,
    /// Connection failures, timeouts and non-success statuses
    pub transport: u64,
    /// Structured platform errors other than credential rejections
    pub upstream_api: u64,
    /// Unparseable response bodies
    pub malformed_response: u64,
    pub other: u64,
}

#[derive(Debug, Default)]
struct Counters {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    credential_invalid: AtomicU64,
    transport: AtomicU64,
    upstream_api: AtomicU64,
    malformed_response: AtomicU64,
    other: AtomicU64,
    latency_total_us: AtomicU64,
}

/// In-memory request metrics collector.
///
/// Clones share the same counters, so one clone can be handed to the
/// client builder while another is kept for reporting.
///
/// # Example
///
/// ```rust
/// use open_platform_channel::metrics::RequestMetrics;
/// use open_platform_channel::{RequestHook, RequestOptions};
/// use std::time::Duration;
///
/// let metrics = RequestMetrics::new();
/// metrics.on_request("wx_tenant", Duration::from_millis(12), "https://example.test", &RequestOptions::get(), None);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.attempts, 1);
/// assert_eq!(snapshot.successes, 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestMetrics {
    counters: Arc<Counters>,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current counters.
    pub fn snapshot(&self) -> RequestMetricsSnapshot {
        let c = &self.counters;
        let attempts = c.attempts.load(Ordering::Relaxed);
        RequestMetricsSnapshot {
            attempts,
            successes: c.successes.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            errors: ErrorCounts {
                credential_invalid: c.credential_invalid.load(Ordering::Relaxed),
                transport: c.transport.load(Ordering::Relaxed),
                upstream_api: c.upstream_api.load(Ordering::Relaxed),
                malformed_response: c.malformed_response.load(Ordering::Relaxed),
                other: c.other.load(Ordering::Relaxed),
            },
            avg_latency_us: if attempts > 0 {
                c.latency_total_us.load(Ordering::Relaxed) / attempts
            } else {
                0
            },
        }
    }

    /// Resets every counter to zero.
    pub fn reset(&self) {
        let c = &self.counters;
        for counter in [
            &c.attempts,
            &c.successes,
            &c.failures,
            &c.credential_invalid,
            &c.transport,
            &c.upstream_api,
            &c.malformed_response,
            &c.other,
            &c.latency_total_us,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl RequestHook for RequestMetrics {
    fn on_request(
        &self,
        _tenant_id: &str,
        elapsed: Duration,
        _url: &str,
        _options: &RequestOptions,
        error: Option<&ChannelError>,
    ) {
        let c = &self.counters;
        c.attempts.fetch_add(1, Ordering::Relaxed);
        c.latency_total_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);

        let Some(error) = error else {
            c.successes.fetch_add(1, Ordering::Relaxed);
            return;
        };
        c.failures.fetch_add(1, Ordering::Relaxed);
        let bucket = match error.kind() {
            ErrorKind::CredentialInvalid => &c.credential_invalid,
            ErrorKind::Transport => &c.transport,
            ErrorKind::UpstreamApi => &c.upstream_api,
            ErrorKind::MalformedResponse => &c.malformed_response,
            _ => &c.other,
        };
        bucket.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(metrics: &RequestMetrics, micros: u64, error: Option<ChannelError>) {
        metrics.on_request(
            "wx_tenant",
            Duration::from_micros(micros),
            "https://example.test",
            &RequestOptions::get(),
            error.as_ref(),
        );
    }

    #[test]
    fn test_counts_by_outcome() {
        let metrics = RequestMetrics::new();
        record(&metrics, 100, None);
        record(&metrics, 200, Some(ChannelError::from_upstream(40001, "invalid credential")));
        record(&metrics, 300, Some(ChannelError::from_upstream(45009, "quota")));
        record(&metrics, 400, Some(ChannelError::Storage("down".to_string())));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.attempts, 4);
        assert_eq!(snapshot.successes, 1);
        assert_eq!(snapshot.failures, 3);
        assert_eq!(snapshot.errors.credential_invalid, 1);
        assert_eq!(snapshot.errors.upstream_api, 1);
        assert_eq!(snapshot.errors.other, 1);
        assert_eq!(snapshot.avg_latency_us, 250);
    }

    #[test]
    fn test_clones_share_counters_and_reset() {
        let metrics = RequestMetrics::new();
        let handed_out = metrics.clone();
        record(&handed_out, 10, None);
        assert_eq!(metrics.snapshot().attempts, 1);

        metrics.reset();
        assert_eq!(handed_out.snapshot(), RequestMetricsSnapshot::default());
    }
}
