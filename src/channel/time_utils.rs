//! Time utilities for safe timestamp handling.
//!
//! Credential expiry and envelope timestamps are expressed in milliseconds
//! since the Unix epoch, matching what the platform hands out.

use crate::channel::error::ChannelError;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get current timestamp in milliseconds since Unix epoch.
///
/// Returns an error instead of panicking if the system clock is set
/// before the epoch.
pub(crate) fn current_millis() -> Result<i64, ChannelError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .map_err(|_| ChannelError::Configuration("System time is before Unix epoch".to_string()))
}

/// Computes the expiry instant for a credential the platform declared valid
/// for `expires_in_secs`, pulled forward by `margin`.
///
/// The lifetime comes from upstream, so a value that overflows the
/// millisecond clock is reported as a malformed response.
pub(crate) fn expiry_from_lifetime(
    now_ms: i64,
    expires_in_secs: i64,
    margin: Duration,
) -> Result<i64, ChannelError> {
    i64::try_from(margin.as_secs())
        .ok()
        .and_then(|margin| expires_in_secs.checked_sub(margin))
        .and_then(|secs| secs.checked_mul(1000))
        .and_then(|ms| now_ms.checked_add(ms))
        .ok_or_else(|| {
            ChannelError::MalformedResponse(format!("expires_in out of range: {expires_in_secs}"))
        })
}
