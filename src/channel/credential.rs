use crate::ChannelError;
use crate::channel::time_utils::{current_millis, expiry_from_lifetime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The two kinds of bearer credentials the token manager maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    /// Platform-level token identifying the integration itself.
    Component,
    /// Tenant-level token for one authorized account.
    Authorizer,
}

impl CredentialKind {
    /// The platform's field name for this credential, also used as the base
    /// of its lock scope and in log fields.
    pub const fn as_str(self) -> &'static str {
        match self {
            CredentialKind::Component => "component_access_token",
            CredentialKind::Authorizer => "authorizer_access_token",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A short-lived bearer credential with its expiry.
///
/// The serialized form is `{"accessToken": ..., "expireTime": ...}`, which
/// keeps values written by other deployments of the integration readable.
///
/// # Example
///
/// ```rust
/// use open_platform_channel::Credential;
///
/// let credential = Credential::new("ACCESS_TOKEN", i64::MAX);
/// assert!(credential.is_valid());
///
/// let expired = Credential::new("ACCESS_TOKEN", 0);
/// assert!(!expired.is_valid());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// The opaque token value.
    #[serde(rename = "accessToken")]
    pub secret: String,

    /// Epoch milliseconds after which the credential is treated as expired.
    #[serde(rename = "expireTime")]
    pub expires_at_ms: i64,
}

impl Credential {
    /// Creates a credential from its raw parts.
    pub fn new(secret: impl Into<String>, expires_at_ms: i64) -> Self {
        Self {
            secret: secret.into(),
            expires_at_ms,
        }
    }

    /// Creates a credential the platform declared valid for `expires_in_secs`,
    /// expiring `margin` early.
    pub fn from_lifetime(
        secret: impl Into<String>,
        expires_in_secs: i64,
        margin: Duration,
    ) -> Result<Self, ChannelError> {
        let now = current_millis()?;
        let expires_at_ms = expiry_from_lifetime(now, expires_in_secs, margin)?;
        Ok(Self::new(secret, expires_at_ms))
    }

    /// Whether the credential is usable at `now_ms`.
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        !self.secret.is_empty() && now_ms < self.expires_at_ms
    }

    /// Whether the credential is usable now.
    ///
    /// A clock before the Unix epoch counts as invalid.
    pub fn is_valid(&self) -> bool {
        current_millis()
            .map(|now| self.is_valid_at(now))
            .unwrap_or(false)
    }
}
