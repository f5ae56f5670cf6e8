use thiserror::Error;

/// Upstream error codes that mean the access token attached to a call is
/// no longer accepted (invalid, revoked, or expired early).
pub const CREDENTIAL_INVALID_CODES: &[i64] = &[40001, 40014, 42001];

/// Error types that can occur on the secure channel.
///
/// Every variant maps to one [`ErrorKind`], which lets callers separate
/// security-relevant rejections (signature or identifier mismatches) from
/// malformed input, transport failures and upstream API errors.
///
/// # Error Categories
///
/// - **Envelope Errors**: `SignatureMismatch`, `IdentifierMismatch`, `CryptoFailure`
/// - **Token Errors**: `LockAcquisitionFailure`, `CredentialInvalid`, `Storage`
/// - **Request Errors**: `Transport`, `MalformedResponse`, `UpstreamApi`
/// - **Setup Errors**: `Configuration`
///
/// # Example
///
/// ```rust
/// use open_platform_channel::{ChannelError, MessageCrypto};
///
/// # fn example() -> Result<(), ChannelError> {
/// let crypto = MessageCrypto::new(
///     "wx_test",
///     "token",
///     "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG",
/// )?;
///
/// match crypto.decrypt_message("bad-signature", "1409304348", "xxxxxx", "AAAA") {
///     Ok(payload) => println!("payload: {payload}"),
///     Err(ChannelError::SignatureMismatch) => println!("rejected: forged or misrouted push"),
///     Err(e) => println!("other error: {e}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The message signature does not match the recomputed one.
    ///
    /// Raised before any decryption is attempted. Indicates a forged
    /// message, a wrong signing token, or parameters that were altered in
    /// transit. Never retried.
    #[error("Message signature mismatch")]
    SignatureMismatch,

    /// The platform identifier embedded in a decrypted message differs from
    /// the configured one.
    ///
    /// The ciphertext was produced for another integration (or with another
    /// key that happened to decrypt into a plausible layout).
    #[error("Platform identifier mismatch: expected {expected}, got {actual}")]
    IdentifierMismatch {
        /// The configured platform identifier
        expected: String,
        /// The identifier found in the message
        actual: String,
    },

    /// A cryptographic or framing operation failed.
    ///
    /// # When This Occurs
    ///
    /// - The key string does not decode to exactly 32 bytes
    /// - The ciphertext is not valid base64 or not block aligned
    /// - The decrypted layout is truncated or the payload is not UTF-8
    #[error("Crypto failure: {0}")]
    CryptoFailure(String),

    /// The distributed lock could not be acquired.
    ///
    /// Fatal for the call that needed it; this layer does not retry.
    #[error("Lock acquisition failed: {0}")]
    LockAcquisitionFailure(String),

    /// The HTTP exchange failed or returned a non-success status.
    #[error("Transport error for {url}: {message}")]
    Transport {
        /// The URL of the failed attempt
        url: String,
        /// HTTP status code, when a response was received
        status: Option<u16>,
        /// Human-readable failure description
        message: String,
    },

    /// The response body could not be decoded.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The platform answered with a structured error code.
    #[error("Upstream API error {code}: {message}")]
    UpstreamApi {
        /// The platform's numeric `errcode`
        code: i64,
        /// The platform's `errmsg`
        message: String,
    },

    /// The platform rejected the attached access token.
    ///
    /// A specialised upstream API error; the request retrier refreshes the
    /// authorizer credential and retries when it sees this variant.
    #[error("Credential rejected by upstream ({code}): {message}")]
    CredentialInvalid {
        /// The platform's numeric `errcode`
        code: i64,
        /// The platform's `errmsg`
        message: String,
    },

    /// A credential store operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The client or a call was configured inconsistently.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Coarse classification of [`ChannelError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SignatureMismatch,
    IdentifierMismatch,
    CryptoFailure,
    LockAcquisitionFailure,
    Transport,
    MalformedResponse,
    UpstreamApi,
    CredentialInvalid,
    Storage,
    Configuration,
}

impl ErrorKind {
    /// Stable snake_case name, suitable for log fields and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SignatureMismatch => "signature_mismatch",
            ErrorKind::IdentifierMismatch => "identifier_mismatch",
            ErrorKind::CryptoFailure => "crypto_failure",
            ErrorKind::LockAcquisitionFailure => "lock_acquisition_failure",
            ErrorKind::Transport => "transport",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::UpstreamApi => "upstream_api",
            ErrorKind::CredentialInvalid => "credential_invalid",
            ErrorKind::Storage => "storage",
            ErrorKind::Configuration => "configuration",
        }
    }
}

impl ChannelError {
    /// Builds the error for a structured upstream error body, choosing
    /// `CredentialInvalid` for token-rejection codes.
    pub fn from_upstream(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        if CREDENTIAL_INVALID_CODES.contains(&code) {
            ChannelError::CredentialInvalid { code, message }
        } else {
            ChannelError::UpstreamApi { code, message }
        }
    }

    pub(crate) fn transport(url: &str, status: Option<u16>, message: impl Into<String>) -> Self {
        ChannelError::Transport {
            url: url.to_string(),
            status,
            message: message.into(),
        }
    }

    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChannelError::SignatureMismatch => ErrorKind::SignatureMismatch,
            ChannelError::IdentifierMismatch { .. } => ErrorKind::IdentifierMismatch,
            ChannelError::CryptoFailure(_) => ErrorKind::CryptoFailure,
            ChannelError::LockAcquisitionFailure(_) => ErrorKind::LockAcquisitionFailure,
            ChannelError::Transport { .. } => ErrorKind::Transport,
            ChannelError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            ChannelError::UpstreamApi { .. } => ErrorKind::UpstreamApi,
            ChannelError::CredentialInvalid { .. } => ErrorKind::CredentialInvalid,
            ChannelError::Storage(_) => ErrorKind::Storage,
            ChannelError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// The upstream numeric code for API errors, `None` otherwise.
    pub fn code(&self) -> Option<i64> {
        match self {
            ChannelError::UpstreamApi { code, .. } | ChannelError::CredentialInvalid { code, .. } => {
                Some(*code)
            }
            _ => None,
        }
    }

    /// Whether this error signals a rejected access token.
    pub fn is_credential_invalid(&self) -> bool {
        matches!(self, ChannelError::CredentialInvalid { .. })
    }

    /// Whether the request layer may retry after this error.
    ///
    /// Only credential rejections qualify; envelope errors indicate tampering
    /// or misconfiguration and everything else surfaces as-is.
    pub fn is_retryable(&self) -> bool {
        self.is_credential_invalid()
    }
}
