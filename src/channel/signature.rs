//! Message signature scheme used by the platform.
//!
//! The signature is the lowercase hex SHA-1 of the token, timestamp, nonce
//! and ciphertext after sorting them lexicographically and concatenating
//! them without separators. Because the inputs are sorted, the signature
//! does not bind a value to its role: swapping two fields produces the same
//! digest. That property comes from the upstream protocol and is kept as-is
//! for interoperability.
//!
//! Sorting compares UTF-8 bytes, while the platform compares UTF-16 code
//! units. The two orders agree for the ASCII values the platform sends but
//! can differ between a supplementary-plane character and one in
//! U+E000..=U+FFFF.

use crate::ChannelError;
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

/// Computes the platform signature over the four message parameters.
///
/// # Example
///
/// ```rust
/// use open_platform_channel::signature;
///
/// let a = signature::sign("token", "1409304348", "xxxxxx", "ciphertext");
/// let b = signature::sign("ciphertext", "xxxxxx", "1409304348", "token");
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 40);
/// ```
pub fn sign(token: &str, timestamp: &str, nonce: &str, payload: &str) -> String {
    let mut parts = [token, timestamp, nonce, payload];
    parts.sort_unstable();

    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Recomputes the signature and compares it with `expected` in constant time.
///
/// # Returns
///
/// `Ok(())` when the signatures match, `Err(ChannelError::SignatureMismatch)` otherwise.
pub fn verify(
    expected: &str,
    token: &str,
    timestamp: &str,
    nonce: &str,
    payload: &str,
) -> Result<(), ChannelError> {
    let computed = sign(token, timestamp, nonce, payload);
    if computed.as_bytes().ct_eq(expected.as_bytes()).into() {
        Ok(())
    } else {
        Err(ChannelError::SignatureMismatch)
    }
}
