//! Remote API families.
//!
//! Each family is a set of free functions over a
//! [`PlatformClient`](crate::PlatformClient). They ensure the authorizer
//! credential, build the authenticated URL and go through the client's
//! retrying request path, so a token rejected mid-flight is refreshed
//! transparently.

pub mod privacy;
