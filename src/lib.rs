//! # Open Platform Channel
//!
//! A Rust library for the secure channel between a third-party platform
//! integration and the WeChat open platform.
//!
//! It covers both directions of the channel: signed, AES-encrypted message
//! envelopes pushed by the platform (and the encrypted replies sent back),
//! and the short-lived bearer credentials needed to call platform APIs on
//! behalf of authorized accounts.
//!
//! ## Features
//!
//! - **Envelope Crypto**: AES-256-CBC with 32-byte block padding, SHA-1 envelope signatures
//! - **Token Lifecycle**: Component and per-tenant authorizer credentials, refreshed lazily
//! - **Single Refresh**: Double-checked locking around every refresh through a pluggable lock
//! - **Credential Retry**: Calls rejected for a stale token are refreshed and retried
//! - **Pluggable Storage**: Share credentials across processes with your own store
//! - **Request Hook**: Observe every attempt (latency, URL, outcome)
//! - **Async Support**: Fully asynchronous API on tokio
//!
//! ## Quick Start
//!
//! ### Decrypting a push and replying
//!
//! ```rust
//! use open_platform_channel::MessageCrypto;
//!
//! # fn example() -> Result<(), open_platform_channel::ChannelError> {
//! let crypto = MessageCrypto::new(
//!     "wx_test",
//!     "token",
//!     "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG",
//! )?;
//!
//! // What the platform would push
//! let push = crypto.encrypt_message("<xml><Content>hello</Content></xml>", Some(12345), Some(1_409_304_348))?;
//!
//! let payload = crypto.decrypt_message(
//!     &push.msg_signature,
//!     &push.timestamp.to_string(),
//!     &push.nonce.to_string(),
//!     &push.encrypt,
//! )?;
//! assert_eq!(payload, "<xml><Content>hello</Content></xml>");
//!
//! let reply = crypto.build_reply("<xml><Content>world</Content></xml>", None, None)?;
//! assert!(reply.starts_with("<xml>"));
//! # Ok(())
//! # }
//! ```
//!
//! ### Calling platform APIs
//!
//! ```rust,no_run
//! use open_platform_channel::{LocalLock, PlatformClient};
//! use open_platform_channel::api::privacy;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), open_platform_channel::ChannelError> {
//! let client = PlatformClient::builder("wx_component", "component_secret", "wx_tenant")
//!     .with_verify_ticket("ticket@@@xyz")
//!     .with_refresh_token("refreshtoken@@@abc")
//!     .with_lock(Arc::new(LocalLock::new()))
//!     .build()?;
//!
//! let setting = privacy::get_privacy_setting(&client, 2).await?;
//! println!("{setting}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Multiple Processes
//!
//! The default [`MemoryCredentialStore`] and [`NoopLock`] only work within a
//! single process. When several processes or machines share one
//! integration, supply a shared [`CredentialStore`] and a shared
//! [`DistributedLock`] (the `redis-lock` feature ships `RedisLock`);
//! otherwise concurrent refreshes can invalidate each other's tokens.
//!
//! ## Architecture
//!
//! - **[`MessageCrypto`]**: Envelope encryption, decryption and signatures
//! - **[`TokenManager`]**: Component and authorizer credential state machines
//! - **[`PlatformClient`]**: Per-tenant API access with credential retry
//! - **[`api`]**: Remote API families as free functions over the client
//! - **[`ChannelError`]**: Comprehensive error handling for all failure modes

pub mod api;
pub mod channel;

// Re-export commonly used modules and types
#[cfg(feature = "metrics")]
pub use channel::metrics;
pub use channel::{lock, padding, signature, storage, transport};
pub use channel::{
    ApiResponse, ChannelConfig, ChannelError, ConfigPreset, Credential, CredentialKind,
    CredentialStore, DistributedLock, EncryptedReply, ErrorKind, InboundEnvelope, LocalLock,
    LockHandle, MemoryCredentialStore, MessageCrypto, NoopHook, NoopLock, PlatformClient,
    PlatformClientBuilder, RequestHook, RequestOptions, TokenManager,
};
