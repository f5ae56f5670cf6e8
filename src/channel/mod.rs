// Envelope codecs
pub mod message_crypto;
pub mod padding;
pub mod signature;

// Credentials, storage and locking
mod credential;
pub mod lock;
pub mod storage;
mod token_manager;

// Requests
mod client;
mod client_builder;
mod request;
mod retrier;
pub mod transport;

// Core architecture components
mod config;
mod error;
mod time_utils;

// Metrics (optional feature)
#[cfg(feature = "metrics")]
pub mod metrics;

// Core components exports
pub use config::{ChannelConfig, ConfigPreset, DEFAULT_API_BASE, DEFAULT_WXA_BASE};
pub use error::{CREDENTIAL_INVALID_CODES, ChannelError, ErrorKind};

// Envelope exports
pub use message_crypto::{EncryptedReply, InboundEnvelope, KeyMaterial, MessageCrypto};

// Credential exports
pub use credential::{Credential, CredentialKind};
pub use lock::{DistributedLock, LocalLock, LockHandle, NoopLock};
pub use storage::{CredentialStore, MemoryCredentialStore};
pub use token_manager::{ComponentIdentity, TokenManager};

// Request exports
pub use client::PlatformClient;
pub use client_builder::PlatformClientBuilder;
pub use request::{ApiResponse, NoopHook, RequestExecutor, RequestHook, RequestOptions};
pub use retrier::{RequestRetrier, rewrite_access_token};
pub use transport::{HttpRequest, HttpResponse, Method, Transport};

// Metrics exports (optional feature)
#[cfg(feature = "metrics")]
pub use metrics::{ErrorCounts, RequestMetrics, RequestMetricsSnapshot};
