use std::time::Duration;

/// Base URL of the platform's `cgi-bin` API family.
pub const DEFAULT_API_BASE: &str = "https://api.weixin.qq.com/cgi-bin/";

/// Base URL of the platform's mini-program (`wxa`) API family.
pub const DEFAULT_WXA_BASE: &str = "https://api.weixin.qq.com/wxa/";

/// Predefined configuration presets for common deployment scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPreset {
    /// Production configuration.
    ///
    /// - API timeout: 100 seconds
    /// - Token timeout: 10 seconds
    /// - Credential-invalid retries: 3
    /// - Expiry margin: 10 seconds
    /// - Production mode on (in-memory token storage logs warnings)
    Production,

    /// Development configuration.
    ///
    /// Same timings as production with production mode off.
    Development,

    /// Load configuration from environment variables.
    ///
    /// Reads:
    /// - `OPEN_PLATFORM_API_TIMEOUT`: API call timeout in seconds (default: 100)
    /// - `OPEN_PLATFORM_TOKEN_TIMEOUT`: Token call timeout in seconds (default: 10)
    /// - `OPEN_PLATFORM_MAX_RETRIES`: Credential-invalid retry budget (default: 3)
    /// - `OPEN_PLATFORM_EXPIRY_MARGIN`: Early-expiry margin in seconds (default: 10)
    /// - `OPEN_PLATFORM_ENV`: `production` enables production mode
    FromEnv,
}

/// Configuration for the secure channel client.
///
/// # Example
///
/// ```rust
/// use open_platform_channel::{ChannelConfig, ConfigPreset};
/// use std::time::Duration;
///
/// let config = ChannelConfig {
///     max_retries: 1,
///     ..ChannelConfig::from(ConfigPreset::Production)
/// };
/// assert_eq!(config.api_timeout, Duration::from_secs(100));
/// ```
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Timeout attached to ordinary API calls
    pub api_timeout: Duration,
    /// Timeout attached to token endpoint calls
    pub token_timeout: Duration,
    /// How many times a call is retried after the platform rejects its access token
    pub max_retries: u32,
    /// How much earlier than declared a credential is treated as expired
    pub expiry_margin: Duration,
    /// Whether the process runs in production mode
    pub production: bool,
    /// Base URL for `cgi-bin` endpoints, including the trailing slash
    pub api_base: String,
    /// Base URL for `wxa` endpoints, including the trailing slash
    pub wxa_base: String,
}

fn env_secs(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            api_timeout: Duration::from_secs(env_secs("OPEN_PLATFORM_API_TIMEOUT", 100)),
            token_timeout: Duration::from_secs(env_secs("OPEN_PLATFORM_TOKEN_TIMEOUT", 10)),
            max_retries: std::env::var("OPEN_PLATFORM_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            expiry_margin: Duration::from_secs(env_secs("OPEN_PLATFORM_EXPIRY_MARGIN", 10)),
            production: std::env::var("OPEN_PLATFORM_ENV")
                .map(|v| v.eq_ignore_ascii_case("production"))
                .unwrap_or(false),
            api_base: DEFAULT_API_BASE.to_string(),
            wxa_base: DEFAULT_WXA_BASE.to_string(),
        }
    }
}

impl ChannelConfig {
    /// Points both API families at another host, e.g. a mock server.
    ///
    /// `origin` is scheme and authority without a trailing slash.
    pub fn with_origin(mut self, origin: &str) -> Self {
        let origin = origin.trim_end_matches('/');
        self.api_base = format!("{origin}/cgi-bin/");
        self.wxa_base = format!("{origin}/wxa/");
        self
    }

    /// Validates the configuration and returns any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.token_timeout > self.api_timeout {
            warnings.push("Token timeout is longer than the API timeout".to_string());
        }
        if self.expiry_margin.is_zero() {
            warnings.push(
                "Zero expiry margin lets tokens be used right at their expiry boundary"
                    .to_string(),
            );
        }
        if self.expiry_margin.as_secs() >= 3600 {
            warnings.push(
                "Expiry margin of an hour or more exceeds typical token lifetimes".to_string(),
            );
        }
        if self.max_retries > 5 {
            warnings.push(
                "More than 5 credential retries may hammer the token endpoint".to_string(),
            );
        }
        if !self.api_base.ends_with('/') || !self.wxa_base.ends_with('/') {
            warnings.push("API base URLs should end with '/'".to_string());
        }

        warnings
    }

    /// Returns a summary of the current configuration.
    pub fn summary(&self) -> String {
        format!(
            "ChannelConfig {{ API timeout: {}s, Token timeout: {}s, Retries: {}, Expiry margin: {}s, Production: {} }}",
            self.api_timeout.as_secs(),
            self.token_timeout.as_secs(),
            self.max_retries,
            self.expiry_margin.as_secs(),
            self.production,
        )
    }
}

impl From<ConfigPreset> for ChannelConfig {
    fn from(preset: ConfigPreset) -> Self {
        let base = Self {
            api_timeout: Duration::from_secs(100),
            token_timeout: Duration::from_secs(10),
            max_retries: 3,
            expiry_margin: Duration::from_secs(10),
            production: false,
            api_base: DEFAULT_API_BASE.to_string(),
            wxa_base: DEFAULT_WXA_BASE.to_string(),
        };
        match preset {
            ConfigPreset::Production => Self {
                production: true,
                ..base
            },
            ConfigPreset::Development => base,
            ConfigPreset::FromEnv => Self::default(),
        }
    }
}
