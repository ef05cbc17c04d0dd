//! Client configuration.
//!
//! Everything vendor-specific about the API (host, media type vendor, header prefix,
//! user agent, identity namespace) lives in [`ApiConfig`] so nothing is hard-wired into
//! request building. [`ClientConfig`] bundles it with transport and store settings and
//! loads from TOML.
//!
//! # Examples
//!
//! ```
//! use mac_auth::config::ClientConfig;
//!
//! let config = ClientConfig::from_toml(
//!     r#"
//!     [api]
//!     host = "api.example.com"
//!     base_url = "https://api.example.com"
//!
//!     [store]
//!     session_ttl_secs = 300
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.api.api_key_header(), "X-StackMob-API-Key");
//! assert_eq!(config.store.session_ttl_secs, 300);
//! assert_eq!(config.transport.timeout_secs, 30);
//! ```

use std::path::Path;

use serde::Deserialize;
use url::Url;

use crate::{
    error::{AuthError, Result},
    mac::DEFAULT_PORT,
    session::{DEFAULT_API_HOST, DEFAULT_API_VERSION, Session, SessionConfig},
    transport::HttpConfig,
};

/// Root configuration file layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// API endpoint and vendor constants.
    #[serde(default)]
    pub api: ApiConfig,

    /// HTTP transport settings.
    #[serde(default)]
    pub transport: HttpConfig,

    /// Session cache policy.
    #[serde(default)]
    pub store: StoreConfig,
}

impl ClientConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ConfigError`] on malformed TOML, or any error from
    /// [`validate`](Self::validate).
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| AuthError::ConfigError(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ConfigError`] if the file cannot be read, plus any error from
    /// [`from_toml`](Self::from_toml).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            AuthError::ConfigError(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&source)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate(&self) -> Result<()> {
        self.api.validate()?;
        self.transport.validate()?;
        self.store.validate()
    }
}

/// API endpoint and vendor constants.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiConfig {
    /// Host covered by request signatures.
    #[serde(default = "default_host")]
    pub host: String,

    /// Base URL requests are sent to. Must be HTTPS.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Vendor in the `Accept` media type, `application/vnd.<vendor>+json`.
    #[serde(default = "default_vendor")]
    pub vendor: String,

    /// Vendor in custom header names, `X-<header_vendor>-API-Key`.
    #[serde(default = "default_header_vendor")]
    pub header_vendor: String,

    /// Value of the user agent header.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// API version for new sessions.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Principal type used by `login_as`.
    #[serde(default = "default_user_type")]
    pub user_type: String,

    /// Port covered by request signatures.
    #[serde(default = "default_signing_port")]
    pub signing_port: String,

    /// Top-level key of the login response holding the user object.
    #[serde(default = "default_identity_namespace")]
    pub identity_namespace: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            base_url: default_base_url(),
            vendor: default_vendor(),
            header_vendor: default_header_vendor(),
            user_agent: default_user_agent(),
            api_version: default_api_version(),
            user_type: default_user_type(),
            signing_port: default_signing_port(),
            identity_namespace: default_identity_namespace(),
        }
    }
}

impl ApiConfig {
    /// Validates the configuration.
    ///
    /// Checks that:
    /// - `base_url` parses and uses HTTPS
    /// - `host`, `vendor`, `header_vendor`, `user_type` and `identity_namespace` are
    ///   non-empty tokens (ASCII alphanumerics, `.`, `-`, `_`)
    /// - `signing_port` is a port number
    /// - `user_agent` and `api_version` contain no control characters
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ConfigError`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url).map_err(|e| {
            AuthError::ConfigError(format!("invalid base_url '{}': {e}", self.base_url))
        })?;
        if url.scheme() != "https" {
            return Err(AuthError::ConfigError(format!(
                "base_url must use HTTPS, got: {}",
                url.scheme()
            )));
        }

        for (name, value) in [
            ("host", &self.host),
            ("vendor", &self.vendor),
            ("header_vendor", &self.header_vendor),
            ("user_type", &self.user_type),
            ("identity_namespace", &self.identity_namespace),
        ] {
            validate_token(name, value)?;
        }

        if self.signing_port.parse::<u16>().is_err() {
            return Err(AuthError::ConfigError(format!(
                "signing_port must be a port number, got: {}",
                self.signing_port
            )));
        }

        for (name, value) in [("user_agent", &self.user_agent), ("api_version", &self.api_version)]
        {
            if value.chars().any(char::is_control) {
                return Err(AuthError::ConfigError(format!(
                    "{name} must not contain control characters"
                )));
            }
        }

        Ok(())
    }

    /// Opens an unauthenticated session bound to the configured host and version.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for constructors"
    )]
    pub fn open_session(&self, api_key: impl Into<String>) -> Session {
        Session::new(api_key)
            .with_api_version(self.api_version.as_str())
            .with_signing_host(self.host.as_str())
    }

    /// Rebuilds an exported session bound to the configured host.
    ///
    /// # Errors
    ///
    /// See [`Session::from_config`].
    pub fn restore_session(&self, config: SessionConfig) -> Result<Session> {
        Ok(Session::from_config(config)?.with_signing_host(self.host.as_str()))
    }

    /// `Accept` value for an API version.
    #[must_use]
    pub fn accept_header(&self, api_version: &str) -> String {
        format!("application/vnd.{}+json; version={api_version}", self.vendor)
    }

    /// Name of the API key header.
    #[must_use]
    pub fn api_key_header(&self) -> String {
        format!("X-{}-API-Key", self.header_vendor)
    }

    /// Name of the user agent header.
    #[must_use]
    pub fn user_agent_header(&self) -> String {
        format!("X-{}-User-Agent", self.header_vendor)
    }
}

/// Session cache policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Lifetime of cached sessions in seconds.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Maximum entries in the in-process store.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { session_ttl_secs: default_session_ttl_secs(), capacity: default_capacity() }
    }
}

impl StoreConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ConfigError`] if `session_ttl_secs` or `capacity` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.session_ttl_secs == 0 {
            return Err(AuthError::ConfigError("session_ttl_secs must be positive".to_owned()));
        }
        if self.capacity == 0 {
            return Err(AuthError::ConfigError("capacity must be positive".to_owned()));
        }
        Ok(())
    }
}

fn validate_token(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(AuthError::ConfigError(format!("{name} must not be empty")));
    }
    if !value.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_')) {
        return Err(AuthError::ConfigError(format!("{name} contains invalid characters: {value}")));
    }
    Ok(())
}

fn default_host() -> String {
    DEFAULT_API_HOST.to_owned()
}

fn default_base_url() -> String {
    format!("https://{DEFAULT_API_HOST}")
}

fn default_vendor() -> String {
    "stackmob".to_owned()
}

fn default_header_vendor() -> String {
    "StackMob".to_owned()
}

fn default_user_agent() -> String {
    "StackMob (JS; 0.9.2)".to_owned()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_owned()
}

fn default_user_type() -> String {
    "user".to_owned()
}

fn default_signing_port() -> String {
    DEFAULT_PORT.to_owned()
}

fn default_identity_namespace() -> String {
    "stackmob".to_owned()
}

const fn default_session_ttl_secs() -> u64 {
    600
}

const fn default_capacity() -> usize {
    1024
}
