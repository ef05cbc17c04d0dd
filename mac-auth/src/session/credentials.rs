//! Signing credentials and the exportable session configuration.

use std::fmt;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::session::DEFAULT_API_VERSION;

/// Shared secret used to compute request MACs.
///
/// # Security
///
/// - `Debug` never prints the secret
/// - Memory is zeroized on drop
/// - Equality is constant-time
///
/// # Examples
///
/// ```
/// use mac_auth::session::MacKey;
///
/// let key = MacKey::new("s3cret");
/// assert_eq!(key.expose_secret(), "s3cret");
/// assert_eq!(format!("{key:?}"), "MacKey(<redacted>)");
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacKey(String);

impl MacKey {
    /// Wraps a MAC key.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for constructors"
    )]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the secret. Callers must not log it.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Returns the secret as HMAC key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<String> for MacKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for MacKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl PartialEq for MacKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl Eq for MacKey {}

impl fmt::Debug for MacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MacKey(<redacted>)")
    }
}

impl Drop for MacKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Access token and MAC key, always held together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Opaque token sent as the `id` of every MAC header.
    pub access_token: String,
    /// Shared signing secret.
    pub mac_key: MacKey,
}

/// Exportable signing context of a session.
///
/// Carries what a worker process needs to sign on behalf of a session:
/// `api_key`, `access_token`, `mac_key` and `api_version`. Identity and login state
/// are not part of it.
///
/// # Examples
///
/// ```
/// use mac_auth::session::SessionConfig;
///
/// let json = r#"{"api_key":"app-key","access_token":"tok","mac_key":"k","api_version":"1"}"#;
/// let config: SessionConfig = serde_json::from_str(json).unwrap();
/// assert_eq!(config.api_version, "1");
/// assert!(!format!("{config:?}").contains("\"k\""));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Application API key.
    pub api_key: String,
    /// Access token, if the session was authenticated.
    #[serde(default)]
    pub access_token: Option<String>,
    /// MAC key, if the session was authenticated.
    #[serde(default)]
    pub mac_key: Option<MacKey>,
    /// API version sent in the `Accept` header.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_key_debug_redacted() {
        let key = MacKey::new("super-secret");
        assert!(!format!("{key:?}").contains("super-secret"));
    }

    #[test]
    fn test_mac_key_serializes_transparently() {
        let key = MacKey::new("abc");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"abc\"");
    }

    #[test]
    fn test_mac_key_equality() {
        assert_eq!(MacKey::new("abc"), MacKey::from("abc"));
        assert_ne!(MacKey::new("abc"), MacKey::new("abd"));
        assert_ne!(MacKey::new("abc"), MacKey::new("abcd"));
    }

    #[test]
    fn test_session_config_defaults() {
        let config: SessionConfig = serde_json::from_str(r#"{"api_key":"app"}"#).unwrap();
        assert_eq!(config.api_key, "app");
        assert_eq!(config.api_version, "0");
        assert!(config.access_token.is_none());
        assert!(config.mac_key.is_none());
    }

    #[test]
    fn test_session_config_requires_api_key() {
        let result: std::result::Result<SessionConfig, _> = serde_json::from_str("{}");
        assert!(result.is_err());
    }
}
