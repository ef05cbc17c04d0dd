//! HTTP transport configuration.
//!
//! Deserialized from the `[transport]` table of the client configuration.
//!
//! ```toml
//! [transport]
//! timeout_secs = 30
//! http_version = "http2"
//!
//! [transport.tls]
//! ca_certificate_file = "/etc/ssl/certs/internal-ca.pem"
//! ```

use std::{ops::RangeInclusive, path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::error::{AuthError, Result};

/// Accepted `timeout_secs` values.
pub const TIMEOUT_SECS: RangeInclusive<u64> = 1..=300;

/// Accepted `connect_timeout_secs` values.
pub const CONNECT_TIMEOUT_SECS: RangeInclusive<u64> = 1..=60;

/// Connection pool, timeout and TLS settings for [`HttpTransport`](super::HttpTransport).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpConfig {
    /// Maximum idle connections per host.
    #[serde(default = "default_pool_max_idle")]
    pub pool_max_idle_per_host: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// HTTP version preference.
    #[serde(default)]
    pub http_version: HttpVersion,

    /// Certificate verification settings.
    #[serde(default)]
    pub tls: TlsConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: default_pool_max_idle(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            http_version: HttpVersion::default(),
            tls: TlsConfig::default(),
        }
    }
}

impl HttpConfig {
    /// Checks timeouts against [`TIMEOUT_SECS`] and [`CONNECT_TIMEOUT_SECS`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TransportError`] naming the first field out of range.
    pub fn validate(&self) -> Result<()> {
        check_range("timeout_secs", self.timeout_secs, &TIMEOUT_SECS)?;
        check_range("connect_timeout_secs", self.connect_timeout_secs, &CONNECT_TIMEOUT_SECS)
    }

    /// Whole-request deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Deadline for establishing the TCP and TLS connection.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn check_range(field: &str, value: u64, range: &RangeInclusive<u64>) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(AuthError::TransportError(format!(
            "{field} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        )))
    }
}

/// HTTP version preference.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HttpVersion {
    /// HTTP/1.1 only.
    Http1,
    /// HTTP/2 only (prior knowledge).
    Http2,
    /// Negotiate via ALPN.
    #[default]
    Auto,
}

/// Certificate verification settings.
///
/// Verification is always on. The only knob is an extra PEM trust root, for APIs
/// behind a private CA.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TlsConfig {
    /// PEM file with an additional CA certificate.
    #[serde(default)]
    pub ca_certificate_file: Option<PathBuf>,
}

fn default_pool_max_idle() -> usize {
    10
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_config_default() {
        let config = HttpConfig::default();
        assert_eq!(config.pool_max_idle_per_host, 10);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.http_version, HttpVersion::Auto);
        assert!(config.tls.ca_certificate_file.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_config_empty_toml() {
        let config: HttpConfig = toml::from_str("").unwrap();
        assert_eq!(config, HttpConfig::default());
    }

    #[test]
    fn test_http_config_from_toml() {
        let toml = r#"
            pool_max_idle_per_host = 20
            timeout_secs = 45
            http_version = "http1"

            [tls]
            ca_certificate_file = "/etc/ssl/ca.pem"
        "#;

        let config: HttpConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.pool_max_idle_per_host, 20);
        assert_eq!(config.timeout_secs, 45);
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.http_version, HttpVersion::Http1);
        assert_eq!(config.tls.ca_certificate_file, Some(PathBuf::from("/etc/ssl/ca.pem")));
    }

    #[test]
    fn test_http_version_invalid_value() {
        let result: std::result::Result<HttpConfig, _> = toml::from_str("http_version = \"http3\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_tls_config_has_no_verify_switch() {
        // Unknown keys are ignored; nothing turns verification off.
        let config: TlsConfig = toml::from_str("danger_accept_invalid_certs = true").unwrap();
        assert_eq!(config, TlsConfig::default());
    }

    #[test]
    fn test_validate_accepts_range_ends() {
        for (timeout_secs, connect_timeout_secs) in [(1, 1), (300, 60)] {
            let config = HttpConfig { timeout_secs, connect_timeout_secs, ..Default::default() };
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        for (timeout_secs, connect_timeout_secs, field) in [
            (0, 10, "timeout_secs"),
            (301, 10, "timeout_secs"),
            (30, 0, "connect_timeout_secs"),
            (30, 61, "connect_timeout_secs"),
        ] {
            let config = HttpConfig { timeout_secs, connect_timeout_secs, ..Default::default() };
            let err = config.validate().unwrap_err();
            assert!(matches!(err, AuthError::TransportError(_)));
            assert!(err.to_string().starts_with(&format!("transport error: {field} must be between")));
        }
    }
}
