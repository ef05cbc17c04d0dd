//! The MAC `Authorization` header value.

use std::{fmt, str::FromStr};

use subtle::ConstantTimeEq;
use tracing::{debug, instrument, warn};

use crate::{
    error::{AuthError, Result},
    mac::{MAC_SCHEME, SigningInput, compute_mac},
};

/// Parsed or generated `Authorization: MAC ...` header.
///
/// Renders as `MAC id="<token>",ts="<ts>",nonce="<nonce>",mac="<mac>"`.
///
/// # Examples
///
/// ```
/// use mac_auth::mac::MacAuthorization;
///
/// # fn example() -> mac_auth::error::Result<()> {
/// let header = r#"MAC id="token-1",ts="1",nonce="n0000000001",mac="NEvrXUsbPYgsp/eQNayWT7LYf1c=""#;
/// let auth: MacAuthorization = header.parse()?;
///
/// assert_eq!(auth.id, "token-1");
/// auth.verify("GET", "/user/bob", "api.example.com", None, b"secret-mac-key")?;
/// assert_eq!(auth.to_string(), header);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacAuthorization {
    /// Access token identifying the credentials.
    pub id: String,
    /// Timestamp covered by the signature.
    pub ts: String,
    /// Nonce covered by the signature.
    pub nonce: String,
    /// Base64 HMAC-SHA1 digest.
    pub mac: String,
}

impl MacAuthorization {
    /// Recomputes the digest for the given request and compares it in constant time.
    ///
    /// Only the digest is checked. Timestamp age and nonce reuse are not enforced.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CryptoError`] if the digest does not match.
    #[instrument(skip(self, mac_key), fields(id = %self.id, nonce = %self.nonce))]
    pub fn verify(
        &self,
        method: &str,
        request_uri: &str,
        host: &str,
        port: Option<&str>,
        mac_key: &[u8],
    ) -> Result<()> {
        let input = SigningInput {
            timestamp: &self.ts,
            nonce: &self.nonce,
            method,
            request_uri,
            host,
            port,
        };
        let expected = compute_mac(&input, mac_key)?;

        if bool::from(expected.as_bytes().ct_eq(self.mac.as_bytes())) {
            debug!("MAC verified");
            Ok(())
        } else {
            warn!("MAC verification failed");
            Err(AuthError::CryptoError("MAC verification failed".to_owned()))
        }
    }
}

impl fmt::Display for MacAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"{MAC_SCHEME} id="{}",ts="{}",nonce="{}",mac="{}""#,
            self.id, self.ts, self.nonce, self.mac
        )
    }
}

impl FromStr for MacAuthorization {
    type Err = AuthError;

    fn from_str(value: &str) -> Result<Self> {
        let params = value
            .trim()
            .strip_prefix(MAC_SCHEME)
            .and_then(|rest| rest.strip_prefix(' '))
            .ok_or_else(|| AuthError::MalformedAuthorization("missing MAC scheme".to_owned()))?;

        let (mut id, mut ts, mut nonce, mut mac) = (None, None, None, None);

        for pair in params.split(',') {
            let (key, raw) = pair.trim().split_once('=').ok_or_else(|| {
                AuthError::MalformedAuthorization(format!("expected key=\"value\", got '{pair}'"))
            })?;
            let unquoted = raw.strip_prefix('"').and_then(|v| v.strip_suffix('"')).ok_or_else(
                || AuthError::MalformedAuthorization(format!("parameter '{key}' must be quoted")),
            )?;

            let slot = match key {
                "id" => &mut id,
                "ts" => &mut ts,
                "nonce" => &mut nonce,
                "mac" => &mut mac,
                other => {
                    return Err(AuthError::MalformedAuthorization(format!(
                        "unknown parameter '{other}'"
                    )));
                }
            };
            if slot.replace(unquoted.to_owned()).is_some() {
                return Err(AuthError::MalformedAuthorization(format!(
                    "duplicate parameter '{key}'"
                )));
            }
        }

        let missing =
            |name: &str| AuthError::MalformedAuthorization(format!("missing parameter '{name}'"));

        Ok(Self {
            id: id.ok_or_else(|| missing("id"))?,
            ts: ts.ok_or_else(|| missing("ts"))?,
            nonce: nonce.ok_or_else(|| missing("nonce"))?,
            mac: mac.ok_or_else(|| missing("mac"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        r#"MAC id="token-1",ts="1",nonce="n0000000001",mac="NEvrXUsbPYgsp/eQNayWT7LYf1c=""#;

    #[test]
    fn test_parse_valid_header() {
        let auth: MacAuthorization = HEADER.parse().unwrap();
        assert_eq!(auth.id, "token-1");
        assert_eq!(auth.ts, "1");
        assert_eq!(auth.nonce, "n0000000001");
        assert_eq!(auth.mac, "NEvrXUsbPYgsp/eQNayWT7LYf1c=");
    }

    #[test]
    fn test_display_matches_wire_format() {
        let auth = MacAuthorization {
            id: "abc".to_owned(),
            ts: "42".to_owned(),
            nonce: "n0000000042".to_owned(),
            mac: "xyz=".to_owned(),
        };
        assert_eq!(auth.to_string(), r#"MAC id="abc",ts="42",nonce="n0000000042",mac="xyz=""#);
    }

    #[test]
    fn test_parse_tolerates_spaces_after_commas() {
        let header = r#"MAC id="t", ts="1", nonce="n0000000001", mac="m=""#;
        let auth: MacAuthorization = header.parse().unwrap();
        assert_eq!(auth.mac, "m=");
    }

    #[test]
    fn test_parse_rejects_other_scheme() {
        let result = "Bearer abc".parse::<MacAuthorization>();
        assert!(matches!(result, Err(AuthError::MalformedAuthorization(_))));

        let result = r#"MACid="t",ts="1",nonce="n",mac="m""#.parse::<MacAuthorization>();
        assert!(matches!(result, Err(AuthError::MalformedAuthorization(_))));
    }

    #[test]
    fn test_parse_rejects_missing_parameter() {
        let result = r#"MAC id="t",ts="1",nonce="n0000000001""#.parse::<MacAuthorization>();
        let err = result.unwrap_err();
        assert!(err.to_string().contains("missing parameter 'mac'"));
    }

    #[test]
    fn test_parse_rejects_unquoted_value() {
        let result = r#"MAC id=t,ts="1",nonce="n0000000001",mac="m""#.parse::<MacAuthorization>();
        assert!(matches!(result, Err(AuthError::MalformedAuthorization(_))));
    }

    #[test]
    fn test_parse_rejects_duplicate_and_unknown() {
        let dup = r#"MAC id="t",id="u",ts="1",nonce="n",mac="m""#.parse::<MacAuthorization>();
        assert!(dup.unwrap_err().to_string().contains("duplicate"));

        let unknown = r#"MAC id="t",ts="1",nonce="n",mac="m",ext="x""#.parse::<MacAuthorization>();
        assert!(unknown.unwrap_err().to_string().contains("unknown parameter"));
    }

    #[test]
    fn test_verify_accepts_matching_request() {
        let auth: MacAuthorization = HEADER.parse().unwrap();
        assert!(auth.verify("GET", "/user/bob", "api.example.com", None, b"secret-mac-key").is_ok());
        assert!(
            auth.verify("get", "/user/bob", "api.example.com", Some("80"), b"secret-mac-key")
                .is_ok()
        );
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let auth: MacAuthorization = HEADER.parse().unwrap();
        assert!(auth.verify("POST", "/user/bob", "api.example.com", None, b"secret-mac-key").is_err());
        assert!(auth.verify("GET", "/user/eve", "api.example.com", None, b"secret-mac-key").is_err());
        assert!(auth.verify("GET", "/user/bob", "evil.example.com", None, b"secret-mac-key").is_err());
        assert!(auth.verify("GET", "/user/bob", "api.example.com", None, b"wrong-key").is_err());

        let replayed = MacAuthorization { ts: "2".to_owned(), ..auth };
        assert!(
            replayed.verify("GET", "/user/bob", "api.example.com", None, b"secret-mac-key").is_err()
        );
    }
}
