//! Canonical-string construction and HMAC-SHA1 signing.

use std::{fmt, time::SystemTime};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha1::Sha1;
use tracing::instrument;

use crate::{
    error::{AuthError, Result},
    mac::MacAuthorization,
};

type HmacSha1 = Hmac<Sha1>;

/// Port used in the canonical string when the caller does not supply one.
pub const DEFAULT_PORT: &str = "80";

/// Largest numeric nonce value (ten decimal digits).
const NONCE_MAX: u64 = 9_999_999_999;

/// Inputs covered by a MAC signature, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningInput<'a> {
    /// Unix timestamp in seconds, decimal.
    pub timestamp: &'a str,
    /// Single-use nonce.
    pub nonce: &'a str,
    /// HTTP method; upper-cased in the canonical string.
    pub method: &'a str,
    /// Path and query of the request, without scheme or host.
    pub request_uri: &'a str,
    /// Host the signature is bound to.
    pub host: &'a str,
    /// Port the signature is bound to, [`DEFAULT_PORT`] when `None`.
    pub port: Option<&'a str>,
}

/// Builds the newline-framed canonical string for `input`.
///
/// The six fields are joined by `\n` and followed by a blank line.
///
/// # Examples
///
/// ```
/// use mac_auth::mac::{SigningInput, canonical_string};
///
/// let input = SigningInput {
///     timestamp: "1361294600",
///     nonce: "n0123456789",
///     method: "post",
///     request_uri: "/user",
///     host: "api.stackmob.com",
///     port: Some("443"),
/// };
///
/// assert_eq!(
///     canonical_string(&input),
///     "1361294600\nn0123456789\nPOST\n/user\napi.stackmob.com\n443\n\n"
/// );
/// ```
#[must_use]
pub fn canonical_string(input: &SigningInput<'_>) -> String {
    let method = input.method.to_ascii_uppercase();
    let port = input.port.unwrap_or(DEFAULT_PORT);
    format!(
        "{}\n{}\n{method}\n{}\n{}\n{port}\n\n",
        input.timestamp, input.nonce, input.request_uri, input.host
    )
}

/// Computes the Base64 HMAC-SHA1 of the canonical string keyed with `mac_key`.
///
/// The output is standard padded Base64 with no line breaks.
///
/// # Errors
///
/// Returns [`AuthError::CryptoError`] if the HMAC cannot be keyed.
pub fn compute_mac(input: &SigningInput<'_>, mac_key: &[u8]) -> Result<String> {
    let mut mac = HmacSha1::new_from_slice(mac_key)
        .map_err(|e| AuthError::CryptoError(format!("invalid MAC key: {e}")))?;
    mac.update(canonical_string(input).as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Returns the current Unix time in seconds as a decimal string.
///
/// # Errors
///
/// Returns [`AuthError::CryptoError`] if the system clock is before the Unix epoch.
pub fn current_timestamp() -> Result<String> {
    let secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_err(|e| AuthError::CryptoError(format!("system time error: {e}")))?
        .as_secs();
    Ok(secs.to_string())
}

/// Generates a nonce: `n` followed by ten zero-padded digits.
///
/// Each call draws independently from the thread-local CSPRNG, so concurrent callers
/// share no generator state.
///
/// # Examples
///
/// ```
/// let nonce = mac_auth::mac::generate_nonce();
/// assert_eq!(nonce.len(), 11);
/// assert!(nonce.starts_with('n'));
/// ```
#[must_use]
pub fn generate_nonce() -> String {
    let value = rand::rng().random_range(0..=NONCE_MAX);
    format!("n{value:010}")
}

/// Optional fixed timestamp and nonce.
///
/// Missing values are generated at signing time. Fixed values exist so recorded
/// signatures can be reproduced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureParams {
    /// Timestamp to sign with instead of the current time.
    pub timestamp: Option<String>,
    /// Nonce to sign with instead of a fresh one.
    pub nonce: Option<String>,
}

impl SignatureParams {
    /// Parameters with both timestamp and nonce fixed.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn fixed(timestamp: impl Into<String>, nonce: impl Into<String>) -> Self {
        Self { timestamp: Some(timestamp.into()), nonce: Some(nonce.into()) }
    }
}

/// Signs requests for one access token.
///
/// Binds the MAC key, access token, signing host and port so each request only needs
/// its method and URI.
///
/// # Examples
///
/// ```
/// use mac_auth::mac::{MacSigner, SignatureParams};
///
/// # fn example() -> mac_auth::error::Result<()> {
/// let signer = MacSigner::new("token-1", b"secret-mac-key", "api.example.com");
/// let auth = signer.authorize(
///     "GET",
///     "/user/bob",
///     SignatureParams::fixed("1", "n0000000001"),
/// )?;
///
/// assert_eq!(
///     auth.to_string(),
///     r#"MAC id="token-1",ts="1",nonce="n0000000001",mac="NEvrXUsbPYgsp/eQNayWT7LYf1c=""#
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Copy)]
pub struct MacSigner<'a> {
    access_token: &'a str,
    mac_key: &'a [u8],
    host: &'a str,
    port: &'a str,
}

impl fmt::Debug for MacSigner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacSigner")
            .field("access_token", &self.access_token)
            .field("mac_key", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl<'a> MacSigner<'a> {
    /// Creates a signer bound to `host` on [`DEFAULT_PORT`].
    #[must_use]
    pub const fn new(access_token: &'a str, mac_key: &'a [u8], host: &'a str) -> Self {
        Self { access_token, mac_key, host, port: DEFAULT_PORT }
    }

    /// Overrides the port covered by the signature.
    #[must_use]
    pub const fn with_port(mut self, port: &'a str) -> Self {
        self.port = port;
        self
    }

    /// Returns the host covered by signatures.
    #[must_use]
    pub const fn host(&self) -> &str {
        self.host
    }

    /// Returns the port covered by signatures.
    #[must_use]
    pub const fn port(&self) -> &str {
        self.port
    }

    /// Signs `method` and `request_uri`, producing the `Authorization` value.
    ///
    /// Uses the current time and a fresh nonce unless `params` fixes them.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CryptoError`] if the clock or HMAC fails.
    #[instrument(skip(self, params), fields(host = self.host, port = self.port))]
    pub fn authorize(
        &self,
        method: &str,
        request_uri: &str,
        params: SignatureParams,
    ) -> Result<MacAuthorization> {
        let timestamp = match params.timestamp {
            Some(ts) => ts,
            None => current_timestamp()?,
        };
        let nonce = params.nonce.unwrap_or_else(generate_nonce);

        let input = SigningInput {
            timestamp: &timestamp,
            nonce: &nonce,
            method,
            request_uri,
            host: self.host,
            port: Some(self.port),
        };
        let mac = compute_mac(&input, self.mac_key)?;

        Ok(MacAuthorization { id: self.access_token.to_owned(), ts: timestamp, nonce, mac })
    }
}
