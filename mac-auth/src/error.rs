//! Error types for MAC session operations.
//!
//! All errors implement the standard [`std::error::Error`] trait via [`thiserror::Error`].
//!
//! # Error Categories
//!
//! - **Remote status errors** ([`AuthError::ServerError`],
//!   [`AuthError::UnexpectedClientError`]): the API answered a login with a status
//!   that is neither success nor `401`
//! - **Local validation errors** ([`AuthError::IdentityMismatch`],
//!   [`AuthError::ProtectedField`], [`AuthError::NotAuthenticated`]): rejected session
//!   mutations, the session is left unchanged
//! - **Signing errors** ([`AuthError::UnsignedRequest`], [`AuthError::CryptoError`])
//! - **Network errors** ([`AuthError::HttpError`], [`AuthError::TransportError`])
//!
//! A rejected password is *not* an error: [`LoginFlow`](crate::login::LoginFlow) returns
//! [`LoginOutcome::Failed`](crate::login::LoginOutcome::Failed) for a `401` response.
//!
//! # Examples
//!
//! ```
//! use mac_auth::error::{AuthError, Result};
//!
//! fn check_status(status: u16) -> Result<()> {
//!     if status >= 500 {
//!         return Err(AuthError::ServerError(status));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_status(503).is_err());
//! ```

use thiserror::Error;

/// Result type alias for session operations.
///
/// All fallible functions in this crate return this type.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while authenticating or signing requests.
///
/// # Error Recovery
///
/// - **Transient errors** ([`ServerError`](Self::ServerError), [`HttpError`](Self::HttpError)):
///   retry policy belongs to the caller, this crate never retries
/// - **Validation errors** ([`IdentityMismatch`](Self::IdentityMismatch),
///   [`ProtectedField`](Self::ProtectedField)): fix input, the session is untouched
/// - **Programmer errors** ([`UnsignedRequest`](Self::UnsignedRequest)): only reachable when a
///   signed call is made before login
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum AuthError {
    /// The API answered with a 5xx status.
    #[error("server error {0} from API")]
    ServerError(u16),

    /// The API answered a login with a 4xx status other than `401`.
    #[error("unexpected client response {0} from API")]
    UnexpectedClientError(u16),

    /// Login response or identity could not be turned into an authenticated session.
    ///
    /// Raised when the identity lacks a `username` or the success body is malformed.
    #[error("authentication error: {0}")]
    AuthenticationError(String),

    /// Identity replacement attempted with a different username.
    #[error("identity mismatch: session belongs to {current:?}, update names {requested:?}")]
    IdentityMismatch {
        /// Username currently held by the session.
        current: Option<String>,
        /// Username carried by the rejected identity.
        requested: Option<String>,
    },

    /// Attempted to change `username` or `password` through an attribute update.
    #[error("identity attribute '{0}' is protected")]
    ProtectedField(String),

    /// The session has no authenticated identity.
    #[error("session is not authenticated")]
    NotAuthenticated,

    /// A signed request was requested but the session holds no access token or MAC key.
    #[error("cannot sign request: session has no access token or MAC key")]
    UnsignedRequest,

    /// Request could not be built (bad URI, header injection, body serialization).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Response body could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// `Authorization` header does not follow the MAC scheme.
    #[error("malformed MAC authorization header: {0}")]
    MalformedAuthorization(String),

    /// Low-level cryptographic or clock failure.
    #[error("cryptographic operation failed: {0}")]
    CryptoError(String),

    /// HTTP request failed (connection refused, TLS failure, timeout).
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Transport rejected the request before sending it.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Configuration is invalid.
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    /// Session store failed to read or write an entry.
    #[error("session store error: {0}")]
    StoreError(String),
}

impl AuthError {
    /// Returns the HTTP status carried by remote status errors.
    ///
    /// # Examples
    ///
    /// ```
    /// use mac_auth::AuthError;
    ///
    /// assert_eq!(AuthError::ServerError(502).status(), Some(502));
    /// assert_eq!(AuthError::NotAuthenticated.status(), None);
    /// ```
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::ServerError(code) | Self::UnexpectedClientError(code) => Some(*code),
            _ => None,
        }
    }
}
