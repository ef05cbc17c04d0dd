//! MAC access-token request signing.
//!
//! Every authenticated request carries an `Authorization` header whose `mac` value is
//! an HMAC-SHA1 digest over a newline-framed canonical string. The server rebuilds the
//! same string from the request it receives, so the framing must match byte for byte.
//!
//! # Canonical String
//!
//! ```text
//! <timestamp>\n
//! <nonce>\n
//! <METHOD>\n
//! <request-uri>\n
//! <host>\n
//! <port>\n
//! \n
//! ```
//!
//! - `timestamp`: Unix seconds, decimal, no leading zeros
//! - `nonce`: `n` followed by ten zero-padded random digits
//! - `request-uri`: path and query, no scheme or host
//! - `port`: `80` unless given
//!
//! # Key Components
//!
//! - [`canonical_string`] and [`compute_mac`]: the pure signing algorithm
//! - [`MacSigner`]: binds a MAC key, host and port, fills in timestamp and nonce
//! - [`MacAuthorization`]: the `Authorization` header value (render, parse, verify)
//!
//! # Examples
//!
//! ```rust
//! use mac_auth::mac::{SigningInput, canonical_string, compute_mac};
//!
//! # fn example() -> mac_auth::error::Result<()> {
//! let input = SigningInput {
//!     timestamp: "1",
//!     nonce: "n0000000001",
//!     method: "GET",
//!     request_uri: "/user/bob",
//!     host: "api.example.com",
//!     port: None,
//! };
//!
//! assert_eq!(canonical_string(&input), "1\nn0000000001\nGET\n/user/bob\napi.example.com\n80\n\n");
//!
//! let mac = compute_mac(&input, b"secret-mac-key")?;
//! assert!(!mac.contains('\n'));
//! # Ok(())
//! # }
//! ```
//!
//! # Security Considerations
//!
//! - The MAC key is a shared secret; it is never recorded in tracing spans
//! - Nonce uniqueness is the caller's concern, nothing here remembers nonces
//! - Verification checks the digest only, not timestamp freshness

pub mod header;
pub mod signer;


pub use header::MacAuthorization;
pub use signer::{
    DEFAULT_PORT, MacSigner, SignatureParams, SigningInput, canonical_string, compute_mac,
    current_timestamp, generate_nonce,
};

/// Authentication scheme name used in the `Authorization` header.
pub const MAC_SCHEME: &str = "MAC";

/// Token type requested from the access-token endpoint.
pub const TOKEN_TYPE: &str = "mac";
