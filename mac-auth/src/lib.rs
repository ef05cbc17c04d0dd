//! MAC access-token sessions for HTTP APIs.
//!
//! Authenticates a client against a remote API with a MAC-style access-token scheme
//! and keeps the resulting session so later calls are signed transparently.
//!
//! # What is in the box?
//!
//! - **Signing**: canonical-string HMAC-SHA1 `Authorization: MAC ...` headers, plus
//!   parsing and constant-time verification of the same headers
//! - **Sessions**: credentials, user identity and login state with guarded mutation,
//!   export for worker processes and snapshots for a session cache
//! - **Login flow**: one `POST /<user_type>/accessToken`, with `401` reported as a
//!   value and every other failure leaving the session as it was
//! - **Transport**: HTTPS-only reqwest client with mandatory certificate verification
//!
//! # Architecture
//!
//! ```text
//!  ┌────────────┐  login_as   ┌──────────────┐  ApiRequest  ┌───────────────┐
//!  │  ApiClient │────────────▶│  LoginFlow   │─────────────▶│   Transport   │
//!  └─────┬──────┘             └──────┬───────┘              │ (HttpTransport│
//!        │ get/post/put              │ mark_authenticated   │  or your own) │
//!        ▼                           ▼                      └───────────────┘
//!  ┌────────────────┐  signer  ┌───────────┐  snapshot  ┌────────────────────┐
//!  │ RequestBuilder │◀─────────│  Session  │───────────▶│ SessionCache/Store │
//!  └────────────────┘          └───────────┘            └────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mac_auth::{ApiClient, ClientConfig, LoginOutcome};
//! use serde_json::json;
//!
//! # async fn example() -> mac_auth::Result<()> {
//! let client = ApiClient::from_config(&ClientConfig::from_file("mac-auth.toml")?)?;
//! let mut session = client.open_session("my-api-key");
//!
//! match client.login_as(&mut session, "bob", "hunter2").await? {
//!     LoginOutcome::Authenticated => {
//!         let response = client.put(&session, "/user/bob", &json!({"age": 31})).await?;
//!         println!("{} {}", response.status, response.body);
//!     }
//!     LoginOutcome::Failed => eprintln!("bad credentials"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Signing Without a Network
//!
//! ```rust
//! use mac_auth::mac::{MacSigner, SignatureParams};
//!
//! # fn example() -> mac_auth::Result<()> {
//! let signer = MacSigner::new("token-1", b"secret-mac-key", "api.example.com");
//! let header = signer.authorize("GET", "/user/bob", SignatureParams::default())?;
//! assert!(header.to_string().starts_with("MAC id=\"token-1\""));
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Every fallible operation returns [`Result`] with [`AuthError`]. A rejected password
//! is not an error; see [`LoginOutcome::Failed`].
//!
//! ```rust,no_run
//! use mac_auth::{ApiClient, AuthError, ClientConfig};
//!
//! # async fn example() {
//! let client = ApiClient::from_config(&ClientConfig::default()).unwrap();
//! let mut session = client.open_session("my-api-key");
//!
//! match client.login_as(&mut session, "bob", "hunter2").await {
//!     Ok(outcome) => println!("login finished: {outcome:?}"),
//!     Err(AuthError::ServerError(status)) => eprintln!("API unavailable ({status})"),
//!     Err(e) => eprintln!("login error: {e}"),
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from reqwest and criterion"
)]

pub mod client;
pub mod config;
pub mod error;
pub mod login;
pub mod mac;
pub mod request;
pub mod session;
pub mod store;
pub mod transport;

pub use client::{ApiClient, ApiResponse};
pub use config::{ApiConfig, ClientConfig};
pub use error::{AuthError, Result};
pub use login::{LoginFlow, LoginOutcome};
pub use session::Session;

