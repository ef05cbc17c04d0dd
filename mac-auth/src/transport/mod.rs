//! Transport abstraction layer.
//!
//! A [`Transport`] sends an [`ApiRequest`] exactly as built and hands back the raw
//! status, headers and body. It never interprets status codes: a `401` or `503` is a
//! successful exchange at this layer. Only network and protocol failures are errors.
//!
//! # Examples
//!
//! ```rust,no_run
//! use mac_auth::{
//!     config::ApiConfig,
//!     request::RequestBuilder,
//!     transport::{HttpConfig, HttpTransport, Transport},
//! };
//!
//! # async fn example() -> mac_auth::error::Result<()> {
//! let config = ApiConfig::default();
//! let transport = HttpTransport::new(&config.base_url, &HttpConfig::default())?;
//!
//! let builder = RequestBuilder::new(config);
//! let session = builder.config().open_session("app-key").with_credentials("tok", "key");
//! let request = builder.get(&session, "/user/bob")?;
//!
//! let response = transport.execute(&request).await?;
//! println!("Status: {}", response.status);
//! # Ok(())
//! # }
//! ```

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;

use crate::{error::Result, request::ApiRequest};

pub mod config;
pub mod http;

pub use config::{HttpConfig, HttpVersion, TlsConfig};
pub use http::HttpTransport;

/// Raw response from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body bytes.
    pub body: Vec<u8>,
    /// Response headers.
    pub headers: Vec<(String, String)>,
}

impl TransportResponse {
    /// Creates a response without headers.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<Vec<u8>> accepts both strings and byte buffers"
    )]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, body: body.into(), headers: Vec::new() }
    }

    /// Whether the status is `2xx`.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// First header with `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Executes built requests.
///
/// Implemented by [`HttpTransport`]; tests and embedders supply their own
/// implementations to run the login flow without a network.
pub trait Transport: Send + Sync {
    /// Sends `request` and returns the response, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be sent or the response cannot be read.
    fn execute<'a>(
        &'a self,
        request: &'a ApiRequest,
    ) -> impl Future<Output = Result<TransportResponse>> + Send + 'a;

    /// Returns the protocol name for logging.
    ///
    /// Examples: "http/1.1", "http/2"
    fn protocol_name(&self) -> &'static str;
}
