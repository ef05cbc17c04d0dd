//! HTTP transport implementation.
//!
//! HTTP/1.1 and HTTP/2 over reqwest with rustls. Certificate verification is always
//! enabled and only HTTPS base URLs are accepted.

use std::fs;

use reqwest::{Certificate, Client};
use tracing::{debug, instrument};
use url::Url;

use super::config::{HttpConfig, HttpVersion, TlsConfig};
use crate::{
    error::{AuthError, Result},
    request::{ApiRequest, HttpMethod, validate_header},
    transport::{Transport, TransportResponse},
};

/// Ensures the base URL is HTTPS with a host.
fn validate_base_url(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url)
        .map_err(|e| AuthError::TransportError(format!("invalid base_url '{base_url}': {e}")))?;

    if url.scheme() != "https" {
        return Err(AuthError::TransportError("Only HTTPS URLs are allowed".to_owned()));
    }
    if url.host_str().is_none() {
        return Err(AuthError::TransportError(format!("URL missing host: {base_url}")));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(AuthError::TransportError(
            "base_url must not carry a query or fragment".to_owned(),
        ));
    }

    Ok(url)
}

fn load_root_certificate(tls: &TlsConfig) -> Result<Option<Certificate>> {
    let Some(path) = &tls.ca_certificate_file else {
        return Ok(None);
    };
    let pem = fs::read(path).map_err(|e| {
        AuthError::ConfigError(format!("failed to read CA certificate {}: {e}", path.display()))
    })?;
    Certificate::from_pem(&pem).map(Some).map_err(|e| {
        AuthError::ConfigError(format!("invalid CA certificate {}: {e}", path.display()))
    })
}

/// HTTP/1.1 and HTTP/2 transport using reqwest.
///
/// Bound to one API base URL; request URIs are appended to it. Supports connection
/// pooling, keep-alive and HTTP/2 multiplexing.
///
/// # Examples
///
/// ```
/// use mac_auth::transport::{HttpConfig, HttpTransport, HttpVersion, Transport};
///
/// let config = HttpConfig { http_version: HttpVersion::Http1, ..HttpConfig::default() };
/// let transport = HttpTransport::new("https://api.example.com", &config).unwrap();
/// assert_eq!(transport.protocol_name(), "http/1.1");
///
/// assert!(HttpTransport::new("http://api.example.com", &config).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    http_version: HttpVersion,
}

impl HttpTransport {
    /// Creates a transport for `base_url`.
    ///
    /// An extra trust root from `config.tls` is added to the built-in roots.
    ///
    /// # Errors
    ///
    /// - [`AuthError::TransportError`] if `base_url` is not an HTTPS URL
    /// - [`AuthError::ConfigError`] if the CA certificate cannot be loaded
    /// - [`AuthError::HttpError`] if the client cannot be built
    pub fn new(base_url: &str, config: &HttpConfig) -> Result<Self> {
        let url = validate_base_url(base_url)?;

        let mut builder = Client::builder()
            .https_only(true)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout());

        builder = match config.http_version {
            HttpVersion::Http1 => builder.http1_only(),
            HttpVersion::Http2 => builder.http2_prior_knowledge(),
            HttpVersion::Auto => builder,
        };

        if let Some(certificate) = load_root_certificate(&config.tls)? {
            builder = builder.add_root_certificate(certificate);
        }

        let client = builder.build().map_err(AuthError::HttpError)?;

        Ok(Self {
            client,
            base_url: url.as_str().trim_end_matches('/').to_owned(),
            http_version: config.http_version,
        })
    }

    /// Base URL requests are sent to, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(
        skip(self, request),
        fields(method = %request.method, uri = %request.uri, protocol = self.protocol_name())
    )]
    async fn send(&self, request: &ApiRequest) -> Result<TransportResponse> {
        for (name, value) in &request.headers {
            validate_header(name, value)?;
        }

        let full_url = format!("{}{}", self.base_url, request.uri);

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&full_url),
            HttpMethod::Post => self.client.post(&full_url),
            HttpMethod::Put => self.client.put(&full_url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();

        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_owned()))
            .collect();

        let body = response.bytes().await.map_err(AuthError::HttpError)?.to_vec();
        debug!(status, body_len = body.len(), "response received");

        Ok(TransportResponse { status, body, headers })
    }
}

impl Transport for HttpTransport {
    async fn execute<'a>(&'a self, request: &'a ApiRequest) -> Result<TransportResponse> {
        self.send(request).await
    }

    fn protocol_name(&self) -> &'static str {
        match self.http_version {
            HttpVersion::Http1 => "http/1.1",
            HttpVersion::Http2 => "http/2",
            HttpVersion::Auto => "http",
        }
    }
}
