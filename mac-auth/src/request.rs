//! Request descriptors for login and signed API calls.
//!
//! [`RequestBuilder`] turns a [`Session`] plus a method, URI and optional JSON body into
//! an [`ApiRequest`]: the exact headers and body bytes a [`Transport`](crate::transport::Transport)
//! sends. Every request carries the versioned `Accept` type, the API key and the user
//! agent; signed requests add a MAC `Authorization` header.
//!
//! # Examples
//!
//! ```
//! use mac_auth::{
//!     config::ApiConfig,
//!     mac::SignatureParams,
//!     request::{HttpMethod, RequestBuilder},
//! };
//! use serde_json::json;
//!
//! # fn example() -> mac_auth::error::Result<()> {
//! let builder = RequestBuilder::new(ApiConfig::default());
//! let session = builder.config().open_session("app-key").with_credentials("tok", "key");
//!
//! let request = builder.signed_with(
//!     &session,
//!     HttpMethod::Put,
//!     "/user/bob",
//!     Some(&json!({"age": 31})),
//!     &[],
//!     SignatureParams::fixed("1361294600", "n0123456789"),
//! )?;
//!
//! assert_eq!(request.header("Content-Type"), Some("application/json"));
//! assert!(request.authorization().unwrap().starts_with("MAC id=\"tok\""));
//! # Ok(())
//! # }
//! ```

use std::fmt;

use serde_json::Value;
use tracing::{debug, instrument};
use url::form_urlencoded;

use crate::{
    config::ApiConfig,
    error::{AuthError, Result},
    mac::{SignatureParams, TOKEN_TYPE},
    session::{PASSWORD_FIELD, Session, USERNAME_FIELD},
};

/// `Content-Type` of JSON bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// `Content-Type` of login bodies.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Supported HTTP methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
}

impl HttpMethod {
    /// Upper-case method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully built request, ready for a transport.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Path and query, relative to the API base URL.
    pub uri: String,
    /// Headers in send order.
    pub headers: Vec<(String, String)>,
    /// Body bytes, if any.
    pub body: Option<Vec<u8>>,
}

impl ApiRequest {
    /// First header with `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The `Authorization` header, present on signed requests.
    #[must_use]
    pub fn authorization(&self) -> Option<&str> {
        self.header("Authorization")
    }
}

// Login bodies carry the password and signed requests a MAC; neither is printed.
impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &header_names)
            .field("body_len", &self.body.as_ref().map(Vec::len))
            .finish()
    }
}

/// Builds [`ApiRequest`]s from a session and [`ApiConfig`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    config: ApiConfig,
}

impl RequestBuilder {
    /// Creates a builder for an API.
    #[must_use]
    pub const fn new(config: ApiConfig) -> Self {
        Self { config }
    }

    /// API constants the builder uses.
    #[must_use]
    pub const fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Builds the unsigned login request: `POST /<user_type>/accessToken` with a form body.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidRequest`] if `user_type` is not a plain path segment.
    #[instrument(skip(self, session, username, password))]
    pub fn login(
        &self,
        session: &Session,
        user_type: &str,
        username: &str,
        password: &str,
    ) -> Result<ApiRequest> {
        if user_type.is_empty()
            || !user_type.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_'))
        {
            return Err(AuthError::InvalidRequest(format!("invalid user type '{user_type}'")));
        }

        // WHATWG form encoding: `*-._` and alphanumerics pass through, space becomes `+`,
        // everything else (including `~`) is percent-encoded.
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair(USERNAME_FIELD, username)
            .append_pair(PASSWORD_FIELD, password)
            .append_pair("token_type", TOKEN_TYPE)
            .finish();

        let mut headers = self.common_headers(session)?;
        headers.push(("Content-Type".to_owned(), FORM_CONTENT_TYPE.to_owned()));

        Ok(ApiRequest {
            method: HttpMethod::Post,
            uri: format!("/{user_type}/accessToken"),
            headers,
            body: Some(body.into_bytes()),
        })
    }

    /// Builds a signed `GET`.
    ///
    /// # Errors
    ///
    /// See [`signed_with`](Self::signed_with).
    pub fn get(&self, session: &Session, uri: &str) -> Result<ApiRequest> {
        self.signed(session, HttpMethod::Get, uri, None, &[])
    }

    /// Builds a signed `POST` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`signed_with`](Self::signed_with).
    pub fn post(&self, session: &Session, uri: &str, body: &Value) -> Result<ApiRequest> {
        self.signed(session, HttpMethod::Post, uri, Some(body), &[])
    }

    /// Builds a signed `PUT` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`signed_with`](Self::signed_with).
    pub fn put(&self, session: &Session, uri: &str, body: &Value) -> Result<ApiRequest> {
        self.signed(session, HttpMethod::Put, uri, Some(body), &[])
    }

    /// Builds a signed request with a fresh timestamp and nonce.
    ///
    /// # Errors
    ///
    /// See [`signed_with`](Self::signed_with).
    pub fn signed(
        &self,
        session: &Session,
        method: HttpMethod,
        uri: &str,
        body: Option<&Value>,
        extra_headers: &[(&str, &str)],
    ) -> Result<ApiRequest> {
        self.signed_with(session, method, uri, body, extra_headers, SignatureParams::default())
    }

    /// Builds a signed request, optionally with a fixed timestamp and nonce.
    ///
    /// Extra headers are appended after the standard ones. The signature covers the
    /// method, `uri`, the session's signing host and the configured signing port; the
    /// body is not covered.
    ///
    /// # Errors
    ///
    /// - [`AuthError::UnsignedRequest`] if the session holds no credentials
    /// - [`AuthError::InvalidRequest`] for a `uri` that is not a relative path, a header
    ///   with control characters, or an unserializable body
    #[instrument(skip(self, session, body, extra_headers, params))]
    pub fn signed_with(
        &self,
        session: &Session,
        method: HttpMethod,
        uri: &str,
        body: Option<&Value>,
        extra_headers: &[(&str, &str)],
        params: SignatureParams,
    ) -> Result<ApiRequest> {
        validate_uri(uri)?;
        let signer = session.signer()?.with_port(&self.config.signing_port);

        let mut headers = self.common_headers(session)?;
        for (name, value) in extra_headers {
            validate_header(name, value)?;
            headers.push(((*name).to_owned(), (*value).to_owned()));
        }

        let body = body
            .map(|value| {
                serde_json::to_vec(value)
                    .map_err(|e| AuthError::InvalidRequest(format!("unserializable body: {e}")))
            })
            .transpose()?;
        if body.is_some() {
            headers.push(("Content-Type".to_owned(), JSON_CONTENT_TYPE.to_owned()));
        }

        let authorization = signer.authorize(method.as_str(), uri, params)?;
        debug!(nonce = %authorization.nonce, "request signed");
        headers.push(("Authorization".to_owned(), authorization.to_string()));

        Ok(ApiRequest { method, uri: uri.to_owned(), headers, body })
    }

    fn common_headers(&self, session: &Session) -> Result<Vec<(String, String)>> {
        let headers = vec![
            ("Accept".to_owned(), self.config.accept_header(session.api_version())),
            (self.config.api_key_header(), session.api_key().to_owned()),
            (self.config.user_agent_header(), self.config.user_agent.clone()),
        ];
        for (name, value) in &headers {
            validate_header(name, value)?;
        }
        Ok(headers)
    }
}

/// Accepts `/path[?query]` only: no scheme, no authority, no traversal.
///
/// The query is opaque; it may carry URLs of its own.
fn validate_uri(uri: &str) -> Result<()> {
    if !uri.starts_with('/') || uri.starts_with("//") {
        return Err(AuthError::InvalidRequest(format!("request URI must be a path: '{uri}'")));
    }
    let path = uri.split_once('?').map_or(uri, |(path, _)| path);
    if path.contains("://") {
        return Err(AuthError::InvalidRequest(format!("request URI must not carry a scheme: '{uri}'")));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(AuthError::InvalidRequest("path traversal not allowed".to_owned()));
    }
    if uri.chars().any(|c| c.is_control() || c == ' ') {
        return Err(AuthError::InvalidRequest("request URI contains invalid characters".to_owned()));
    }
    Ok(())
}

/// Rejects header names and values that could split or smuggle headers.
pub(crate) fn validate_header(name: &str, value: &str) -> Result<()> {
    if name.is_empty() || name.contains(['\r', '\n', '\0', ':', ' ']) {
        return Err(AuthError::InvalidRequest(format!("invalid header name '{name}'")));
    }
    if value.contains(['\r', '\n', '\0']) {
        return Err(AuthError::InvalidRequest(format!(
            "invalid value for header '{name}': control characters not allowed"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::mac::MacAuthorization;

    fn builder() -> RequestBuilder {
        RequestBuilder::new(ApiConfig::default())
    }

    fn signing_session() -> Session {
        Session::new("app-key").with_credentials("token-1", "secret-mac-key")
    }

    fn fixed() -> SignatureParams {
        SignatureParams::fixed("1361294600", "n0123456789")
    }

    #[test]
    fn test_login_request_shape() {
        let session = Session::new("app-key").with_api_version("2");
        let request = builder().login(&session, "user", "bob", "p@ss w&rd").unwrap();

        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.uri, "/user/accessToken");
        assert_eq!(request.header("accept"), Some("application/vnd.stackmob+json; version=2"));
        assert_eq!(request.header("X-StackMob-API-Key"), Some("app-key"));
        assert_eq!(request.header("X-StackMob-User-Agent"), Some("StackMob (JS; 0.9.2)"));
        assert_eq!(request.header("Content-Type"), Some(FORM_CONTENT_TYPE));
        assert!(request.authorization().is_none());

        let body = String::from_utf8(request.body.unwrap()).unwrap();
        assert_eq!(body, "username=bob&password=p%40ss+w%26rd&token_type=mac");
    }

    #[test]
    fn test_login_form_encoding_of_special_characters() {
        let request = builder().login(&Session::new("k"), "user", "b.o_b-1", "a*b~c d+e/f").unwrap();
        let body = String::from_utf8(request.body.unwrap()).unwrap();
        assert_eq!(body, "username=b.o_b-1&password=a*b%7Ec+d%2Be%2Ff&token_type=mac");

        let decoded: Vec<(String, String)> =
            form_urlencoded::parse(body.as_bytes()).into_owned().collect();
        assert_eq!(decoded[1], ("password".to_owned(), "a*b~c d+e/f".to_owned()));
    }

    #[test]
    fn test_login_custom_user_type() {
        let request = builder().login(&Session::new("k"), "account", "bob", "x").unwrap();
        assert_eq!(request.uri, "/account/accessToken");
    }

    #[test]
    fn test_login_rejects_bad_user_type() {
        for user_type in ["", "user/../admin", "a b", "user?x=1"] {
            let result = builder().login(&Session::new("k"), user_type, "bob", "x");
            assert!(matches!(result, Err(AuthError::InvalidRequest(_))), "{user_type}");
        }
    }

    #[test]
    fn test_signed_requires_credentials() {
        let result = builder().get(&Session::new("app-key"), "/user/bob");
        assert!(matches!(result, Err(AuthError::UnsignedRequest)));
    }

    #[test]
    fn test_signed_get_known_signature() {
        let request = builder()
            .signed_with(&signing_session(), HttpMethod::Put, "/user/alice?depth=1", None, &[], fixed())
            .unwrap();

        assert_eq!(
            request.authorization(),
            Some(
                r#"MAC id="token-1",ts="1361294600",nonce="n0123456789",mac="iRoua91F21OjZQnHdUGHdYesTks=""#
            )
        );
        assert!(request.body.is_none());
        assert!(request.header("Content-Type").is_none());
    }

    #[test]
    fn test_signed_headers_identical_across_methods() {
        let session = signing_session();
        let body = json!({"age": 31});
        let strip = |r: ApiRequest| -> Vec<(String, String)> {
            r.headers.into_iter().filter(|(k, _)| k != "Authorization" && k != "Content-Type").collect()
        };

        let get = builder().signed_with(&session, HttpMethod::Get, "/user", None, &[], fixed()).unwrap();
        let post = builder()
            .signed_with(&session, HttpMethod::Post, "/user", Some(&body), &[], fixed())
            .unwrap();
        let put = builder()
            .signed_with(&session, HttpMethod::Put, "/user", Some(&body), &[], fixed())
            .unwrap();

        assert_ne!(get.authorization(), post.authorization());
        assert_ne!(post.authorization(), put.authorization());
        let get = strip(get);
        assert_eq!(get, strip(post));
        assert_eq!(get, strip(put));
    }

    #[test]
    fn test_signed_body_serialized_as_json() {
        let request = builder().post(&signing_session(), "/user", &json!({"username": "bob"})).unwrap();
        assert_eq!(request.header("content-type"), Some(JSON_CONTENT_TYPE));
        assert_eq!(request.body.as_deref(), Some(br#"{"username":"bob"}"#.as_slice()));
    }

    #[test]
    fn test_signed_authorization_verifies() {
        let session = signing_session();
        let request = builder().put(&session, "/user/bob", &json!({"age": 1})).unwrap();
        let auth: MacAuthorization = request.authorization().unwrap().parse().unwrap();
        assert_eq!(auth.id, "token-1");
        auth.verify("PUT", "/user/bob", session.signing_host(), Some("80"), b"secret-mac-key")
            .unwrap();
    }

    #[test]
    fn test_signing_port_from_config() {
        let config = ApiConfig { signing_port: "443".to_owned(), ..ApiConfig::default() };
        let session = signing_session();
        let request = RequestBuilder::new(config).get(&session, "/user").unwrap();
        let auth: MacAuthorization = request.authorization().unwrap().parse().unwrap();
        assert!(auth.verify("GET", "/user", session.signing_host(), Some("443"), b"secret-mac-key").is_ok());
        assert!(auth.verify("GET", "/user", session.signing_host(), None, b"secret-mac-key").is_err());
    }

    #[test]
    fn test_extra_headers_appended() {
        let request = builder()
            .signed(&signing_session(), HttpMethod::Get, "/user", None, &[("X-Trace", "abc")])
            .unwrap();
        assert_eq!(request.header("x-trace"), Some("abc"));
    }

    #[test]
    fn test_rejects_header_injection() {
        let session = signing_session();
        for header in [("X-Evil", "a\r\nX-Other: b"), ("X-Bad\n", "v"), ("", "v"), ("X-Null", "a\0")] {
            let result = builder().signed(&session, HttpMethod::Get, "/user", None, &[header]);
            assert!(matches!(result, Err(AuthError::InvalidRequest(_))), "{header:?}");
        }

        let evil_key = Session::new("key\r\nX-Evil: 1").with_credentials("t", "k");
        assert!(builder().get(&evil_key, "/user").is_err());
    }

    #[test]
    fn test_rejects_invalid_uris() {
        let session = signing_session();
        for uri in ["user", "", "https://evil.com/user", "//evil.com/user", "/a/../b", "/a b", "/a\nb", "/x/http://y"] {
            let result = builder().get(&session, uri);
            assert!(matches!(result, Err(AuthError::InvalidRequest(_))), "{uri}");
        }
    }

    #[test]
    fn test_accepts_query_strings() {
        let request = builder().get(&signing_session(), "/user?username=bob&depth=1").unwrap();
        assert_eq!(request.uri, "/user?username=bob&depth=1");
    }

    #[test]
    fn test_accepts_url_in_query() {
        let session = signing_session();
        for uri in ["/user?redirect=https://example.com/cb", "/x?r=http://y"] {
            let request = builder().get(&session, uri).unwrap();
            assert_eq!(request.uri, uri);
            let auth: MacAuthorization = request.authorization().unwrap().parse().unwrap();
            auth.verify("GET", uri, session.signing_host(), None, b"secret-mac-key").unwrap();
        }
    }

    #[test]
    fn test_debug_hides_secrets() {
        let request = builder().login(&Session::new("k"), "user", "bob", "hunter2").unwrap();
        let debug = format!("{request:?}");
        assert!(!debug.contains("hunter2"));

        let signed = builder().get(&signing_session(), "/user").unwrap();
        assert!(!format!("{signed:?}").contains(signed.authorization().unwrap()));
    }

    #[test]
    fn test_http_method_display() {
        assert_eq!(HttpMethod::Get.to_string(), "GET");
        assert_eq!(HttpMethod::Post.as_str(), "POST");
        assert_eq!(HttpMethod::Put.as_str(), "PUT");
    }
}
