//! High-level API client.
//!
//! [`ApiClient`] pairs a [`RequestBuilder`] with a [`Transport`]: log in, then issue
//! signed calls that come back as parsed JSON with their status.

use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    config::{ApiConfig, ClientConfig},
    error::{AuthError, Result},
    login::{LoginFlow, LoginOutcome},
    request::{ApiRequest, HttpMethod, RequestBuilder},
    session::Session,
    transport::{HttpTransport, Transport},
};

/// Parsed response to a signed call.
///
/// Non-`2xx` statuses are returned here rather than raised; interpreting them is up to
/// the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Parsed JSON body; `Null` for an empty body.
    pub body: Value,
}

impl ApiResponse {
    /// Whether the status is `2xx`.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Login and signed `GET`/`POST`/`PUT` over one transport.
///
/// # Examples
///
/// ```rust,no_run
/// use mac_auth::{client::ApiClient, config::ClientConfig};
/// use serde_json::json;
///
/// # async fn example() -> mac_auth::error::Result<()> {
/// let client = ApiClient::from_config(&ClientConfig::default())?;
/// let mut session = client.open_session("app-key");
///
/// if client.login_as(&mut session, "bob", "hunter2").await?.is_authenticated() {
///     let me = client.get(&session, "/user/bob").await?;
///     println!("{}: {}", me.status, me.body);
///
///     client.put(&session, "/user/bob", &json!({"first_name": "Worlds"})).await?;
///     client.post_related_objects(&session, "/user/bob/things", &[json!(["id1", "id2"])]).await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient<T> {
    builder: RequestBuilder,
    transport: T,
}

impl ApiClient<HttpTransport> {
    /// Creates a client over HTTPS from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns configuration errors and errors from [`HttpTransport::new`].
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config.api.base_url, &config.transport)?;
        Ok(Self::new(config.api.clone(), transport))
    }
}

impl<T: Transport> ApiClient<T> {
    /// Creates a client for `config` over `transport`.
    #[must_use]
    pub const fn new(config: ApiConfig, transport: T) -> Self {
        Self { builder: RequestBuilder::new(config), transport }
    }

    /// Request builder used for every call.
    #[must_use]
    pub const fn builder(&self) -> &RequestBuilder {
        &self.builder
    }

    /// Underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Opens an unauthenticated session for this API.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for constructors"
    )]
    pub fn open_session(&self, api_key: impl Into<String>) -> Session {
        self.builder.config().open_session(api_key)
    }

    /// Logs `session` in as the configured principal type.
    ///
    /// # Errors
    ///
    /// See [`LoginFlow::login_as_type`].
    pub async fn login_as(
        &self,
        session: &mut Session,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome> {
        LoginFlow::new(&self.builder, &self.transport).login_as(session, username, password).await
    }

    /// Signed `GET`.
    ///
    /// # Errors
    ///
    /// Request building, transport and JSON parsing errors.
    pub async fn get(&self, session: &Session, uri: &str) -> Result<ApiResponse> {
        let request = self.builder.get(session, uri)?;
        self.send(&request).await
    }

    /// Signed `POST` creating an object.
    ///
    /// # Errors
    ///
    /// Request building, transport and JSON parsing errors.
    pub async fn post(&self, session: &Session, uri: &str, body: &Value) -> Result<ApiResponse> {
        let request = self.builder.post(session, uri, body)?;
        self.send(&request).await
    }

    /// Signed `PUT` updating an object.
    ///
    /// # Errors
    ///
    /// Request building, transport and JSON parsing errors.
    pub async fn put(&self, session: &Session, uri: &str, body: &Value) -> Result<ApiResponse> {
        let request = self.builder.put(session, uri, body)?;
        self.send(&request).await
    }

    /// Appends related objects: `POST` of `objects` flattened into one JSON array.
    ///
    /// Nested arrays are flattened at every depth, so `["a", ["b", ["c"]]]` posts
    /// `["a","b","c"]`.
    ///
    /// # Errors
    ///
    /// Request building, transport and JSON parsing errors.
    pub async fn post_related_objects(
        &self,
        session: &Session,
        base_uri: &str,
        objects: &[Value],
    ) -> Result<ApiResponse> {
        let mut flat = Vec::with_capacity(objects.len());
        flatten_into(objects, &mut flat);
        self.post(session, base_uri, &Value::Array(flat)).await
    }

    /// Executes any signed request.
    ///
    /// # Errors
    ///
    /// Request building, transport and JSON parsing errors.
    pub async fn signed(
        &self,
        session: &Session,
        method: HttpMethod,
        uri: &str,
        body: Option<&Value>,
        extra_headers: &[(&str, &str)],
    ) -> Result<ApiResponse> {
        let request = self.builder.signed(session, method, uri, body, extra_headers)?;
        self.send(&request).await
    }

    #[instrument(skip(self, request), fields(method = %request.method, uri = %request.uri))]
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let response = self.transport.execute(request).await?;
        debug!(status = response.status, "signed call completed");

        let body = if response.body.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&response.body).map_err(|e| {
                AuthError::InvalidResponse(format!(
                    "status {} with non-JSON body: {e}",
                    response.status
                ))
            })?
        };

        Ok(ApiResponse { status: response.status, body })
    }
}

fn flatten_into(values: &[Value], out: &mut Vec<Value>) {
    for value in values {
        match value {
            Value::Array(items) => flatten_into(items, out),
            other => out.push(other.clone()),
        }
    }
}
