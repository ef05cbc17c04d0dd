//! Login state machine.
//!
//! ```text
//! status >= 500        -> Err(ServerError), session restored
//! 400..=499, not 401   -> Err(UnexpectedClientError), session restored
//! 401                  -> Ok(Failed), credentials cleared, session key set
//! < 400                -> Ok(Authenticated), credentials installed, session key set
//! ```
//!
//! A `401` is an expected outcome and is returned as a value. Everything that leaves
//! the session in its pre-call state is an error.

use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::{
    error::{AuthError, Result},
    request::RequestBuilder,
    session::{LoginState, Session, UserIdentity, compute_session_key},
    transport::{Transport, TransportResponse},
};

/// Status that marks rejected credentials.
const UNAUTHORIZED: u16 = 401;

/// Result of a completed login exchange.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Credentials accepted; the session can sign.
    Authenticated,
    /// Credentials rejected with `401`.
    Failed,
}

impl LoginOutcome {
    /// Whether the login succeeded.
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

/// Drives a login over a [`Transport`].
///
/// # Examples
///
/// ```rust,no_run
/// use mac_auth::{
///     config::ApiConfig,
///     login::{LoginFlow, LoginOutcome},
///     request::RequestBuilder,
///     transport::{HttpConfig, HttpTransport},
/// };
///
/// # async fn example() -> mac_auth::error::Result<()> {
/// let config = ApiConfig::default();
/// let transport = HttpTransport::new(&config.base_url, &HttpConfig::default())?;
/// let builder = RequestBuilder::new(config);
/// let mut session = builder.config().open_session("app-key");
///
/// let flow = LoginFlow::new(&builder, &transport);
/// match flow.login_as(&mut session, "bob", "hunter2").await? {
///     LoginOutcome::Authenticated => println!("signed in as {:?}", session.username()),
///     LoginOutcome::Failed => println!("wrong username or password"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LoginFlow<'a, T> {
    builder: &'a RequestBuilder,
    transport: &'a T,
}

impl<'a, T: Transport> LoginFlow<'a, T> {
    /// Creates a flow sending requests built by `builder` over `transport`.
    #[must_use]
    pub const fn new(builder: &'a RequestBuilder, transport: &'a T) -> Self {
        Self { builder, transport }
    }

    /// Logs in as the configured principal type (`user` by default).
    ///
    /// # Errors
    ///
    /// See [`login_as_type`](Self::login_as_type).
    pub async fn login_as(
        &self,
        session: &mut Session,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome> {
        let user_type = self.builder.config().user_type.as_str();
        self.login_as_type(session, user_type, username, password).await
    }

    /// Logs in as a principal of `user_type`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::ServerError`] for `5xx`
    /// - [`AuthError::UnexpectedClientError`] for `4xx` other than `401`
    /// - [`AuthError::AuthenticationError`] for a success response without usable
    ///   credentials
    /// - [`AuthError::InvalidRequest`] if `user_type` is invalid
    /// - transport errors, unchanged
    ///
    /// The session is restored to its pre-call state on every error. It is not touched
    /// until the response has arrived, so dropping the returned future mid-request
    /// leaves it as it was.
    #[instrument(
        skip(self, session, username, password),
        fields(session_key = %compute_session_key(username), protocol = self.transport.protocol_name())
    )]
    pub async fn login_as_type(
        &self,
        session: &mut Session,
        user_type: &str,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome> {
        let response = match self.send_login(session, user_type, username, password).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "login request failed");
                return Err(e);
            }
        };

        let previous = session.begin_login();
        self.apply(session, previous, username, &response)
    }

    /// Applies a login response that was received out of band.
    ///
    /// Interprets `response` exactly as [`login_as_type`](Self::login_as_type) would.
    ///
    /// # Errors
    ///
    /// As [`login_as_type`](Self::login_as_type), minus transport errors.
    #[instrument(skip(self, session, username, response), fields(status = response.status))]
    pub fn initiate(
        &self,
        session: &mut Session,
        username: &str,
        response: &TransportResponse,
    ) -> Result<LoginOutcome> {
        let previous = session.begin_login();
        self.apply(session, previous, username, response)
    }

    async fn send_login(
        &self,
        session: &Session,
        user_type: &str,
        username: &str,
        password: &str,
    ) -> Result<TransportResponse> {
        let request = self.builder.login(session, user_type, username, password)?;
        self.transport.execute(&request).await
    }

    fn apply(
        &self,
        session: &mut Session,
        previous: LoginState,
        username: &str,
        response: &TransportResponse,
    ) -> Result<LoginOutcome> {
        let status = response.status;

        if status >= 500 {
            session.restore_state(previous);
            warn!(status, "login rejected by server error");
            return Err(AuthError::ServerError(status));
        }

        if status == UNAUTHORIZED {
            session.mark_failed();
            session.set_session_key(compute_session_key(username));
            info!("login failed: credentials rejected");
            return Ok(LoginOutcome::Failed);
        }

        if status >= 400 {
            session.restore_state(previous);
            warn!(status, "login rejected with unexpected client error");
            return Err(AuthError::UnexpectedClientError(status));
        }

        let installed = self.parse_grant(&response.body).and_then(|grant| {
            session.mark_authenticated(grant.access_token, grant.mac_key, grant.identity)
        });
        if let Err(e) = installed {
            session.restore_state(previous);
            warn!(status, error = %e, "login response unusable");
            return Err(e);
        }

        session.set_session_key(compute_session_key(username));
        info!(status, "login succeeded");
        Ok(LoginOutcome::Authenticated)
    }

    /// Extracts `<namespace>.user`, `access_token` and `mac_key` from a success body.
    fn parse_grant(&self, body: &[u8]) -> Result<Grant> {
        let malformed = |what: &str| AuthError::AuthenticationError(format!("login response {what}"));

        let mut value: Value =
            serde_json::from_slice(body).map_err(|_| malformed("is not valid JSON"))?;
        let namespace = self.builder.config().identity_namespace.as_str();

        let user = value
            .get_mut(namespace)
            .and_then(|ns| ns.get_mut("user"))
            .map(Value::take)
            .ok_or_else(|| malformed("has no user object"))?;
        let identity = UserIdentity::try_from(user).map_err(|_| malformed("user is not an object"))?;

        let field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| malformed(&format!("has no {name}")))
        };

        Ok(Grant { access_token: field("access_token")?, mac_key: field("mac_key")?, identity })
    }
}

struct Grant {
    access_token: String,
    mac_key: String,
    identity: UserIdentity,
}
