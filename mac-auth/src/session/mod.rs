//! The authenticated session entity.
//!
//! A [`Session`] starts with only an application API key. A successful login adds an
//! access token, MAC key and user identity in one step; everything needed to sign
//! requests then comes from the session.
//!
//! # Lifecycle
//!
//! ```text
//!                 login_as            2xx/3xx
//! Unauthenticated ─────────▶ Pending ─────────▶ Authenticated
//!        ▲                      │ 401
//!        │                      ▼
//!        └──────────────────  Failed
//!          mark_unauthenticated
//! ```
//!
//! Errors during `Pending` (5xx, unexpected 4xx, transport failures) restore the
//! state the session had before the attempt.
//!
//! # Examples
//!
//! ```
//! use mac_auth::session::{Session, UserIdentity};
//! use serde_json::json;
//!
//! # fn example() -> mac_auth::error::Result<()> {
//! let mut session = Session::new("app-key").with_api_version("1");
//! assert!(!session.is_authenticated());
//!
//! let identity = UserIdentity::try_from(json!({"username": "bob"})).unwrap();
//! session.mark_authenticated("token-1", "mac-key", identity)?;
//! assert!(session.is_authenticated());
//!
//! session.update_identity_attribute("nickname", "bobby")?;
//! assert!(session.update_identity_attribute("username", "eve").is_err());
//!
//! // Hand the signing context to another process.
//! let config = session.export_config();
//! let worker = Session::from_config(config)?;
//! assert_eq!(worker.access_token(), Some("token-1"));
//! # Ok(())
//! # }
//! ```

mod credentials;
mod identity;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha1::{Digest, Sha1};

pub use credentials::{Credentials, MacKey, SessionConfig};
pub use identity::{PASSWORD_FIELD, PROTECTED_FIELDS, USERNAME_FIELD, UserIdentity};

use crate::{
    error::{AuthError, Result},
    mac::MacSigner,
};

/// API version used when none is configured.
pub const DEFAULT_API_VERSION: &str = "0";

/// Host signatures are bound to when none is configured.
pub const DEFAULT_API_HOST: &str = "api.stackmob.com";

/// Computes the cache key for a username: the SHA-1 hex digest of its bytes.
///
/// The key only locates a cached session; it is not a credential.
///
/// # Examples
///
/// ```
/// use mac_auth::session::compute_session_key;
///
/// assert_eq!(compute_session_key("bob"), "48181acd22b3edaebc8a447868a7df7ce629920a");
/// ```
#[must_use]
pub fn compute_session_key(username: &str) -> String {
    hex::encode(Sha1::digest(username.as_bytes()))
}

/// Login progress of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginState {
    /// No login attempted, or credentials cleared.
    #[default]
    Unauthenticated,
    /// A login request is in flight.
    Pending,
    /// The last login succeeded.
    Authenticated,
    /// The last login was rejected with `401`.
    Failed,
}

/// Credentials, identity and login state for one API principal.
///
/// Not shared between concurrent logins: [`LoginFlow`](crate::login::LoginFlow) takes
/// `&mut Session`. Clone it to sign from several tasks.
#[derive(Debug, Clone)]
pub struct Session {
    api_key: String,
    api_version: String,
    credentials: Option<Credentials>,
    user_identity: Option<UserIdentity>,
    state: LoginState,
    session_key: Option<String>,
    signing_host: String,
}

impl Session {
    /// Creates an unauthenticated session with API version `"0"` bound to
    /// [`DEFAULT_API_HOST`].
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for constructors"
    )]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_version: DEFAULT_API_VERSION.to_owned(),
            credentials: None,
            user_identity: None,
            state: LoginState::Unauthenticated,
            session_key: None,
            signing_host: DEFAULT_API_HOST.to_owned(),
        }
    }

    /// Sets the API version at construction.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Sets the host covered by signatures at construction.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn with_signing_host(mut self, signing_host: impl Into<String>) -> Self {
        self.signing_host = signing_host.into();
        self
    }

    /// Installs previously issued credentials at construction.
    ///
    /// The session can sign but is not marked authenticated: no identity is known.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn with_credentials(
        mut self,
        access_token: impl Into<String>,
        mac_key: impl Into<MacKey>,
    ) -> Self {
        self.credentials =
            Some(Credentials { access_token: access_token.into(), mac_key: mac_key.into() });
        self
    }

    /// Rebuilds a signing context exported by [`export_config`](Self::export_config).
    ///
    /// Identity and login state are not restored.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ConfigError`] if only one of `access_token` and `mac_key` is set.
    pub fn from_config(config: SessionConfig) -> Result<Self> {
        let SessionConfig { api_key, access_token, mac_key, api_version } = config;
        let session = Self::new(api_key).with_api_version(api_version);

        match (access_token, mac_key) {
            (Some(token), Some(key)) => Ok(session.with_credentials(token, key)),
            (None, None) => Ok(session),
            _ => Err(AuthError::ConfigError(
                "access_token and mac_key must be set together".to_owned(),
            )),
        }
    }

    /// Exports `api_key`, `access_token`, `mac_key` and `api_version`.
    #[must_use]
    pub fn export_config(&self) -> SessionConfig {
        SessionConfig {
            api_key: self.api_key.clone(),
            access_token: self.credentials.as_ref().map(|c| c.access_token.clone()),
            mac_key: self.credentials.as_ref().map(|c| c.mac_key.clone()),
            api_version: self.api_version.clone(),
        }
    }

    /// Marks the session authenticated with freshly issued credentials.
    ///
    /// Token, key and identity are replaced together.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AuthenticationError`] if `identity` has no string `username`;
    /// the session is left unchanged.
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for setters"
    )]
    pub fn mark_authenticated(
        &mut self,
        access_token: impl Into<String>,
        mac_key: impl Into<MacKey>,
        identity: UserIdentity,
    ) -> Result<()> {
        if identity.username().is_none() {
            return Err(AuthError::AuthenticationError(
                "identity has no username".to_owned(),
            ));
        }

        self.credentials =
            Some(Credentials { access_token: access_token.into(), mac_key: mac_key.into() });
        self.user_identity = Some(identity);
        self.state = LoginState::Authenticated;
        Ok(())
    }

    /// Clears credentials and identity. Idempotent.
    pub fn mark_unauthenticated(&mut self) {
        self.clear();
        self.state = LoginState::Unauthenticated;
    }

    /// Replaces the identity wholesale if the username is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::IdentityMismatch`] if the usernames differ or the session has
    /// no identity; the session is left unchanged.
    pub fn update_identity(&mut self, new_identity: UserIdentity) -> Result<()> {
        let current = self.username();
        let requested = new_identity.username();

        if current.is_none() || current != requested {
            return Err(AuthError::IdentityMismatch {
                current: current.map(str::to_owned),
                requested: requested.map(str::to_owned),
            });
        }

        self.user_identity = Some(new_identity);
        Ok(())
    }

    /// Sets one identity attribute in place.
    ///
    /// # Errors
    ///
    /// - [`AuthError::ProtectedField`] for `username` and `password`
    /// - [`AuthError::NotAuthenticated`] if the session has no identity
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<Value> mirrors serde_json::Map::insert"
    )]
    pub fn update_identity_attribute(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        if PROTECTED_FIELDS.contains(&name) {
            return Err(AuthError::ProtectedField(name.to_owned()));
        }

        let identity = self.user_identity.as_mut().ok_or(AuthError::NotAuthenticated)?;
        identity.insert(name, value);
        Ok(())
    }

    /// Returns a signer for this session's credentials and signing host.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnsignedRequest`] if the session holds no credentials.
    pub fn signer(&self) -> Result<MacSigner<'_>> {
        let credentials = self.credentials.as_ref().ok_or(AuthError::UnsignedRequest)?;
        Ok(MacSigner::new(
            &credentials.access_token,
            credentials.mac_key.as_bytes(),
            &self.signing_host,
        ))
    }

    /// Application API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// API version sent on every request.
    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Access token, once issued.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.access_token.as_str())
    }

    /// MAC key, once issued.
    #[must_use]
    pub fn mac_key(&self) -> Option<&MacKey> {
        self.credentials.as_ref().map(|c| &c.mac_key)
    }

    /// Whether the session holds credentials to sign with.
    #[must_use]
    pub const fn can_sign(&self) -> bool {
        self.credentials.is_some()
    }

    /// Identity of the authenticated principal.
    #[must_use]
    pub const fn user_identity(&self) -> Option<&UserIdentity> {
        self.user_identity.as_ref()
    }

    /// Username of the authenticated principal.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.user_identity.as_ref().and_then(UserIdentity::username)
    }

    /// Whether the last login succeeded.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state == LoginState::Authenticated
    }

    /// Current login state.
    #[must_use]
    pub const fn login_state(&self) -> LoginState {
        self.state
    }

    /// Cache key derived from the username of the last login attempt.
    #[must_use]
    pub fn session_key(&self) -> Option<&str> {
        self.session_key.as_deref()
    }

    /// Host covered by signatures.
    #[must_use]
    pub fn signing_host(&self) -> &str {
        &self.signing_host
    }

    /// Captures the full session for a trusted cache.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            config: self.export_config(),
            signing_host: self.signing_host.clone(),
            session_key: self.session_key.clone(),
            state: self.state,
            user_identity: self.user_identity.clone(),
        }
    }

    /// Rebuilds a session captured by [`snapshot`](Self::snapshot).
    ///
    /// A snapshot taken mid-login comes back `Unauthenticated`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::ConfigError`] if only one of token and key is present
    /// - [`AuthError::AuthenticationError`] if an authenticated snapshot lacks credentials
    ///   or a username
    pub fn from_snapshot(snapshot: SessionSnapshot) -> Result<Self> {
        let SessionSnapshot { config, signing_host, session_key, state, user_identity } =
            snapshot;
        let mut session = Self::from_config(config)?.with_signing_host(signing_host);

        if state == LoginState::Authenticated
            && (!session.can_sign() || user_identity.as_ref().and_then(UserIdentity::username).is_none())
        {
            return Err(AuthError::AuthenticationError(
                "authenticated snapshot is missing credentials or username".to_owned(),
            ));
        }

        session.session_key = session_key;
        session.user_identity = user_identity;
        session.state = match state {
            LoginState::Pending => LoginState::Unauthenticated,
            other => other,
        };
        Ok(session)
    }

    /// Enters `Pending`, returning the state to restore if the attempt errors.
    pub(crate) fn begin_login(&mut self) -> LoginState {
        std::mem::replace(&mut self.state, LoginState::Pending)
    }

    /// Puts back the state saved by [`begin_login`](Self::begin_login).
    pub(crate) fn restore_state(&mut self, previous: LoginState) {
        self.state = previous;
    }

    /// Records a rejected login: clears credentials and identity, state `Failed`.
    pub(crate) fn mark_failed(&mut self) {
        self.clear();
        self.state = LoginState::Failed;
    }

    pub(crate) fn set_session_key(&mut self, session_key: String) {
        self.session_key = Some(session_key);
    }

    fn clear(&mut self) {
        self.credentials = None;
        self.user_identity = None;
    }
}

/// Everything a trusted session cache needs to restore a [`Session`].
///
/// Contains the MAC key; only write it to stores you trust.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Exportable signing context.
    #[serde(flatten)]
    pub config: SessionConfig,
    /// Host covered by signatures.
    pub signing_host: String,
    /// Cache key of the session.
    #[serde(default)]
    pub session_key: Option<String>,
    /// Login state at capture time.
    #[serde(default)]
    pub state: LoginState,
    /// Identity at capture time.
    #[serde(default)]
    pub user_identity: Option<UserIdentity>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn identity(value: Value) -> UserIdentity {
        UserIdentity::try_from(value).unwrap()
    }

    fn authenticated_session() -> Session {
        let mut session = Session::new("app-key");
        session
            .mark_authenticated("token-1", "mac-1", identity(json!({"username": "bob", "age": 30})))
            .unwrap();
        session
    }

    #[test]
    fn test_new_session_defaults() {
        let session = Session::new("app-key");
        assert_eq!(session.api_key(), "app-key");
        assert_eq!(session.api_version(), "0");
        assert_eq!(session.signing_host(), DEFAULT_API_HOST);
        assert!(session.access_token().is_none());
        assert!(session.mac_key().is_none());
        assert!(session.user_identity().is_none());
        assert!(session.session_key().is_none());
        assert!(!session.is_authenticated());
        assert!(!session.can_sign());
        assert_eq!(session.login_state(), LoginState::Unauthenticated);
    }

    #[test]
    fn test_builder_methods() {
        let session = Session::new("app-key")
            .with_api_version("2")
            .with_signing_host("api.example.com")
            .with_credentials("tok", "key");
        assert_eq!(session.api_version(), "2");
        assert_eq!(session.signing_host(), "api.example.com");
        assert_eq!(session.access_token(), Some("tok"));
        assert!(session.can_sign());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_compute_session_key_deterministic() {
        assert_eq!(compute_session_key("bob"), compute_session_key("bob"));
        assert_eq!(compute_session_key("alice"), "522b276a356bdf39013dfabea2cd43e141ecc9e8");
        assert_ne!(compute_session_key("bob"), compute_session_key("Bob"));
        assert_eq!(compute_session_key("").len(), 40);
    }

    #[test]
    fn test_mark_authenticated_sets_all_fields() {
        let session = authenticated_session();
        assert!(session.is_authenticated());
        assert_eq!(session.access_token(), Some("token-1"));
        assert_eq!(session.mac_key(), Some(&MacKey::new("mac-1")));
        assert_eq!(session.username(), Some("bob"));
    }

    #[test]
    fn test_mark_authenticated_requires_username() {
        let mut session = Session::new("app-key");
        let result = session.mark_authenticated("t", "k", identity(json!({"email": "x@y.z"})));
        assert!(matches!(result, Err(AuthError::AuthenticationError(_))));
        assert!(!session.can_sign());
        assert!(session.user_identity().is_none());
        assert_eq!(session.login_state(), LoginState::Unauthenticated);
    }

    #[test]
    fn test_mark_unauthenticated_idempotent() {
        let mut session = authenticated_session();
        session.mark_unauthenticated();
        session.mark_unauthenticated();
        assert!(!session.is_authenticated());
        assert!(session.access_token().is_none());
        assert!(session.mac_key().is_none());
        assert!(session.user_identity().is_none());
        assert_eq!(session.api_key(), "app-key");
    }

    #[test]
    fn test_update_identity_same_username() {
        let mut session = authenticated_session();
        session.update_identity(identity(json!({"username": "bob", "age": 31}))).unwrap();
        assert_eq!(session.user_identity().unwrap().get("age"), Some(&json!(31)));
    }

    #[test]
    fn test_update_identity_mismatch_leaves_state() {
        let mut session = authenticated_session();
        let before = serde_json::to_vec(session.user_identity().unwrap()).unwrap();

        let result = session.update_identity(identity(json!({"username": "eve", "age": 99})));
        assert!(matches!(result, Err(AuthError::IdentityMismatch { .. })));

        let missing = session.update_identity(identity(json!({"age": 99})));
        assert!(matches!(missing, Err(AuthError::IdentityMismatch { requested: None, .. })));

        let after = serde_json::to_vec(session.user_identity().unwrap()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_update_identity_without_identity() {
        let mut session = Session::new("app-key");
        let result = session.update_identity(identity(json!({"username": "bob"})));
        assert!(matches!(result, Err(AuthError::IdentityMismatch { current: None, .. })));
        assert!(session.user_identity().is_none());
    }

    #[test]
    fn test_update_identity_attribute_protected() {
        let mut session = authenticated_session();
        for field in ["username", "password"] {
            let result = session.update_identity_attribute(field, "x");
            assert!(matches!(result, Err(AuthError::ProtectedField(ref f)) if f == field));
        }
        assert_eq!(session.username(), Some("bob"));
        assert!(session.user_identity().unwrap().get("password").is_none());
    }

    #[test]
    fn test_update_identity_attribute_visible() {
        let mut session = authenticated_session();
        session.update_identity_attribute("first_name", "Worlds").unwrap();
        session.update_identity_attribute("age", 31).unwrap();
        let identity = session.user_identity().unwrap();
        assert_eq!(identity.get("first_name"), Some(&json!("Worlds")));
        assert_eq!(identity.get("age"), Some(&json!(31)));
    }

    #[test]
    fn test_update_identity_attribute_requires_identity() {
        let mut session = Session::new("app-key");
        let result = session.update_identity_attribute("first_name", "x");
        assert!(matches!(result, Err(AuthError::NotAuthenticated)));
    }

    #[test]
    fn test_export_from_config_roundtrip() {
        let session = authenticated_session().with_api_version("3");
        let restored = Session::from_config(session.export_config()).unwrap();

        assert_eq!(restored.api_key(), session.api_key());
        assert_eq!(restored.access_token(), session.access_token());
        assert_eq!(restored.mac_key(), session.mac_key());
        assert_eq!(restored.api_version(), session.api_version());
        assert!(!restored.is_authenticated());
        assert!(restored.user_identity().is_none());
    }

    #[test]
    fn test_export_config_json_shape() {
        let value = serde_json::to_value(authenticated_session().export_config()).unwrap();
        assert_eq!(
            value,
            json!({"api_key": "app-key", "access_token": "token-1", "mac_key": "mac-1", "api_version": "0"})
        );
    }

    #[test]
    fn test_from_config_rejects_half_credentials() {
        let config = SessionConfig {
            api_key: "app".to_owned(),
            access_token: Some("tok".to_owned()),
            mac_key: None,
            api_version: "0".to_owned(),
        };
        assert!(matches!(Session::from_config(config), Err(AuthError::ConfigError(_))));
    }

    #[test]
    fn test_signer_requires_credentials() {
        let session = Session::new("app-key");
        assert!(matches!(session.signer(), Err(AuthError::UnsignedRequest)));

        let session = authenticated_session();
        let signer = session.signer().unwrap();
        assert_eq!(signer.host(), DEFAULT_API_HOST);
        assert_eq!(signer.port(), "80");
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut session = authenticated_session().with_signing_host("api.example.com");
        session.set_session_key(compute_session_key("bob"));

        let json = serde_json::to_string(&session.snapshot()).unwrap();
        let restored = Session::from_snapshot(serde_json::from_str(&json).unwrap()).unwrap();

        assert!(restored.is_authenticated());
        assert_eq!(restored.username(), Some("bob"));
        assert_eq!(restored.session_key(), session.session_key());
        assert_eq!(restored.signing_host(), "api.example.com");
        assert_eq!(restored.mac_key(), session.mac_key());
    }

    #[test]
    fn test_snapshot_pending_restores_unauthenticated() {
        let mut session = Session::new("app-key");
        session.begin_login();
        let restored = Session::from_snapshot(session.snapshot()).unwrap();
        assert_eq!(restored.login_state(), LoginState::Unauthenticated);
    }

    #[test]
    fn test_snapshot_rejects_inconsistent_authenticated() {
        let mut snapshot = authenticated_session().snapshot();
        snapshot.user_identity = None;
        assert!(matches!(
            Session::from_snapshot(snapshot),
            Err(AuthError::AuthenticationError(_))
        ));
    }

    #[test]
    fn test_begin_and_restore_state() {
        let mut session = authenticated_session();
        let previous = session.begin_login();
        assert_eq!(session.login_state(), LoginState::Pending);
        assert!(!session.is_authenticated());
        session.restore_state(previous);
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_mark_failed_clears_credentials() {
        let mut session = authenticated_session();
        session.mark_failed();
        assert_eq!(session.login_state(), LoginState::Failed);
        assert!(!session.can_sign());
        assert!(session.user_identity().is_none());
    }

    #[test]
    fn test_debug_redacts_mac_key() {
        let session = authenticated_session();
        let debug = format!("{session:?}");
        assert!(!debug.contains("mac-1"));
        assert!(debug.contains("<redacted>"));
    }
}
