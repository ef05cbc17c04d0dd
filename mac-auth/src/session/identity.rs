//! Authenticated principal attributes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute holding the principal's username.
pub const USERNAME_FIELD: &str = "username";

/// Attribute holding the principal's password.
pub const PASSWORD_FIELD: &str = "password";

/// Attributes that cannot be changed without re-authenticating.
pub const PROTECTED_FIELDS: [&str; 2] = [USERNAME_FIELD, PASSWORD_FIELD];

/// The principal's attributes as returned by the API.
///
/// A thin wrapper over a JSON object; [`username`](Self::username) is the only
/// attribute with meaning to the session.
///
/// # Examples
///
/// ```
/// use mac_auth::session::UserIdentity;
/// use serde_json::json;
///
/// let identity = UserIdentity::try_from(json!({"username": "bob", "plan": "pro"})).unwrap();
/// assert_eq!(identity.username(), Some("bob"));
/// assert_eq!(identity.get("plan"), Some(&json!("pro")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserIdentity(Map<String, Value>);

impl UserIdentity {
    /// Creates an empty identity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the `username` attribute when it is a string.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.0.get(USERNAME_FIELD).and_then(Value::as_str)
    }

    /// Returns an attribute.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Returns all attributes.
    #[must_use]
    pub const fn attributes(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Sets an attribute, returning the previous value.
    ///
    /// Unrestricted; the session guards protected fields.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }
}

impl From<Map<String, Value>> for UserIdentity {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for UserIdentity {
    type Error = Value;

    /// Accepts JSON objects, hands back any other value.
    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}
