//! External session cache contract.
//!
//! Sessions are persisted between requests by a key-value service with expiring
//! entries. The core only needs two operations from it, captured by [`SessionStore`];
//! [`SessionCache`] turns sessions into JSON entries keyed by
//! [`Session::session_key`]. [`MemoryStore`] is the in-process reference store.
//!
//! # Examples
//!
//! ```
//! use mac_auth::store::{MemoryStore, SessionCache, SessionStore};
//!
//! # async fn example() -> mac_auth::error::Result<()> {
//! let store = MemoryStore::new(128);
//! store.set("k", "v".to_owned(), 60).await?;
//! assert_eq!(store.get("k").await?.as_deref(), Some("v"));
//!
//! // Sessions are saved under their session key after a login attempt.
//! let cache = SessionCache::new(store, 600);
//! assert!(cache.load("48181acd22b3edaebc8a447868a7df7ce629920a").await?.is_none());
//! # Ok(())
//! # }
//! ```

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;
use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use lru::LruCache;
use tracing::{debug, instrument};

use crate::{
    config::StoreConfig,
    error::{AuthError, Result},
    session::{Session, SessionSnapshot},
};

/// Key-value store with per-entry expiry.
///
/// A missing or expired entry reads as `None`.
pub trait SessionStore: Send + Sync {
    /// Returns the live value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreError`] if the store is unreachable.
    fn get<'a>(&'a self, key: &'a str) -> impl Future<Output = Result<Option<String>>> + Send + 'a;

    /// Stores `value` under `key` for `ttl_secs` seconds, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreError`] if the store is unreachable.
    fn set<'a>(
        &'a self,
        key: &'a str,
        value: String,
        ttl_secs: u64,
    ) -> impl Future<Output = Result<()>> + Send + 'a;
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// Bounded in-process store; least recently used entries are evicted first.
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: Arc<Mutex<LruCache<String, Entry>>>,
}

impl MemoryStore {
    /// Creates a store holding at most `capacity` entries (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { entries: Arc::new(Mutex::new(LruCache::new(cap))) }
    }

    /// Creates a store sized by `config`.
    #[must_use]
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.capacity)
    }

    /// Number of entries, including expired ones not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LruCache<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|e| AuthError::StoreError(format!("session store lock poisoned: {e}")))
    }
}

impl SessionStore for MemoryStore {
    async fn get<'a>(&'a self, key: &'a str) -> Result<Option<String>> {
        let mut entries = self.lock()?;
        let expired = match entries.get(key) {
            None => return Ok(None),
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn set<'a>(&'a self, key: &'a str, value: String, ttl_secs: u64) -> Result<()> {
        let expires_at = Instant::now()
            .checked_add(Duration::from_secs(ttl_secs))
            .ok_or_else(|| AuthError::StoreError(format!("ttl out of range: {ttl_secs}")))?;
        self.lock()?.put(key.to_owned(), Entry { value, expires_at });
        Ok(())
    }
}

/// Saves and restores sessions through a [`SessionStore`].
///
/// Entries contain the MAC key; only back this with a trusted store.
#[derive(Debug, Clone)]
pub struct SessionCache<S> {
    store: S,
    ttl_secs: u64,
}

impl<S: SessionStore> SessionCache<S> {
    /// Creates a cache writing entries with a lifetime of `ttl_secs`.
    #[must_use]
    pub const fn new(store: S, ttl_secs: u64) -> Self {
        Self { store, ttl_secs }
    }

    /// Creates a cache with the lifetime from `config`.
    #[must_use]
    pub const fn with_config(store: S, config: &StoreConfig) -> Self {
        Self::new(store, config.session_ttl_secs)
    }

    /// Underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Writes `session` under its session key and returns the key.
    ///
    /// # Errors
    ///
    /// - [`AuthError::StoreError`] if the session has no key (no login attempted) or the
    ///   store fails
    #[instrument(skip(self, session), fields(session_key = session.session_key()))]
    pub async fn save(&self, session: &Session) -> Result<String> {
        let key = session
            .session_key()
            .ok_or_else(|| AuthError::StoreError("session has no session key".to_owned()))?
            .to_owned();
        let value = serde_json::to_string(&session.snapshot())
            .map_err(|e| AuthError::StoreError(format!("failed to serialize session: {e}")))?;

        self.store.set(&key, value, self.ttl_secs).await?;
        debug!(ttl_secs = self.ttl_secs, "session cached");
        Ok(key)
    }

    /// Reads the session stored under `key`.
    ///
    /// Returns `None` when nothing live is stored.
    ///
    /// # Errors
    ///
    /// - [`AuthError::StoreError`] if the store fails or the entry is not a session
    /// - errors from [`Session::from_snapshot`] for inconsistent entries
    #[instrument(skip(self))]
    pub async fn load(&self, key: &str) -> Result<Option<Session>> {
        let Some(value) = self.store.get(key).await? else {
            debug!("session cache miss");
            return Ok(None);
        };
        let snapshot: SessionSnapshot = serde_json::from_str(&value)
            .map_err(|e| AuthError::StoreError(format!("corrupt session entry: {e}")))?;
        Session::from_snapshot(snapshot).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::session::{LoginState, UserIdentity, compute_session_key};

    fn cached_session() -> Session {
        let mut session = Session::new("app-key").with_api_version("1");
        let identity = UserIdentity::try_from(json!({"username": "bob", "plan": "pro"})).unwrap();
        session.mark_authenticated("token-1", "mac-1", identity).unwrap();
        session.set_session_key(compute_session_key("bob"));
        session
    }

    #[tokio::test]
    async fn test_memory_store_get_set() {
        let store = MemoryStore::new(4);
        assert!(store.get("k").await.unwrap().is_none());

        store.set("k", "v1".to_owned(), 60).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v1"));

        store.set("k", "v2".to_owned(), 60).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_expired_entry_is_none() {
        let store = MemoryStore::new(4);
        store.set("k", "v".to_owned(), 0).await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_evicts_lru() {
        let store = MemoryStore::new(2);
        store.set("a", "1".to_owned(), 60).await.unwrap();
        store.set("b", "2".to_owned(), 60).await.unwrap();
        assert!(store.get("a").await.unwrap().is_some());
        store.set("c", "3".to_owned(), 60).await.unwrap();

        assert!(store.get("b").await.unwrap().is_none());
        assert!(store.get("a").await.unwrap().is_some());
        assert!(store.get("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_memory_store_zero_capacity_holds_one() {
        let store = MemoryStore::new(0);
        store.set("a", "1".to_owned(), 60).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_ttl_overflow() {
        let store = MemoryStore::new(1);
        let result = store.set("a", "1".to_owned(), u64::MAX).await;
        assert!(matches!(result, Err(AuthError::StoreError(_))));
    }

    #[tokio::test]
    async fn test_session_cache_roundtrip() {
        let cache = SessionCache::new(MemoryStore::new(8), 600);
        let session = cached_session();

        let key = cache.save(&session).await.unwrap();
        assert_eq!(key, "48181acd22b3edaebc8a447868a7df7ce629920a");

        let restored = cache.load(&key).await.unwrap().unwrap();
        assert_eq!(restored.login_state(), LoginState::Authenticated);
        assert_eq!(restored.username(), Some("bob"));
        assert_eq!(restored.user_identity().unwrap().get("plan"), Some(&json!("pro")));
        assert_eq!(restored.access_token(), Some("token-1"));
        assert_eq!(restored.mac_key(), session.mac_key());
        assert_eq!(restored.api_version(), "1");
        assert_eq!(restored.session_key(), Some(key.as_str()));
    }

    #[tokio::test]
    async fn test_session_cache_requires_key() {
        let cache = SessionCache::new(MemoryStore::new(8), 600);
        let result = cache.save(&Session::new("app-key")).await;
        assert!(matches!(result, Err(AuthError::StoreError(_))));
    }

    #[tokio::test]
    async fn test_session_cache_miss_and_expiry() {
        let cache = SessionCache::new(MemoryStore::new(8), 0);
        assert!(cache.load("missing").await.unwrap().is_none());

        let key = cache.save(&cached_session()).await.unwrap();
        assert!(cache.load(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_cache_corrupt_entry() {
        let store = MemoryStore::new(8);
        store.set("bad", "not json".to_owned(), 60).await.unwrap();
        let cache = SessionCache::with_config(store, &StoreConfig::default());
        assert!(matches!(cache.load("bad").await, Err(AuthError::StoreError(_))));
    }
}
