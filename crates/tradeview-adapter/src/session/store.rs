/*
[INPUT]:  Access/refresh tokens and their time-to-live
[OUTPUT]: Current credentials, conservative expiry and change generation
[POS]:    Session layer - token lifecycle state (no network, no retry)
[UPDATE]: When changing expiry margin or persisted fields
*/

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;

use crate::http::Result;

use super::storage::{
    ACCESS_TOKEN_KEY, EXPIRES_AT_KEY, FileStorage, MemoryStorage, REFRESH_TOKEN_KEY,
    SessionStorage,
};

/// Seconds subtracted from the server-reported lifetime
pub const SAFETY_MARGIN_SECONDS: i64 = 300;

/// Credentials of a logged-in user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Real expiry minus [`SAFETY_MARGIN_SECONDS`]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SessionState {
    session: Option<Session>,
    generation: u64,
}

/// Shared session token store.
///
/// Cloning is cheap and every clone observes the same session. Each mutation
/// bumps a generation counter so callers can tell whether the credential they
/// used is still the current one.
#[derive(Debug, Clone)]
pub struct SessionStore {
    state: Arc<RwLock<SessionState>>,
    storage: Arc<dyn SessionStorage>,
}

impl SessionStore {
    /// Create a store backed by `storage`, restoring any persisted session
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        let session = load_session(storage.as_ref());
        Self {
            state: Arc::new(RwLock::new(SessionState {
                session,
                generation: 0,
            })),
            storage,
        }
    }

    /// Create a store that forgets everything on restart
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Create a store persisted in `dir`
    pub fn open_file(dir: impl AsRef<Path>) -> Result<Self> {
        let storage = FileStorage::open(dir)?;
        Ok(Self::new(Arc::new(storage)))
    }

    /// Store a freshly issued token pair
    pub fn set_tokens(&self, access: &str, refresh: &str, ttl_seconds: u64) {
        self.replace(access, Some(refresh.to_string()), ttl_seconds);
    }

    /// Store a refreshed access token, keeping the current refresh token
    pub fn update_access(&self, access: &str, ttl_seconds: u64) {
        let refresh = self.get_refresh();
        self.replace(access, refresh, ttl_seconds);
    }

    /// Like [`update_access`](Self::update_access), but only while the session
    /// is still at `generation` and logged in. Returns whether it was applied.
    pub fn update_access_if(&self, generation: u64, access: &str, ttl_seconds: u64) -> bool {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if guard.generation != generation {
            return false;
        }
        let Some(current) = guard.session.as_ref() else {
            return false;
        };

        let session = Session {
            access_token: access.to_string(),
            refresh_token: current.refresh_token.clone(),
            expires_at: expiry_after(ttl_seconds),
        };
        self.persist(&session);
        guard.session = Some(session);
        guard.generation = guard.generation.wrapping_add(1);
        true
    }

    fn replace(&self, access: &str, refresh: Option<String>, ttl_seconds: u64) {
        let session = Session {
            access_token: access.to_string(),
            refresh_token: refresh,
            expires_at: expiry_after(ttl_seconds),
        };

        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&session);
        guard.session = Some(session);
        guard.generation = guard.generation.wrapping_add(1);
    }

    /// Forget the session in memory and in durable storage
    pub fn clear(&self) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        self.remove_persisted();
        guard.session = None;
        guard.generation = guard.generation.wrapping_add(1);
    }

    /// Clear only while the session is still at `generation`
    pub fn clear_if(&self, generation: u64) -> bool {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if guard.generation != generation {
            return false;
        }
        self.remove_persisted();
        guard.session = None;
        guard.generation = guard.generation.wrapping_add(1);
        true
    }

    fn remove_persisted(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, EXPIRES_AT_KEY] {
            if let Err(err) = self.storage.remove(key) {
                warn!(key, error = %err, "failed to remove persisted session field");
            }
        }
    }

    /// Current access token, if logged in
    pub fn get_access(&self) -> Option<String> {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        guard.session.as_ref().map(|s| s.access_token.clone())
    }

    /// Current refresh token, if any
    pub fn get_refresh(&self) -> Option<String> {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        guard.session.as_ref().and_then(|s| s.refresh_token.clone())
    }

    /// True once the conservative expiry has passed. False without a session.
    pub fn is_expiring_soon(&self) -> bool {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        match guard.session.as_ref() {
            Some(session) => Utc::now() >= session.expires_at,
            None => false,
        }
    }

    pub fn session(&self) -> Option<Session> {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        guard.session.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        guard.session.is_some()
    }

    /// Access token together with the generation it belongs to
    pub fn snapshot(&self) -> (Option<String>, u64) {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        (
            guard.session.as_ref().map(|s| s.access_token.clone()),
            guard.generation,
        )
    }

    pub fn generation(&self) -> u64 {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        guard.generation
    }

    fn persist(&self, session: &Session) {
        let expires_ms = session.expires_at.timestamp_millis().to_string();
        let mut writes = vec![
            (ACCESS_TOKEN_KEY, session.access_token.as_str()),
            (EXPIRES_AT_KEY, expires_ms.as_str()),
        ];
        if let Some(refresh) = session.refresh_token.as_deref() {
            writes.push((REFRESH_TOKEN_KEY, refresh));
        }

        for (key, value) in writes {
            if let Err(err) = self.storage.set(key, value) {
                warn!(key, error = %err, "failed to persist session field");
            }
        }
    }
}

/// Conservative expiry for a lifetime of `ttl_seconds`; saturates at the
/// latest representable instant.
fn expiry_after(ttl_seconds: u64) -> DateTime<Utc> {
    let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
    Duration::try_seconds(ttl.saturating_sub(SAFETY_MARGIN_SECONDS))
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn load_session(storage: &dyn SessionStorage) -> Option<Session> {
    let access_token = storage.get(ACCESS_TOKEN_KEY)?;
    let refresh_token = storage.get(REFRESH_TOKEN_KEY);

    // Unknown expiry is treated as already due so the first call refreshes.
    let expires_at = storage
        .get(EXPIRES_AT_KEY)
        .and_then(|raw| raw.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH);

    Some(Session {
        access_token,
        refresh_token,
        expires_at,
    })
}
