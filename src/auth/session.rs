// Session state: identity, auth flag, token and persisted artifacts

use parking_lot::RwLock;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;
use std::sync::Arc;

use super::slot::{DurableSlot, COOKIES_KEY, IDENTITY_KEY};
use super::token_store::TokenStore;
use super::types::{Identity, SessionState};

/// Process-wide session shared by the pipeline, the refresh coordinator and
/// the auth manager
pub struct Session {
    state: RwLock<SessionState>,
    tokens: TokenStore,
    slot: Arc<dyn DurableSlot>,
    cookies: Arc<Jar>,
    origin: Url,
}

impl Session {
    /// Open a session over a slot, restoring the token and session cookies
    ///
    /// The state starts signed out; `AuthManager::initialize` decides whether
    /// the persisted identity is still valid.
    pub fn open(slot: Arc<dyn DurableSlot>, cookies: Arc<Jar>, origin: Url) -> Self {
        let tokens = TokenStore::rehydrate(slot.clone());

        match slot.load(COOKIES_KEY) {
            Ok(Some(saved)) => {
                let mut restored = 0;
                for pair in saved.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                    cookies.add_cookie_str(pair, &origin);
                    restored += 1;
                }
                tracing::debug!(restored, "Restored session cookies");
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Could not read persisted session cookies"),
        }

        Self {
            state: RwLock::new(SessionState::SignedOut),
            tokens,
            slot,
            cookies,
            origin,
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn state(&self) -> SessionState {
        self.state.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().is_authenticated()
    }

    pub fn identity(&self) -> Option<Identity> {
        match &*self.state.read() {
            SessionState::SignedIn(identity) => Some(identity.clone()),
            SessionState::SignedOut => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.identity().map(|i| i.is_admin()).unwrap_or(false)
    }

    /// Identity left behind by a previous process, if any
    pub fn persisted_identity(&self) -> Option<Identity> {
        let raw = match self.slot.load(IDENTITY_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read persisted identity");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(identity) => Some(identity),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable persisted identity");
                None
            }
        }
    }

    /// Enter the signed-in state after a successful sign-in
    pub fn establish(&self, identity: Identity, token: impl Into<String>) {
        self.tokens.set(token);
        self.persist_identity(&identity);
        self.persist_cookies();
        *self.state.write() = SessionState::SignedIn(identity);
    }

    /// Enter the signed-in state after a successful startup refresh
    pub fn resume(&self, identity: Identity) {
        *self.state.write() = SessionState::SignedIn(identity);
    }

    /// Replace the identity of a signed-in session
    pub fn update_identity(&self, identity: Identity) {
        let mut state = self.state.write();
        if state.is_authenticated() {
            self.persist_identity(&identity);
            *state = SessionState::SignedIn(identity);
        }
    }

    /// Clear everything: state, token, persisted identity and cookies
    pub fn teardown(&self) {
        let was_signed_in = {
            let mut state = self.state.write();
            let was = state.is_authenticated();
            *state = SessionState::SignedOut;
            was
        };

        self.tokens.clear();
        for key in [IDENTITY_KEY, COOKIES_KEY] {
            if let Err(e) = self.slot.remove(key) {
                tracing::warn!(error = %e, key, "Failed to remove persisted session data");
            }
        }

        if was_signed_in {
            tracing::info!("Session cleared");
        }
    }

    /// Mirror the jar's cookies for the API origin into the slot
    pub fn persist_cookies(&self) {
        let Some(header) = self.cookies.cookies(&self.origin) else {
            return;
        };

        match header.to_str() {
            Ok(value) => {
                if let Err(e) = self.slot.store(COOKIES_KEY, value) {
                    tracing::warn!(error = %e, "Failed to persist session cookies");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Session cookies are not valid text"),
        }
    }

    fn persist_identity(&self, identity: &Identity) {
        let result = serde_json::to_string(identity)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.slot.store(IDENTITY_KEY, &json));
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to persist identity");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::slot::{MemorySlot, TOKEN_KEY};

    fn origin() -> Url {
        Url::parse("http://localhost:8080/api/").unwrap()
    }

    fn open(slot: Arc<MemorySlot>) -> Session {
        Session::open(slot, Arc::new(Jar::default()), origin())
    }

    #[test]
    fn test_establish_and_teardown() {
        let slot = Arc::new(MemorySlot::new());
        let session = open(slot.clone());
        assert!(!session.is_authenticated());

        session.establish(Identity::new("alice"), "tok1");
        assert!(session.is_authenticated());
        assert_eq!(session.tokens().get().as_deref(), Some("tok1"));
        assert_eq!(session.persisted_identity().unwrap().login, "alice");

        session.teardown();
        assert!(!session.is_authenticated());
        assert_eq!(session.tokens().get(), None);
        assert_eq!(session.persisted_identity(), None);
        assert_eq!(slot.load(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_open_starts_signed_out_with_rehydrated_token() {
        let slot = Arc::new(MemorySlot::new());
        open(slot.clone()).establish(Identity::new("alice"), "tok1");

        let reopened = open(slot);
        assert!(!reopened.is_authenticated());
        assert_eq!(reopened.tokens().get().as_deref(), Some("tok1"));
        assert!(reopened.persisted_identity().is_some());
    }

    #[test]
    fn test_cookies_survive_reopen() {
        let slot = Arc::new(MemorySlot::new());
        let jar = Arc::new(Jar::default());
        jar.add_cookie_str("REFRESH_TOKEN=abc; Path=/", &origin());

        let session = Session::open(slot.clone(), jar, origin());
        session.persist_cookies();
        assert_eq!(
            slot.load(COOKIES_KEY).unwrap().as_deref(),
            Some("REFRESH_TOKEN=abc")
        );

        let fresh_jar = Arc::new(Jar::default());
        let _reopened = Session::open(slot, fresh_jar.clone(), origin());
        let header = fresh_jar.cookies(&origin()).unwrap();
        assert_eq!(header.to_str().unwrap(), "REFRESH_TOKEN=abc");
    }

    #[test]
    fn test_update_identity_ignored_when_signed_out() {
        let session = open(Arc::new(MemorySlot::new()));
        session.update_identity(Identity::new("mallory"));
        assert_eq!(session.identity(), None);
        assert_eq!(session.persisted_identity(), None);
    }

    #[test]
    fn test_corrupt_identity_is_discarded() {
        let slot = Arc::new(MemorySlot::new());
        slot.store(IDENTITY_KEY, "not json").unwrap();
        assert_eq!(open(slot).persisted_identity(), None);
    }
}
