//! # Session Manager
//!
//! Owns the authentication state machine and is the sole writer of the token
//! store.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Session State Machine                               │
//! │                                                                         │
//! │                     login(id, password)                                 │
//! │  ┌─────────────────┐ ──────────────────▶ ┌────────────────┐            │
//! │  │ Unauthenticated │                     │ Authenticating │            │
//! │  └─────────────────┘ ◀────────────────── └───────┬────────┘            │
//! │        ▲    ▲              failure               │ success             │
//! │        │    │           (nothing persisted)      │ (token+user         │
//! │        │    │                                    ▼  persisted)         │
//! │        │    │  logout                    ┌────────────────┐            │
//! │        │    └─────────────────────────── │ Authenticated  │ ◀──┐       │
//! │        │       (store cleared, even if   └───────┬────────┘    │       │
//! │        │        the remote call fails)           │             │       │
//! │        │                                         │ verify      │       │
//! │        │                                         │ rejected    │       │
//! │        │                                         ▼             │       │
//! │        │                                 ┌────────────────┐    │       │
//! │        │                                 │   Refreshing   │ ───┘       │
//! │        │                                 └───────┬────────┘  refresh   │
//! │        │                                         │           succeeds  │
//! │        │            store cleared                │ refresh             │
//! │        │  ┌────────────────┐                     │ rejected            │
//! │        └─ │    Expired     │ ◀───────────────────┘                     │
//! │           └────────────────┘                                           │
//! │                                                                         │
//! │  restoreOnStartup: both keys present ⇒ Authenticated immediately       │
//! │  (trust-on-presence; a best-effort profile fetch follows and NEVER     │
//! │  demotes). Empty or corrupt store ⇒ Unauthenticated.                   │
//! │                                                                         │
//! │  Bare network errors never leave this diagram: only an explicit        │
//! │  refresh rejection after a failed verification reaches Expired.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use atrium_core::{validation, Session, SessionState, User};
use atrium_store::SessionStore;

use crate::api::PortalApi;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Session Manager
// =============================================================================

struct SessionSlot {
    state: SessionState,
    session: Option<Session>,
}

/// The authentication state machine.
///
/// Cheap to clone; clones share the same state, store, and busy flag. One
/// instance is constructed by the agent and injected everywhere a session
/// gate is needed (no global singleton).
#[derive(Clone)]
pub struct SessionManager {
    api: Arc<dyn PortalApi>,
    store: SessionStore,
    slot: Arc<RwLock<SessionSlot>>,
    state_tx: watch::Sender<SessionState>,
    /// Mutual exclusion for login/restore/logout. Held across the whole
    /// operation; `login`/`restore_on_startup` reject contention with
    /// `AlreadyInProgress`, `logout` waits (it must never fail).
    busy: Arc<Mutex<()>>,
}

impl SessionManager {
    /// Creates a session manager over the given backend and store.
    pub fn new(api: Arc<dyn PortalApi>, store: SessionStore) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Unauthenticated);
        SessionManager {
            api,
            store,
            slot: Arc::new(RwLock::new(SessionSlot {
                state: SessionState::Unauthenticated,
                session: None,
            })),
            state_tx,
            busy: Arc::new(Mutex::new(())),
        }
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Current state.
    pub async fn state(&self) -> SessionState {
        self.slot.read().await.state
    }

    /// Derived flag the rest of the engine gates on.
    pub async fn is_authenticated(&self) -> bool {
        self.state().await.is_authenticated()
    }

    /// Snapshot of the current session, if authenticated.
    pub async fn current_session(&self) -> Option<Session> {
        let slot = self.slot.read().await;
        if slot.state.is_authenticated() {
            slot.session.clone()
        } else {
            None
        }
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Exchanges credentials for a session.
    ///
    /// ## Errors
    /// - `Validation` before any network call on malformed input
    /// - `AlreadyInProgress` if another login/restore is in flight
    /// - `InvalidCredentials` on HTTP 401
    /// - `ServerUnavailable` / `Network` on transport trouble
    ///
    /// On success the session is persisted atomically (token and user
    /// both-or-neither) and the state becomes `Authenticated`. On failure
    /// nothing is persisted and the state returns to `Unauthenticated`.
    pub async fn login(&self, identifier: &str, password: &str) -> SyncResult<Session> {
        let identifier = validation::validate_identifier(identifier)
            .map_err(SyncError::Validation)?
            .to_string();
        validation::validate_password(password).map_err(SyncError::Validation)?;

        let _busy = self
            .busy
            .try_lock()
            .map_err(|_| SyncError::AlreadyInProgress)?;

        self.replace(SessionState::Authenticating, None).await;
        info!(identifier = %identifier, "Logging in");

        match self.api.login(&identifier, password).await {
            Ok(session) => {
                if let Err(e) = self.store.save(&session).await {
                    // A server-granted session outranks a storage hiccup; the
                    // user just won't survive a restart until the next save.
                    warn!(error = %e, "Failed to persist session; continuing in memory");
                }
                self.replace(SessionState::Authenticated, Some(session.clone()))
                    .await;
                info!(user_id = %session.user.id, "Login succeeded");
                Ok(session)
            }
            Err(e) => {
                self.replace(SessionState::Unauthenticated, None).await;
                warn!(error = %e, "Login failed");
                Err(e)
            }
        }
    }

    /// Restores a persisted session at startup.
    ///
    /// Trust-on-presence: if both token and user are present, the session is
    /// reported `Authenticated` immediately, with no verification
    /// round-trip. A best-effort background profile fetch follows; it may
    /// update the cached user but never demotes the session. An empty,
    /// partial, or corrupt store restores to `Unauthenticated`.
    pub async fn restore_on_startup(&self) -> SyncResult<Option<Session>> {
        let _busy = self
            .busy
            .try_lock()
            .map_err(|_| SyncError::AlreadyInProgress)?;

        let persisted = match self.store.load().await {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!(error = %e, "Token store unreadable; starting unauthenticated");
                None
            }
        };

        let Some(session) = persisted else {
            self.replace(SessionState::Unauthenticated, None).await;
            debug!("No persisted session");
            return Ok(None);
        };

        self.replace(SessionState::Authenticated, Some(session.clone()))
            .await;
        info!(user_id = %session.user.id, "Session restored from store");

        // Best-effort profile freshen; failures keep the cached user.
        let manager = self.clone();
        tokio::spawn(async move {
            manager.refresh_user().await;
        });

        Ok(Some(session))
    }

    /// Logs out.
    ///
    /// Attempts a best-effort remote invalidation, then clears the token
    /// store and the in-memory session unconditionally. Never fails from
    /// the caller's perspective; waits for an in-flight login to settle
    /// rather than racing it.
    pub async fn logout(&self) {
        let _busy = self.busy.lock().await;

        let token = {
            let slot = self.slot.read().await;
            slot.session.as_ref().map(|s| s.token.clone())
        };

        if let Some(token) = token {
            if let Err(e) = self.api.logout(&token).await {
                warn!(error = %e, "Remote logout failed; clearing local session anyway");
            }
        }

        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Failed to clear token store");
        }

        self.replace(SessionState::Unauthenticated, None).await;
        info!("Logged out");
    }

    /// Fetches the current profile, if authenticated.
    ///
    /// On success the cached user is updated (and re-persisted alongside the
    /// unchanged token). On failure the cached user is left untouched and
    /// `None` is returned; a profile fetch failure never forces a logout.
    pub async fn refresh_user(&self) -> Option<User> {
        let session = self.current_session().await?;

        match self.api.me(&session.token).await {
            Ok(user) => {
                self.update_cached_user(user.clone()).await;
                debug!(user_id = %user.id, "Profile refreshed");
                Some(user)
            }
            Err(e) => {
                debug!(error = %e, "Profile refresh failed; keeping cached user");
                None
            }
        }
    }

    /// Performs one verification round-trip for the held token.
    ///
    /// On an explicit rejection, attempts exactly one refresh (a profile
    /// re-fetch proving the token still works). Only an explicit rejection
    /// of that refresh destroys the session (`Expired`, store cleared,
    /// then `Unauthenticated`). Transport failures never demote:
    /// verification-endpoint flakiness must not log anyone out.
    pub async fn check_token_validity(&self) -> bool {
        let Some(session) = self.current_session().await else {
            return false;
        };

        match self.api.verify(&session.token).await {
            Ok(()) => true,
            Err(e) if !e.is_auth_rejection() => {
                debug!(error = %e, "Verification unreachable; presuming token valid");
                true
            }
            Err(e) => {
                warn!(error = %e, "Token verification rejected; attempting refresh");
                self.set_state(SessionState::Refreshing).await;

                match self.api.me(&session.token).await {
                    Ok(user) => {
                        self.update_cached_user(user).await;
                        self.set_state(SessionState::Authenticated).await;
                        debug!("Refresh succeeded; token still valid");
                        true
                    }
                    Err(e) if !e.is_auth_rejection() => {
                        debug!(error = %e, "Refresh unreachable; keeping session");
                        self.set_state(SessionState::Authenticated).await;
                        false
                    }
                    Err(e) => {
                        warn!(error = %e, "Refresh rejected; session expired");
                        self.expire().await;
                        false
                    }
                }
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Replaces both state and session, then publishes the state.
    async fn replace(&self, state: SessionState, session: Option<Session>) {
        {
            let mut slot = self.slot.write().await;
            slot.state = state;
            slot.session = session;
        }
        self.state_tx.send_replace(state);
    }

    /// Changes state only, keeping the held session.
    async fn set_state(&self, state: SessionState) {
        {
            let mut slot = self.slot.write().await;
            slot.state = state;
        }
        self.state_tx.send_replace(state);
    }

    /// Updates the cached user in place and re-persists the session.
    async fn update_cached_user(&self, user: User) {
        let snapshot = {
            let mut slot = self.slot.write().await;
            match slot.session.as_mut() {
                Some(session) => {
                    session.user = user;
                    Some(session.clone())
                }
                None => None,
            }
        };

        if let Some(session) = snapshot {
            if let Err(e) = self.store.save(&session).await {
                warn!(error = %e, "Failed to persist refreshed user");
            }
        }
    }

    /// Terminal credential rejection: surface `Expired`, clear everything.
    async fn expire(&self) {
        self.set_state(SessionState::Expired).await;
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Failed to clear token store for expired session");
        }
        self.replace(SessionState::Unauthenticated, None).await;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
