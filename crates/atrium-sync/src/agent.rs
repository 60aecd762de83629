//! # Portal Agent
//!
//! Top-level orchestrator wiring the session manager, unread counter, push
//! bridge, and foreground trigger together.
//!
//! ## Agent Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      PortalAgent Architecture                           │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                        PortalAgent                               │  │
//! │  │                                                                  │  │
//! │  │  • Explicitly constructed and injected (no global singleton)     │  │
//! │  │  • start(): restores the session, spawns watcher tasks           │  │
//! │  │  • Forwards state/count changes to the PortalEventEmitter        │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ SessionManager │  │ UnreadCounter  │  │ PushBridge             │    │
//! │  │                │  │                │  │                        │    │
//! │  │ restore on     │  │ refreshed on   │  │ registered on          │    │
//! │  │ start          │  │ Authenticated  │  │ Authenticated          │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  EVENTS (to the UI shell via PortalEventEmitter):                      │
//! │  • session_changed(state)                                              │
//! │  • unread_changed(count)                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use atrium_core::{Session, SessionState};
use atrium_store::{Storage, StorageConfig};

use crate::api::{HttpPortalApi, PortalApi};
use crate::config::PortalConfig;
use crate::error::{SyncError, SyncResult};
use crate::foreground::{self, ForegroundHandle};
use crate::push::{DisabledPushPlatform, PushBridge, PushPlatform};
use crate::session::SessionManager;
use crate::unread::UnreadCounter;

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Sink for engine events, implemented by the UI shell.
pub trait PortalEventEmitter: Send + Sync {
    /// The session state changed.
    fn session_changed(&self, state: SessionState);

    /// The unread count changed.
    fn unread_changed(&self, count: u32);
}

/// No-op event emitter for headless use and testing.
pub struct NoOpEmitter;

impl PortalEventEmitter for NoOpEmitter {
    fn session_changed(&self, _state: SessionState) {}
    fn unread_changed(&self, _count: u32) {}
}

// =============================================================================
// Portal Agent
// =============================================================================

/// The assembled sync engine.
pub struct PortalAgent {
    config: PortalConfig,
    api: Arc<dyn PortalApi>,
    session: SessionManager,
    unread: Arc<UnreadCounter>,
    push: Arc<PushBridge>,
    emitter: Arc<dyn PortalEventEmitter>,
    foreground: Option<ForegroundHandle>,
    shutdown_tx: Option<watch::Sender<bool>>,
}

impl PortalAgent {
    /// Starts a builder with the given configuration.
    pub fn builder(config: PortalConfig) -> PortalAgentBuilder {
        PortalAgentBuilder::new(config)
    }

    /// Starts the agent.
    ///
    /// Spawns the watcher tasks, then restores any persisted session
    /// (trust-on-presence). A restored or later-established session
    /// triggers the initial unread refresh and push registration through
    /// the session watcher.
    ///
    /// Returns the restored session, if one was present.
    pub async fn start(&mut self) -> SyncResult<Option<Session>> {
        info!(device_id = %self.config.device.id, "Starting portal agent");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown_tx = Some(shutdown_tx);

        // Session watcher: forwards state changes and reacts to every
        // transition INTO Authenticated with the initial unread sync and
        // push registration. Subscribing before restore guarantees the
        // restore transition is observed.
        let mut state_rx = self.session.subscribe();
        {
            let emitter = self.emitter.clone();
            let unread = self.unread.clone();
            let push = self.push.clone();
            let mut shutdown_rx = shutdown_rx.clone();
            tokio::spawn(async move {
                let mut last = SessionState::Unauthenticated;
                loop {
                    tokio::select! {
                        changed = state_rx.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            let state = *state_rx.borrow_and_update();
                            if state == last {
                                continue;
                            }
                            emitter.session_changed(state);
                            if state.is_authenticated() && !last.is_authenticated() {
                                unread.refresh().await;
                                push.register().await;
                            }
                            last = state;
                        }
                        _ = shutdown_rx.changed() => break,
                    }
                }
                debug!("Session watcher stopped");
            });
        }

        // Unread watcher: forwards count changes to the shell.
        {
            let mut count_rx = self.unread.subscribe();
            let emitter = self.emitter.clone();
            let mut shutdown_rx = shutdown_rx.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        changed = count_rx.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            emitter.unread_changed(*count_rx.borrow_and_update());
                        }
                        _ = shutdown_rx.changed() => break,
                    }
                }
                debug!("Unread watcher stopped");
            });
        }

        // Foreground watcher: background → active resyncs.
        let (handle, _task) = foreground::spawn(self.session.clone(), self.unread.clone());
        self.foreground = Some(handle);

        self.session.restore_on_startup().await
    }

    /// Stops the watcher tasks.
    ///
    /// The foreground watcher additionally ends once every cloned
    /// [`ForegroundHandle`] is dropped. Durable state needs no teardown.
    pub fn shutdown(&mut self) {
        info!("Shutting down portal agent");
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        self.foreground = None;
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Locally marks a notification read and fires the paired server
    /// acknowledgment.
    ///
    /// The count drops immediately (floored at 0); a failed server call is
    /// logged and left for the next full sync to reconcile.
    pub fn mark_notification_read(&self, notification_id: &str) {
        self.unread.mark_as_read(notification_id);

        let api = self.api.clone();
        let session = self.session.clone();
        let id = notification_id.to_string();
        tokio::spawn(async move {
            let Some(session) = session.current_session().await else {
                return;
            };
            if let Err(e) = api.mark_read(&session.token, &id).await {
                warn!(error = %e, notification_id = %id, "Server mark-read failed; next sync reconciles");
            }
        });
    }

    /// Explicit pull-to-refresh from any notification-bearing screen.
    pub async fn refresh_notifications(&self) {
        self.unread.refresh().await;
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The session manager.
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// The unread counter.
    pub fn unread(&self) -> &Arc<UnreadCounter> {
        &self.unread
    }

    /// The push bridge.
    pub fn push(&self) -> &Arc<PushBridge> {
        &self.push
    }

    /// Handle for reporting lifecycle transitions (available after start).
    pub fn foreground(&self) -> Option<&ForegroundHandle> {
        self.foreground.as_ref()
    }

    /// The active configuration.
    pub fn config(&self) -> &PortalConfig {
        &self.config
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`PortalAgent`].
///
/// Backend, storage, push platform, and emitter are all injectable; the
/// defaults are the production HTTP client, the platform data directory
/// store, disabled push, and a no-op emitter.
pub struct PortalAgentBuilder {
    config: PortalConfig,
    api: Option<Arc<dyn PortalApi>>,
    storage: Option<Storage>,
    platform: Option<Arc<dyn PushPlatform>>,
    emitter: Option<Arc<dyn PortalEventEmitter>>,
}

impl PortalAgentBuilder {
    /// Creates a new builder with the given config.
    pub fn new(config: PortalConfig) -> Self {
        PortalAgentBuilder {
            config,
            api: None,
            storage: None,
            platform: None,
            emitter: None,
        }
    }

    /// Injects a backend client (tests use a programmable fake).
    pub fn with_api(mut self, api: Arc<dyn PortalApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Injects a storage handle (tests use in-memory SQLite).
    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Injects the OS push platform implementation.
    pub fn with_platform(mut self, platform: Arc<dyn PushPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Injects the shell's event sink.
    pub fn with_emitter(mut self, emitter: Arc<dyn PortalEventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Builds the agent.
    pub async fn build(self) -> SyncResult<PortalAgent> {
        self.config.validate()?;

        let api: Arc<dyn PortalApi> = match self.api {
            Some(api) => api,
            None => Arc::new(HttpPortalApi::new(&self.config.api)?),
        };

        let storage = match self.storage {
            Some(storage) => storage,
            None => {
                let path = PortalConfig::default_storage_path().ok_or_else(|| {
                    SyncError::InvalidConfig(
                        "could not resolve a data directory for the token store".into(),
                    )
                })?;
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| SyncError::Storage(e.to_string()))?;
                }
                Storage::new(StorageConfig::new(path)).await?
            }
        };

        let platform = self
            .platform
            .unwrap_or_else(|| Arc::new(DisabledPushPlatform));
        let emitter = self.emitter.unwrap_or_else(|| Arc::new(NoOpEmitter));

        let session = SessionManager::new(api.clone(), storage.sessions());
        let unread = Arc::new(UnreadCounter::new(
            api.clone(),
            session.clone(),
            self.config.api.page_size,
        ));
        let push = Arc::new(PushBridge::new(
            api.clone(),
            session.clone(),
            unread.clone(),
            platform,
            self.config.tap_refresh_delay(),
        ));

        Ok(PortalAgent {
            config: self.config,
            api,
            session,
            unread,
            push,
            emitter,
            foreground: None,
            shutdown_tx: None,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{page, session, MockApi, MockPushPlatform};
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    struct RecordingEmitter {
        states: Mutex<Vec<SessionState>>,
        counts: Mutex<Vec<u32>>,
    }

    impl RecordingEmitter {
        fn new() -> Arc<Self> {
            Arc::new(RecordingEmitter {
                states: Mutex::new(Vec::new()),
                counts: Mutex::new(Vec::new()),
            })
        }
    }

    impl PortalEventEmitter for RecordingEmitter {
        fn session_changed(&self, state: SessionState) {
            self.states.lock().unwrap().push(state);
        }

        fn unread_changed(&self, count: u32) {
            self.counts.lock().unwrap().push(count);
        }
    }

    async fn memory_storage() -> Storage {
        Storage::new(StorageConfig::in_memory()).await.unwrap()
    }

    async fn built_agent(
        api: Arc<MockApi>,
        storage: Storage,
        emitter: Arc<RecordingEmitter>,
    ) -> PortalAgent {
        PortalAgent::builder(PortalConfig::default())
            .with_api(api)
            .with_storage(storage)
            .with_platform(MockPushPlatform::granting("device-token-1"))
            .with_emitter(emitter)
            .build()
            .await
            .unwrap()
    }

    /// Yields until `condition` holds (single-threaded test runtime).
    async fn settle(api: &MockApi, condition: impl Fn(&MockApi) -> bool) {
        for _ in 0..10_000 {
            if condition(api) {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("agent never settled");
    }

    #[tokio::test]
    async fn test_login_triggers_initial_sync_and_push_registration() {
        let api = MockApi::new();
        api.set_login(Ok(session("abc", "u1")));
        api.set_notifications(Ok(page(3, 1)));
        let emitter = RecordingEmitter::new();
        let mut agent = built_agent(api.clone(), memory_storage().await, emitter.clone()).await;

        assert!(agent.start().await.unwrap().is_none());
        agent.session().login("ANG123", "Gooseman12!").await.unwrap();

        settle(&api, |api| {
            api.notifications_calls.load(Ordering::SeqCst) == 1
                && api.register_push_calls.load(Ordering::SeqCst) == 1
        })
        .await;
        assert_eq!(agent.unread().count(), 3);

        let states = emitter.states.lock().unwrap().clone();
        assert!(states.contains(&SessionState::Authenticating));
        assert!(states.contains(&SessionState::Authenticated));
        assert!(emitter.counts.lock().unwrap().contains(&3));
    }

    #[tokio::test]
    async fn test_start_restores_persisted_session_and_syncs() {
        let api = MockApi::new();
        api.set_notifications(Ok(page(2, 0)));
        api.set_me(Ok(crate::testing::student("u1")));
        let storage = memory_storage().await;
        storage.sessions().save(&session("abc", "u1")).await.unwrap();

        let emitter = RecordingEmitter::new();
        let mut agent = built_agent(api.clone(), storage, emitter.clone()).await;

        let restored = agent.start().await.unwrap().expect("restored session");
        assert_eq!(restored.user.id, "u1");

        settle(&api, |api| {
            api.notifications_calls.load(Ordering::SeqCst) >= 1
        })
        .await;
        assert_eq!(agent.unread().count(), 2);
    }

    #[tokio::test]
    async fn test_mark_notification_read_is_optimistic_and_acknowledged() {
        let api = MockApi::new();
        api.set_login(Ok(session("abc", "u1")));
        api.set_notifications(Ok(page(3, 0)));
        let emitter = RecordingEmitter::new();
        let mut agent = built_agent(api.clone(), memory_storage().await, emitter.clone()).await;

        agent.start().await.unwrap();
        agent.session().login("ANG123", "Gooseman12!").await.unwrap();
        settle(&api, |api| {
            api.notifications_calls.load(Ordering::SeqCst) == 1
        })
        .await;
        assert_eq!(agent.unread().count(), 3);

        agent.mark_notification_read("n1");
        assert_eq!(agent.unread().count(), 2);

        settle(&api, |api| api.mark_read_calls.load(Ordering::SeqCst) == 1).await;
    }

    #[tokio::test]
    async fn test_pull_to_refresh_reaches_backend() {
        let api = MockApi::new();
        api.set_login(Ok(session("abc", "u1")));
        api.set_notifications(Ok(page(1, 0)));
        let emitter = RecordingEmitter::new();
        let mut agent = built_agent(api.clone(), memory_storage().await, emitter.clone()).await;

        agent.start().await.unwrap();
        agent.session().login("ANG123", "Gooseman12!").await.unwrap();
        settle(&api, |api| {
            api.notifications_calls.load(Ordering::SeqCst) == 1
        })
        .await;

        agent.refresh_notifications().await;
        assert_eq!(api.notifications_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let api = MockApi::new();
        let emitter = RecordingEmitter::new();
        let mut agent = built_agent(api.clone(), memory_storage().await, emitter).await;

        agent.start().await.unwrap();
        assert!(agent.foreground().is_some());

        agent.shutdown();
        assert!(agent.foreground().is_none());
        agent.shutdown();
    }
}
