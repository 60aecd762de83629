//! # Push Registration & Delivery Bridge
//!
//! Registers the device for push delivery and forwards platform push events
//! into the engine.
//!
//! ## Event Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Push Bridge Flow                                  │
//! │                                                                         │
//! │  REGISTRATION (after a session becomes Authenticated):                 │
//! │                                                                         │
//! │   register() ──▶ platform permission? ──denied──▶ None                 │
//! │                        │                   (silent fallback to         │
//! │                        │ granted             foreground polling)       │
//! │                        ▼                                               │
//! │                  platform device token                                 │
//! │                        │                                               │
//! │                        ▼                                               │
//! │                  POST /push/register {studentId, token}                │
//! │                        │                                               │
//! │                 failure is logged and swallowed: registration must     │
//! │                 never block startup or authentication                  │
//! │                                                                         │
//! │  DELIVERY (app foregrounded):                                          │
//! │   shell ──▶ notification_received(event)                               │
//! │                ├──▶ counter.observe_delivery()    (+1 immediately)     │
//! │                └──▶ subscribers (at-least-once, unordered)             │
//! │                                                                         │
//! │  TAP (app opened via a notification):                                  │
//! │   shell ──▶ notification_tapped(event)                                 │
//! │                ├──▶ subscribers (notification_id for deep links)       │
//! │                └──▶ delayed (~1s) counter.refresh() so server state    │
//! │                     supersedes the optimistic adjustment               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::api::PortalApi;
use crate::error::SyncResult;
use crate::session::SessionManager;
use crate::unread::UnreadCounter;

// =============================================================================
// Platform Abstraction
// =============================================================================

/// OS push facilities, implemented by the mobile shell.
///
/// The engine never talks to APNs/FCM directly; it asks the platform for
/// permission and a delivery token and hands the token to the backend.
#[async_trait]
pub trait PushPlatform: Send + Sync {
    /// Requests push permission from the user (or returns the cached
    /// decision).
    async fn request_permission(&self) -> bool;

    /// Obtains the platform device token. Only called after permission was
    /// granted.
    async fn device_token(&self) -> SyncResult<String>;
}

/// Platform stub with push permanently unavailable.
///
/// Used headless and in tests; the engine falls back to foreground polling.
pub struct DisabledPushPlatform;

#[async_trait]
impl PushPlatform for DisabledPushPlatform {
    async fn request_permission(&self) -> bool {
        false
    }

    async fn device_token(&self) -> SyncResult<String> {
        Err(crate::error::SyncError::Internal(
            "push is disabled on this platform".into(),
        ))
    }
}

// =============================================================================
// Events & Subscriptions
// =============================================================================

/// A push payload as the shell forwards it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEvent {
    /// Backend notification id, when the payload carries one. Tap handlers
    /// use it for deep-link navigation.
    pub notification_id: Option<String>,

    /// Banner title.
    pub title: Option<String>,

    /// Banner body.
    pub body: Option<String>,
}

/// Token returned by `subscribe_*`; pass to [`PushBridge::unsubscribe`].
pub type SubscriptionId = u64;

type EventHandler = Box<dyn Fn(&PushEvent) + Send + Sync>;

// =============================================================================
// Push Bridge
// =============================================================================

/// Bridges platform push events into the sync engine.
pub struct PushBridge {
    api: Arc<dyn PortalApi>,
    session: SessionManager,
    counter: Arc<UnreadCounter>,
    platform: Arc<dyn PushPlatform>,
    received: RwLock<HashMap<SubscriptionId, EventHandler>>,
    tapped: RwLock<HashMap<SubscriptionId, EventHandler>>,
    next_subscription: AtomicU64,
    tap_refresh_delay: Duration,
}

impl PushBridge {
    /// Creates a bridge over the given platform.
    pub fn new(
        api: Arc<dyn PortalApi>,
        session: SessionManager,
        counter: Arc<UnreadCounter>,
        platform: Arc<dyn PushPlatform>,
        tap_refresh_delay: Duration,
    ) -> Self {
        PushBridge {
            api,
            session,
            counter,
            platform,
            received: RwLock::new(HashMap::new()),
            tapped: RwLock::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
            tap_refresh_delay,
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers this device for push delivery, bound to the current user.
    ///
    /// Returns the platform device token, or `None` when there is no
    /// session or the user denied permission — in which case the system
    /// silently relies on foreground polling alone. A backend registration
    /// failure is logged and swallowed (re-registration is idempotent and
    /// will be retried on the next authenticated start); it never blocks
    /// startup or authentication.
    pub async fn register(&self) -> Option<String> {
        let session = self.session.current_session().await?;

        if !self.platform.request_permission().await {
            info!("Push permission denied; relying on foreground polling");
            return None;
        }

        let device_token = match self.platform.device_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Could not obtain device token; relying on foreground polling");
                return None;
            }
        };

        match self
            .api
            .register_push(&session.token, &session.user.id, &device_token)
            .await
        {
            Ok(()) => {
                info!(user_id = %session.user.id, "Push registration complete");
            }
            Err(e) => {
                warn!(error = %e, "Push registration failed; will retry on next start");
            }
        }

        Some(device_token)
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Subscribes to foreground push deliveries.
    ///
    /// Delivery is at-least-once per event; no ordering is guaranteed
    /// between concurrent subscribers.
    pub fn subscribe_received(
        &self,
        handler: impl Fn(&PushEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.insert(&self.received, Box::new(handler))
    }

    /// Subscribes to notification taps (app opened via a notification).
    pub fn subscribe_tapped(
        &self,
        handler: impl Fn(&PushEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.insert(&self.tapped, Box::new(handler))
    }

    /// Removes a subscription. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if let Ok(mut handlers) = self.received.write() {
            handlers.remove(&id);
        }
        if let Ok(mut handlers) = self.tapped.write() {
            handlers.remove(&id);
        }
    }

    fn insert(
        &self,
        registry: &RwLock<HashMap<SubscriptionId, EventHandler>>,
        handler: EventHandler,
    ) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut handlers) = registry.write() {
            handlers.insert(id, handler);
        }
        id
    }

    // =========================================================================
    // Event Entry Points (called by the shell)
    // =========================================================================

    /// A push arrived while the app is foregrounded.
    ///
    /// The count bumps immediately; the next full sync is authoritative.
    pub fn notification_received(&self, event: PushEvent) {
        debug!(notification_id = ?event.notification_id, "Foreground push received");
        self.counter.observe_delivery();
        Self::dispatch(&self.received, &event);
    }

    /// The user opened the app by tapping a notification.
    ///
    /// Subscribers get the event (with its notification id for deep-link
    /// navigation), and a delayed full refresh is scheduled so the eventual
    /// server state supersedes any optimistic adjustment.
    pub fn notification_tapped(&self, event: PushEvent) {
        debug!(notification_id = ?event.notification_id, "Notification tapped");
        Self::dispatch(&self.tapped, &event);

        let counter = self.counter.clone();
        let delay = self.tap_refresh_delay;
        tokio::spawn(async move {
            sleep(delay).await;
            counter.refresh().await;
        });
    }

    fn dispatch(registry: &RwLock<HashMap<SubscriptionId, EventHandler>>, event: &PushEvent) {
        if let Ok(handlers) = registry.read() {
            for handler in handlers.values() {
                handler(event);
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::session::SessionManager;
    use crate::testing::{memory_store, page, session, MockApi, MockPushPlatform};
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    async fn bridge_with(
        api: Arc<MockApi>,
        platform: Arc<MockPushPlatform>,
        logged_in: bool,
    ) -> (PushBridge, Arc<UnreadCounter>) {
        api.set_login(Ok(session("abc", "u1")));
        let manager = SessionManager::new(api.clone(), memory_store().await);
        if logged_in {
            manager.login("ANG123", "Gooseman12!").await.unwrap();
        }
        let counter = Arc::new(UnreadCounter::new(api.clone(), manager.clone(), 50));
        let bridge = PushBridge::new(
            api,
            manager,
            counter.clone(),
            platform,
            Duration::from_millis(1_000),
        );
        (bridge, counter)
    }

    #[tokio::test]
    async fn test_register_permission_denied_returns_none() {
        let api = MockApi::new();
        let platform = MockPushPlatform::denying();
        let (bridge, _counter) = bridge_with(api.clone(), platform.clone(), true).await;

        assert!(bridge.register().await.is_none());
        assert_eq!(platform.permission_requests.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(api.register_push_calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_register_granted_binds_token() {
        let api = MockApi::new();
        let platform = MockPushPlatform::granting("device-token-1");
        let (bridge, _counter) = bridge_with(api.clone(), platform, true).await;

        assert_eq!(bridge.register().await.as_deref(), Some("device-token-1"));
        assert_eq!(api.register_push_calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_register_backend_failure_swallowed() {
        let api = MockApi::new();
        api.set_register_push(Err(SyncError::ServerUnavailable {
            status: 500,
            message: "boom".into(),
        }));
        let platform = MockPushPlatform::granting("device-token-1");
        let (bridge, _counter) = bridge_with(api.clone(), platform, true).await;

        // The platform token exists; the failed association is retried later.
        assert_eq!(bridge.register().await.as_deref(), Some("device-token-1"));
    }

    #[tokio::test]
    async fn test_register_without_session_is_none() {
        let api = MockApi::new();
        let platform = MockPushPlatform::granting("device-token-1");
        let (bridge, _counter) = bridge_with(api.clone(), platform.clone(), false).await;

        assert!(bridge.register().await.is_none());
        assert_eq!(platform.permission_requests.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_received_bumps_count_and_notifies_subscribers() {
        let api = MockApi::new();
        let (bridge, counter) = bridge_with(api, MockPushPlatform::denying(), true).await;

        let seen = Arc::new(AtomicUsize::new(0));
        let subscription = {
            let seen = seen.clone();
            bridge.subscribe_received(move |event| {
                assert_eq!(event.notification_id.as_deref(), Some("n9"));
                seen.fetch_add(1, AtomicOrdering::SeqCst);
            })
        };

        bridge.notification_received(PushEvent {
            notification_id: Some("n9".into()),
            title: Some("Grades posted".into()),
            body: None,
        });

        assert_eq!(counter.count(), 1);
        assert_eq!(seen.load(AtomicOrdering::SeqCst), 1);

        bridge.unsubscribe(subscription);
        bridge.notification_received(PushEvent {
            notification_id: Some("n9".into()),
            ..Default::default()
        });
        assert_eq!(counter.count(), 2);
        assert_eq!(seen.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tap_schedules_delayed_refresh() {
        let api = MockApi::new();
        let (bridge, counter) = bridge_with(api.clone(), MockPushPlatform::denying(), true).await;
        // The SQLite pool connection is established on a background worker
        // thread during the setup above; pause the test clock only afterwards
        // so the auto-advancing mock clock can't fire the pool's acquire
        // timeout before that thread delivers the connection.
        tokio::time::pause();
        api.set_notifications(Ok(page(4, 0)));

        let tapped_id = Arc::new(std::sync::Mutex::new(None::<String>));
        {
            let tapped_id = tapped_id.clone();
            bridge.subscribe_tapped(move |event| {
                *tapped_id.lock().unwrap() = event.notification_id.clone();
            });
        }

        bridge.notification_tapped(PushEvent {
            notification_id: Some("n3".into()),
            ..Default::default()
        });

        // The id surfaced immediately for deep-link navigation.
        assert_eq!(tapped_id.lock().unwrap().as_deref(), Some("n3"));

        // The refresh has not fired yet...
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(api.notifications_calls.load(AtomicOrdering::SeqCst), 0);

        // ...but does after the configured delay.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(api.notifications_calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(counter.count(), 4);
    }
}
