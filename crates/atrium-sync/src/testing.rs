//! Programmable fakes for exercising the engine without a backend.
//!
//! `MockApi` answers every [`PortalApi`] call from preset responses, counts
//! invocations, and can gate individual calls on [`Notify`] pairs so tests
//! control completion order deterministically (the overlapping-refresh and
//! busy-flag tests depend on this).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use atrium_core::{Notification, Session, User, UserType};

use crate::api::{NotificationPage, PortalApi};
use crate::error::{SyncError, SyncResult};
use crate::push::PushPlatform;

// =============================================================================
// Fixtures
// =============================================================================

pub(crate) fn student(id: &str) -> User {
    User {
        id: id.to_string(),
        first_name: "A".to_string(),
        last_name: "Ng".to_string(),
        user_type: UserType::Student,
        email: None,
        student_number: Some("ANG123".to_string()),
    }
}

pub(crate) fn session(token: &str, user_id: &str) -> Session {
    Session {
        token: token.to_string(),
        user: student(user_id),
    }
}

/// Builds a page with `unread` unread and `read` read entries.
pub(crate) fn page(unread: usize, read: usize) -> NotificationPage {
    let mut notifications = Vec::new();
    for i in 0..unread {
        notifications.push(Notification {
            id: format!("u{i}"),
            title: "unread".to_string(),
            message: None,
            is_read: false,
            created_at: None,
        });
    }
    for i in 0..read {
        notifications.push(Notification {
            id: format!("r{i}"),
            title: "read".to_string(),
            message: None,
            is_read: true,
            created_at: None,
        });
    }
    NotificationPage {
        notifications,
        total_pages: 1,
    }
}

// =============================================================================
// Mock API
// =============================================================================

/// A gate pair: the mock signals `entered` when the call starts and then
/// waits for `release` before returning.
pub(crate) struct CallGate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl CallGate {
    pub fn new() -> Self {
        CallGate {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

/// One planned response for the notifications endpoint.
pub(crate) struct NotificationPlan {
    pub gate: Option<(Arc<Notify>, Arc<Notify>)>,
    pub result: SyncResult<NotificationPage>,
}

pub(crate) struct MockApi {
    login_response: Mutex<SyncResult<Session>>,
    login_gate: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
    verify_response: Mutex<SyncResult<()>>,
    me_response: Mutex<SyncResult<User>>,
    logout_response: Mutex<SyncResult<()>>,
    mark_read_response: Mutex<SyncResult<()>>,
    register_push_response: Mutex<SyncResult<()>>,
    notification_plans: Mutex<VecDeque<NotificationPlan>>,
    notifications_response: Mutex<SyncResult<NotificationPage>>,

    pub login_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
    pub me_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub notifications_calls: AtomicUsize,
    pub mark_read_calls: AtomicUsize,
    pub register_push_calls: AtomicUsize,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(MockApi {
            login_response: Mutex::new(Err(SyncError::Internal("login not programmed".into()))),
            login_gate: Mutex::new(None),
            verify_response: Mutex::new(Ok(())),
            me_response: Mutex::new(Err(SyncError::Internal("me not programmed".into()))),
            logout_response: Mutex::new(Ok(())),
            mark_read_response: Mutex::new(Ok(())),
            register_push_response: Mutex::new(Ok(())),
            notification_plans: Mutex::new(VecDeque::new()),
            notifications_response: Mutex::new(Ok(NotificationPage::default())),
            login_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
            me_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            notifications_calls: AtomicUsize::new(0),
            mark_read_calls: AtomicUsize::new(0),
            register_push_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_login(&self, response: SyncResult<Session>) {
        *self.login_response.lock().unwrap() = response;
    }

    /// Makes the next login calls block until released (for busy-flag tests).
    pub fn gate_login(&self) -> CallGate {
        let gate = CallGate::new();
        *self.login_gate.lock().unwrap() = Some((gate.entered.clone(), gate.release.clone()));
        gate
    }

    pub fn set_verify(&self, response: SyncResult<()>) {
        *self.verify_response.lock().unwrap() = response;
    }

    pub fn set_me(&self, response: SyncResult<User>) {
        *self.me_response.lock().unwrap() = response;
    }

    pub fn set_logout(&self, response: SyncResult<()>) {
        *self.logout_response.lock().unwrap() = response;
    }

    pub fn set_register_push(&self, response: SyncResult<()>) {
        *self.register_push_response.lock().unwrap() = response;
    }

    pub fn set_notifications(&self, response: SyncResult<NotificationPage>) {
        *self.notifications_response.lock().unwrap() = response;
    }

    /// Queues a one-shot plan consumed before the default response.
    pub fn push_notification_plan(&self, plan: NotificationPlan) {
        self.notification_plans.lock().unwrap().push_back(plan);
    }
}

#[async_trait]
impl PortalApi for MockApi {
    async fn login(&self, _identifier: &str, _password: &str) -> SyncResult<Session> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.login_gate.lock().unwrap().clone();
        if let Some((entered, release)) = gate {
            entered.notify_one();
            release.notified().await;
        }
        self.login_response.lock().unwrap().clone()
    }

    async fn logout(&self, _token: &str) -> SyncResult<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.logout_response.lock().unwrap().clone()
    }

    async fn verify(&self, _token: &str) -> SyncResult<()> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.verify_response.lock().unwrap().clone()
    }

    async fn me(&self, _token: &str) -> SyncResult<User> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        self.me_response.lock().unwrap().clone()
    }

    async fn notifications(
        &self,
        _token: &str,
        _student_id: &str,
        _page: u32,
        _page_size: u32,
    ) -> SyncResult<NotificationPage> {
        self.notifications_calls.fetch_add(1, Ordering::SeqCst);
        let plan = self.notification_plans.lock().unwrap().pop_front();
        match plan {
            Some(plan) => {
                if let Some((entered, release)) = plan.gate {
                    entered.notify_one();
                    release.notified().await;
                }
                plan.result
            }
            None => self.notifications_response.lock().unwrap().clone(),
        }
    }

    async fn mark_read(&self, _token: &str, _notification_id: &str) -> SyncResult<()> {
        self.mark_read_calls.fetch_add(1, Ordering::SeqCst);
        self.mark_read_response.lock().unwrap().clone()
    }

    async fn register_push(
        &self,
        _token: &str,
        _student_id: &str,
        _device_token: &str,
    ) -> SyncResult<()> {
        self.register_push_calls.fetch_add(1, Ordering::SeqCst);
        self.register_push_response.lock().unwrap().clone()
    }
}

// =============================================================================
// Mock Push Platform
// =============================================================================

pub(crate) struct MockPushPlatform {
    granted: bool,
    token: String,
    pub permission_requests: AtomicUsize,
}

impl MockPushPlatform {
    pub fn granting(token: &str) -> Arc<Self> {
        Arc::new(MockPushPlatform {
            granted: true,
            token: token.to_string(),
            permission_requests: AtomicUsize::new(0),
        })
    }

    pub fn denying() -> Arc<Self> {
        Arc::new(MockPushPlatform {
            granted: false,
            token: String::new(),
            permission_requests: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PushPlatform for MockPushPlatform {
    async fn request_permission(&self) -> bool {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        self.granted
    }

    async fn device_token(&self) -> SyncResult<String> {
        if self.token.is_empty() {
            return Err(SyncError::Internal("no device token".into()));
        }
        Ok(self.token.clone())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Polls `condition` across task yields; panics if it never holds.
///
/// Single-threaded test runtimes interleave spawned tasks at yield points,
/// so a bounded yield loop is deterministic where a wall-clock sleep is not.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}

/// Builds an in-memory session store for tests.
pub(crate) async fn memory_store() -> atrium_store::SessionStore {
    atrium_store::Storage::new(atrium_store::StorageConfig::in_memory())
        .await
        .unwrap()
        .sessions()
}
