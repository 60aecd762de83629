//! # Foreground Trigger
//!
//! Observes app lifecycle transitions and resynchronizes on every
//! background → active transition: one token validity check and one full
//! unread refresh. Glue only; all policy lives in the session manager and
//! the unread counter.
//!
//! The shell reports transitions through a [`ForegroundHandle`]; the send is
//! non-blocking so the UI thread is never held up by a slow engine.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use std::sync::Arc;

use crate::session::SessionManager;
use crate::unread::UnreadCounter;

/// App lifecycle transitions the shell reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The app became active (foregrounded).
    Active,
    /// The app moved to the background.
    Background,
}

/// Handle the shell uses to report lifecycle transitions.
#[derive(Clone)]
pub struct ForegroundHandle {
    tx: mpsc::Sender<LifecycleEvent>,
}

impl ForegroundHandle {
    /// Reports that the app became active.
    pub fn notify_active(&self) {
        self.send(LifecycleEvent::Active);
    }

    /// Reports that the app moved to the background.
    pub fn notify_background(&self) {
        self.send(LifecycleEvent::Background);
    }

    fn send(&self, event: LifecycleEvent) {
        // A full buffer means a resync is already queued; dropping the
        // event loses nothing.
        if self.tx.try_send(event).is_err() {
            debug!(?event, "Lifecycle channel full or closed; dropping event");
        }
    }
}

/// Spawns the foreground watcher task.
///
/// Only a background → active *transition* triggers a resync: the app
/// starts foregrounded, and the session-start refresh is the agent's job.
/// The task ends when every handle is dropped.
pub fn spawn(
    session: SessionManager,
    counter: Arc<UnreadCounter>,
) -> (ForegroundHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(16);

    let task = tokio::spawn(async move {
        let mut in_background = false;

        while let Some(event) = rx.recv().await {
            match event {
                LifecycleEvent::Background => {
                    in_background = true;
                }
                LifecycleEvent::Active if in_background => {
                    in_background = false;
                    debug!("App became active; resynchronizing");
                    session.check_token_validity().await;
                    counter.refresh().await;
                }
                LifecycleEvent::Active => {}
            }
        }

        debug!("Foreground watcher stopped");
    });

    (ForegroundHandle { tx }, task)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{memory_store, page, session, wait_until, MockApi};
    use std::sync::atomic::Ordering;

    async fn setup(api: Arc<MockApi>) -> (ForegroundHandle, JoinHandle<()>, Arc<UnreadCounter>) {
        api.set_login(Ok(session("abc", "u1")));
        api.set_notifications(Ok(page(2, 0)));
        let manager = SessionManager::new(api.clone(), memory_store().await);
        manager.login("ANG123", "Gooseman12!").await.unwrap();
        let counter = Arc::new(UnreadCounter::new(api.clone(), manager.clone(), 50));
        let (handle, task) = spawn(manager, counter.clone());
        (handle, task, counter)
    }

    #[tokio::test]
    async fn test_background_to_active_resyncs() {
        let api = MockApi::new();
        let (handle, _task, counter) = setup(api.clone()).await;

        handle.notify_background();
        handle.notify_active();

        wait_until(|| api.notifications_calls.load(Ordering::SeqCst) == 1).await;
        assert_eq!(api.verify_calls.load(Ordering::SeqCst), 1);
        assert_eq!(counter.count(), 2);
    }

    #[tokio::test]
    async fn test_active_without_prior_background_is_noop() {
        let api = MockApi::new();
        let (handle, _task, _counter) = setup(api.clone()).await;

        handle.notify_active();
        handle.notify_active();

        // Give the watcher a chance to misbehave.
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert_eq!(api.notifications_calls.load(Ordering::SeqCst), 0);
        assert_eq!(api.verify_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_repeated_transitions_each_resync() {
        let api = MockApi::new();
        let (handle, _task, _counter) = setup(api.clone()).await;

        handle.notify_background();
        handle.notify_active();
        handle.notify_background();
        handle.notify_active();

        wait_until(|| api.notifications_calls.load(Ordering::SeqCst) == 2).await;
        assert_eq!(api.verify_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_watcher_stops_when_handles_drop() {
        let api = MockApi::new();
        let (handle, task, _counter) = setup(api.clone()).await;

        drop(handle);
        task.await.unwrap();
    }
}
