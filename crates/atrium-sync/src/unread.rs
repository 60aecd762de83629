//! # Unread Notification Count Synchronizer
//!
//! Owns the unread-count value and reconciles server-reported counts with
//! locally observed increments/decrements.
//!
//! ## Trigger Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Unread Count Triggers                              │
//! │                                                                         │
//! │  FULL SYNC (refresh):                                                  │
//! │  (a) once when a session becomes Authenticated      [agent watcher]    │
//! │  (b) on every background → active transition        [foreground]       │
//! │  (c) on explicit pull-to-refresh                    [UI shell]         │
//! │  (d) ~1s after a notification tap                   [push bridge]      │
//! │                                                                         │
//! │  OPTIMISTIC ADJUSTMENTS (between syncs):                               │
//! │  • observe_delivery() on a foreground push          [push bridge]      │
//! │  • mark_as_read(id) on a local read action          [agent]            │
//! │                                                                         │
//! │  Triggers may race. Each refresh draws a sync ticket before its fetch; │
//! │  the register applies only the highest-ticket completion, so results   │
//! │  landing out of order cannot roll the count backwards.                 │
//! │                                                                         │
//! │  A failed fetch changes nothing: a stale count beats an erroring UI.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::watch;
use tracing::{debug, warn};

use atrium_core::UnreadRegister;

use crate::api::PortalApi;
use crate::session::SessionManager;

// =============================================================================
// Unread Counter
// =============================================================================

/// The single authoritative unread-count holder.
///
/// All authenticated fetches are gated on the session manager: no session,
/// no sync attempted.
pub struct UnreadCounter {
    api: Arc<dyn PortalApi>,
    session: SessionManager,
    register: RwLock<UnreadRegister>,
    next_ticket: AtomicU64,
    count_tx: watch::Sender<u32>,
    page_size: u32,
}

impl UnreadCounter {
    /// Creates a counter gated on the given session.
    pub fn new(api: Arc<dyn PortalApi>, session: SessionManager, page_size: u32) -> Self {
        let (count_tx, _) = watch::channel(0);
        UnreadCounter {
            api,
            session,
            register: RwLock::new(UnreadRegister::new()),
            next_ticket: AtomicU64::new(0),
            count_tx,
            page_size,
        }
    }

    /// Current count.
    pub fn count(&self) -> u32 {
        self.register
            .read()
            .map(|register| register.count())
            .unwrap_or_default()
    }

    /// Subscribes to count changes.
    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.count_tx.subscribe()
    }

    /// Performs a full sync of the unread count.
    ///
    /// No-op without an authenticated session. Fetches page 1 of the feed,
    /// counts unread entries, and replaces the count — unless an
    /// overlapping refresh with a higher ticket already completed. A fetch
    /// failure leaves the count unchanged.
    pub async fn refresh(&self) {
        let Some(session) = self.session.current_session().await else {
            debug!("No authenticated session; skipping unread refresh");
            return;
        };

        // Draw the ticket before the fetch: completion order decides which
        // overlapping refresh wins, issue order decides the fence.
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed) + 1;

        match self
            .api
            .notifications(&session.token, &session.user.id, 1, self.page_size)
            .await
        {
            Ok(page) => {
                let unread = page.unread_count();
                self.apply_synced(ticket, unread);
            }
            Err(e) => {
                // Stale-but-available beats erroring UI; the next trigger
                // will reconcile.
                warn!(error = %e, ticket, "Unread refresh failed; keeping last known count");
            }
        }
    }

    /// Optimistic `+1` for a push delivery observed while foregrounded.
    ///
    /// Synchronous and in-memory; superseded by the next full sync.
    pub fn observe_delivery(&self) {
        if let Ok(mut register) = self.register.write() {
            register.observe_delivery();
        }
        self.publish();
    }

    /// Optimistic `-1` (floored at 0) for a locally observed read action.
    ///
    /// Does not verify server-side read state; the paired server call is the
    /// caller's job (see the agent's `mark_notification_read`).
    pub fn mark_as_read(&self, notification_id: &str) {
        if let Ok(mut register) = self.register.write() {
            register.observe_read();
        }
        debug!(notification_id, "Locally marked notification read");
        self.publish();
    }

    fn apply_synced(&self, ticket: u64, unread: u32) {
        let applied = self
            .register
            .write()
            .map(|mut register| register.apply_synced(ticket, unread))
            .unwrap_or(false);

        if applied {
            debug!(count = unread, ticket, "Applied unread sync");
            self.publish();
        } else {
            debug!(ticket, "Discarded stale unread sync");
        }
    }

    fn publish(&self) {
        self.count_tx.send_replace(self.count());
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
