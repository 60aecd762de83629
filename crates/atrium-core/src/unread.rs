//! # Unread-Count Register
//!
//! The single authoritative unread-notification count, as a pure value type.
//!
//! ## Reconciliation Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Unread Count Reconciliation                            │
//! │                                                                         │
//! │  TWO KINDS OF WRITES:                                                  │
//! │  ────────────────────                                                  │
//! │  1. Optimistic local adjustments (advisory)                            │
//! │     • observe_delivery():  count += 1   (push seen in foreground)      │
//! │     • observe_read():      count -= 1   (floored at 0)                 │
//! │                                                                         │
//! │  2. Authoritative full syncs (server-derived)                          │
//! │     • apply_synced(ticket, n): REPLACES count with n                   │
//! │                                                                         │
//! │  OUT-OF-ORDER PROTECTION:                                              │
//! │  ────────────────────────                                              │
//! │  Every full sync is issued a monotonically increasing ticket BEFORE    │
//! │  its fetch starts. Requests may complete out of order; a completed     │
//! │  sync is applied only if its ticket is higher than every ticket        │
//! │  applied so far.                                                       │
//! │                                                                         │
//! │     issue t=1 ──fetch──────────────────────▶ apply(1, …)  DISCARDED    │
//! │     issue t=2 ──fetch──▶ apply(2, …)  APPLIED                          │
//! │                                                                         │
//! │  The register never goes negative and optimistic writes are always     │
//! │  superseded by the next applied full sync.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keeping this logic free of I/O makes the reconciliation deterministic to
//! test; the sync crate only contributes the actual fetches and locking.

// =============================================================================
// Unread Register
// =============================================================================

/// A last-write-wins register for the unread count, fenced by sync tickets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnreadRegister {
    /// Current count. Never negative by construction.
    count: u32,

    /// Highest sync ticket applied so far. 0 means no sync applied yet;
    /// issued tickets start at 1.
    applied_ticket: u64,
}

impl UnreadRegister {
    /// Creates an empty register (count 0, no sync applied).
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current count.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Returns the highest ticket applied so far.
    #[inline]
    pub fn applied_ticket(&self) -> u64 {
        self.applied_ticket
    }

    /// Optimistic adjustment for a locally observed push delivery.
    pub fn observe_delivery(&mut self) {
        self.count = self.count.saturating_add(1);
    }

    /// Optimistic adjustment for a locally observed read action.
    ///
    /// Floored at 0: acknowledging more notifications than the register
    /// knows about must never produce a negative badge.
    pub fn observe_read(&mut self) {
        self.count = self.count.saturating_sub(1);
    }

    /// Applies an authoritative server-derived count.
    ///
    /// Returns `true` if the value was applied, `false` if the ticket was
    /// stale (an overlapping, later-issued sync already completed).
    pub fn apply_synced(&mut self, ticket: u64, count: u32) -> bool {
        if ticket <= self.applied_ticket {
            return false;
        }
        self.applied_ticket = ticket;
        self.count = count;
        true
    }
}
