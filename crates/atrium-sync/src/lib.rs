//! # atrium-sync: Session & Notification Sync Engine
//!
//! This crate is the stateful core of the Atrium mobile client: it
//! establishes, persists, and validates an authenticated session across app
//! restarts, and keeps an accurate unread-notification count by combining
//! server polling with locally observed push events.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Engine Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                   PortalAgent (Orchestrator)                     │  │
//! │  │                                                                  │  │
//! │  │  Constructed by the shell, spawns watcher tasks on start         │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ SessionManager │  │ UnreadCounter  │  │ PushBridge             │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Auth state     │  │ Sync-ticket    │  │ Permission + device    │    │
//! │  │ machine, sole  │  │ fenced count,  │  │ token registration,    │    │
//! │  │ token store    │  │ gated on the   │  │ delivery/tap events,   │    │
//! │  │ writer         │  │ session        │  │ subscriptions          │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ ForegroundTrig.│  │ PortalApi      │  │ PortalConfig           │    │
//! │  │                │  │                │  │                        │    │
//! │  │ background →   │  │ REST client    │  │ TOML + env, device id  │    │
//! │  │ active resync  │  │ (reqwest)      │  │                        │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  DESIGN RULES:                                                         │
//! │  • Single owner per mutable entity (session state, unread count)       │
//! │  • No session ⇒ no sync attempted                                      │
//! │  • Background failures never force a destructive state change          │
//! │  • All I/O awaited; no locking held across the network                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`agent`] - `PortalAgent` orchestrator, builder, event emitter trait
//! - [`api`] - `PortalApi` trait and the reqwest implementation
//! - [`config`] - Engine configuration (TOML + env)
//! - [`error`] - Error taxonomy
//! - [`foreground`] - Lifecycle-transition resync
//! - [`push`] - Push registration & delivery bridge
//! - [`session`] - Session manager state machine
//! - [`telemetry`] - Tracing subscriber setup
//! - [`unread`] - Unread notification count synchronizer
//!
//! ## Usage
//! ```rust,ignore
//! use atrium_sync::{PortalAgent, PortalConfig};
//!
//! atrium_sync::telemetry::init_tracing();
//!
//! let config = PortalConfig::load_or_default(None);
//! let mut agent = PortalAgent::builder(config).build().await?;
//!
//! // Restores any persisted session (trust-on-presence) and starts the
//! // watcher tasks.
//! let restored = agent.start().await?;
//!
//! // The shell wires its own surfaces:
//! agent.session().login("ANG123", "secret").await?;
//! agent.foreground().unwrap().notify_active();
//! let count = agent.unread().count();
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod api;
pub mod config;
pub mod error;
pub mod foreground;
pub mod push;
pub mod session;
pub mod telemetry;
pub mod unread;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{NoOpEmitter, PortalAgent, PortalAgentBuilder, PortalEventEmitter};
pub use api::{HttpPortalApi, NotificationPage, PortalApi};
pub use config::{ApiSettings, DeviceSettings, PortalConfig, SyncSettings};
pub use error::{SyncError, SyncResult};
pub use foreground::{ForegroundHandle, LifecycleEvent};
pub use push::{DisabledPushPlatform, PushBridge, PushEvent, PushPlatform, SubscriptionId};
pub use session::SessionManager;
pub use unread::UnreadCounter;

// Re-export the domain types shells commonly need alongside the engine.
pub use atrium_core::{Notification, Session, SessionState, User, UserType};
