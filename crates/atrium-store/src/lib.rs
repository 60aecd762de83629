//! # atrium-store: Secure Token Store for Atrium
//!
//! Durable key-value persistence for the access token and cached user
//! record. Survives process restart; backed by SQLite via sqlx.
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Token Store Contract                               │
//! │                                                                         │
//! │  Two string keys in the session_store table:                           │
//! │    auth_token  → opaque bearer credential                              │
//! │    user_data   → serialized JSON of the cached User                    │
//! │                                                                         │
//! │  BOTH-OR-NEITHER:                                                      │
//! │  • save() upserts both keys in one transaction                         │
//! │  • clear() deletes both keys in one transaction                        │
//! │  • load() treats a missing sibling or malformed JSON as NO session     │
//! │    (never an error) — callers restart as Unauthenticated               │
//! │                                                                         │
//! │  No schema versioning is assumed; a corrupt record is logged and       │
//! │  reported as absent.                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Storage error types
//! - [`repository`] - The session store itself
//!
//! ## Usage
//! ```rust,ignore
//! use atrium_store::{Storage, StorageConfig};
//!
//! let storage = Storage::new(StorageConfig::new("path/to/atrium.db")).await?;
//! let sessions = storage.sessions();
//!
//! sessions.save(&session).await?;
//! let restored = sessions.load().await?; // Option<Session>
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::StoreError;
pub use pool::{Storage, StorageConfig};
pub use repository::session::SessionStore;
