//! # Domain Types
//!
//! Core domain types shared by the token store, the sync engine, and (via
//! ts-rs) the TypeScript UI shell.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      User       │   │     Session     │   │  Notification   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  token (opaque) │   │  id             │       │
//! │  │  first_name     │   │  user           │   │  title          │       │
//! │  │  last_name      │   │                 │   │  message        │       │
//! │  │  user_type      │   │  both fields    │   │  is_read        │       │
//! │  │  email?         │   │  persist        │   │  created_at?    │       │
//! │  │  student_number?│   │  together       │   │                 │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────┐      │
//! │  │  SessionState                                                │      │
//! │  │  Unauthenticated → Authenticating → Authenticated            │      │
//! │  │                         Authenticated ⇄ Refreshing → Expired │      │
//! │  └──────────────────────────────────────────────────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// User
// =============================================================================

/// Role of the account holder as reported by the portal backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum UserType {
    /// A student account.
    Student,
    /// A parent/guardian account.
    Parent,
    /// A staff account.
    Staff,
    /// A role this client version does not know about.
    ///
    /// The backend may introduce roles before the app updates; they must not
    /// break session handling.
    Unknown,
}

impl UserType {
    /// Maps a backend role string onto the enum, tolerating roles this
    /// client version does not know about.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "student" => UserType::Student,
            "parent" | "guardian" => UserType::Parent,
            "staff" | "teacher" => UserType::Staff,
            _ => UserType::Unknown,
        }
    }
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserType::Student => write!(f, "student"),
            UserType::Parent => write!(f, "parent"),
            UserType::Staff => write!(f, "staff"),
            UserType::Unknown => write!(f, "unknown"),
        }
    }
}

/// The cached user profile.
///
/// This is a weak copy of server truth: it is written on login, opportunistically
/// refreshed afterwards, and may be stale in between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    /// Backend identifier; also the key the device push token is bound to.
    pub id: String,

    /// Given name.
    pub first_name: String,

    /// Family name.
    pub last_name: String,

    /// Account role.
    pub user_type: UserType,

    /// Contact email, if the backend exposes one for this role.
    #[serde(default)]
    pub email: Option<String>,

    /// Student number, present for student accounts.
    #[serde(default)]
    pub student_number: Option<String>,
}

impl User {
    /// Returns the display name ("First Last").
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// =============================================================================
// Session
// =============================================================================

/// The authenticated identity and credential currently held by the client.
///
/// ## Invariant
/// `token` and `user` are persisted both-or-neither: the token store writes
/// and clears them in a single transaction, and a stored token without its
/// user record (or vice versa) is treated as no session at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Session {
    /// Opaque bearer credential. Never inspected client-side.
    pub token: String,

    /// Cached profile of the authenticated user.
    pub user: User,
}

/// Authentication state owned by the session manager.
///
/// Exactly one holder mutates this; everyone else observes it through a
/// watch channel or the derived [`SessionState::is_authenticated`] flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SessionState {
    /// No credential held. Initial state.
    #[default]
    Unauthenticated,

    /// A login call is in flight.
    Authenticating,

    /// A credential is held and presumed valid.
    Authenticated,

    /// Verification failed; one refresh attempt is in flight.
    Refreshing,

    /// The refresh attempt was rejected; the credential is gone.
    /// Terminal until the next login.
    Expired,
}

impl SessionState {
    /// Derived flag the UI binds to.
    #[inline]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Unauthenticated => write!(f, "unauthenticated"),
            SessionState::Authenticating => write!(f, "authenticating"),
            SessionState::Authenticated => write!(f, "authenticated"),
            SessionState::Refreshing => write!(f, "refreshing"),
            SessionState::Expired => write!(f, "expired"),
        }
    }
}

// =============================================================================
// Notification
// =============================================================================

/// A single entry of the user's notification feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Notification {
    /// Backend identifier; used for mark-read calls and deep links.
    pub id: String,

    /// Short headline shown in the feed and in push banners.
    pub title: String,

    /// Optional longer body.
    #[serde(default)]
    pub message: Option<String>,

    /// Whether the user has acknowledged this notification.
    pub is_read: bool,

    /// Server-side creation time.
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state_flags() {
        assert!(SessionState::Authenticated.is_authenticated());
        assert!(!SessionState::Unauthenticated.is_authenticated());
        assert!(!SessionState::Refreshing.is_authenticated());
        assert!(!SessionState::Expired.is_authenticated());
        assert_eq!(SessionState::default(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_unknown_user_type_tolerated() {
        assert_eq!(UserType::from_wire("student"), UserType::Student);
        assert_eq!(UserType::from_wire("Guardian"), UserType::Parent);
        assert_eq!(UserType::from_wire("droid"), UserType::Unknown);
        assert_eq!(UserType::from_wire(""), UserType::Unknown);
    }

    #[test]
    fn test_user_round_trips_camel_case() {
        let user = User {
            id: "u1".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            user_type: UserType::Student,
            email: Some("ada@example.edu".into()),
            student_number: Some("S-1815".into()),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("firstName"));
        assert!(json.contains("studentNumber"));

        let back: User = serde_json::from_str(&json).unwrap();
        assert_eq!(back, user);
        assert_eq!(back.display_name(), "Ada Lovelace");
    }
}
