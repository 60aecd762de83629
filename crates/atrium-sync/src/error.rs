//! # Sync Error Types
//!
//! Error types for the session & notification sync engine.
//!
//! ## Error Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  User-facing    │  │   Transport     │  │     Coordination        │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │ InvalidCreds    │  │ ServerUnavail.  │  │  AlreadyInProgress      │ │
//! │  │ Validation      │  │ Network         │  │  (debounce, don't show) │ │
//! │  │ (shown inline)  │  │ (transient      │  │                         │ │
//! │  │                 │  │  banner)        │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Authorization  │  │  Configuration  │  │     Local               │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │ Unauthorized    │  │ InvalidConfig   │  │  Storage                │ │
//! │  │ (token rejected)│  │ ConfigLoad/Save │  │  Serialization          │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  PROPAGATION POLICY:                                                   │
//! │  • login/logout surface errors to the caller                           │
//! │  • background reconciliation (unread refresh, profile refresh, push    │
//! │    registration) swallows errors and keeps last-known-good state       │
//! │  • a bare network error never causes a destructive state change        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use atrium_core::ValidationError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all engine failures.
///
/// Variants carry owned strings (not source errors) so results can be cloned
/// into event payloads and test fixtures.
#[derive(Debug, Error, Clone)]
pub enum SyncError {
    // =========================================================================
    // User-facing Errors
    // =========================================================================
    /// The backend rejected the identifier/password pair (HTTP 401 on login).
    #[error("Invalid identifier or password")]
    InvalidCredentials,

    /// Login input failed client-side validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Authorization Errors
    // =========================================================================
    /// The backend explicitly rejected the held token (4xx on an
    /// authenticated call). Distinct from transport trouble: this is a
    /// definitive statement about the credential.
    #[error("Session rejected by server: {0}")]
    Unauthorized(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The backend responded but is unhealthy (HTTP 5xx).
    #[error("Server unavailable ({status}): {message}")]
    ServerUnavailable { status: u16, message: String },

    /// The request never completed (DNS, connect, timeout).
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with a status the client has no mapping for.
    #[error("Unexpected response ({status}): {message}")]
    UnexpectedStatus { status: u16, message: String },

    // =========================================================================
    // Coordination Errors
    // =========================================================================
    /// A session operation was already in flight; callers should debounce.
    #[error("Another session operation is already in progress")]
    AlreadyInProgress,

    // =========================================================================
    // Local Errors
    // =========================================================================
    /// Token store operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Failed to encode or decode a payload.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid engine configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load the config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save the config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal engine error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<atrium_store::StoreError> for SyncError {
    fn from(err: atrium_store::StoreError) -> Self {
        SyncError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Network(format!("request timed out: {err}"))
        } else if err.is_decode() {
            SyncError::Serialization(err.to_string())
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidConfig(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if the operation may succeed when simply retried.
    ///
    /// ## Retryable
    /// - Network failures and timeouts
    /// - Server 5xx responses
    ///
    /// ## Non-Retryable
    /// - Credential and validation errors (need different input)
    /// - Explicit token rejection (needs refresh or re-login)
    /// - Configuration problems
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Network(_) | SyncError::ServerUnavailable { .. }
        )
    }

    /// Returns true if this is a user-correctable error to show inline.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidCredentials | SyncError::Validation(_)
        )
    }

    /// Returns true if the backend made a definitive statement that the
    /// presented credential is not acceptable.
    ///
    /// This is the only error class allowed to drive a destructive session
    /// transition (see the session manager's refresh path).
    pub fn is_auth_rejection(&self) -> bool {
        matches!(
            self,
            SyncError::Unauthorized(_) | SyncError::InvalidCredentials
        )
    }
}
