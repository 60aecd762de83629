//! # Validation Module
//!
//! Login input validation.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI Shell (TypeScript)                                        │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Session Manager (Rust)                                       │
//! │  └── THIS MODULE: rejects malformed input before any network call      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Backend                                                      │
//! │  └── Authoritative credential check (401 on bad credentials)           │
//! │                                                                         │
//! │  Defense in depth: a blank identifier never reaches the wire           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum accepted identifier length.
const MAX_IDENTIFIER_LEN: usize = 100;

/// Maximum accepted password length.
const MAX_PASSWORD_LEN: usize = 200;

// =============================================================================
// Login Input Validators
// =============================================================================

/// Validates a login identifier (username or student number).
///
/// ## Rules
/// - Must not be empty after trimming
/// - Must be at most 100 characters
///
/// Returns the trimmed identifier so callers send a canonical value.
pub fn validate_identifier(identifier: &str) -> ValidationResult<&str> {
    let identifier = identifier.trim();

    if identifier.is_empty() {
        return Err(ValidationError::required("identifier"));
    }

    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::TooLong {
            field: "identifier".to_string(),
            max: MAX_IDENTIFIER_LEN,
        });
    }

    Ok(identifier)
}

/// Validates a login password.
///
/// ## Rules
/// - Must not be empty (passwords are NOT trimmed; leading/trailing spaces
///   are legal password characters)
/// - Must be at most 200 characters
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::required("password"));
    }

    if password.len() > MAX_PASSWORD_LEN {
        return Err(ValidationError::TooLong {
            field: "password".to_string(),
            max: MAX_PASSWORD_LEN,
        });
    }

    Ok(())
}
