//! # Error Types
//!
//! Domain-specific error types for atrium-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  atrium-core errors (this file)                                        │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  atrium-store errors (separate crate)                                  │
//! │  └── StoreError       - Token store operation failures                 │
//! │                                                                         │
//! │  atrium-sync errors (separate crate)                                   │
//! │  └── SyncError        - What the UI shell sees                         │
//! │                                                                         │
//! │  Flow: ValidationError → SyncError → UI shell (inline message)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (field name, limit, etc.)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation failures.
///
/// Each variant maps to an inline, user-correctable message in the shell.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was empty.
    #[error("{field} is required")]
    Required { field: String },

    /// A field exceeded its maximum length.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },
}

impl ValidationError {
    /// Creates a Required error for the given field.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }
}
