//! # Repository Module
//!
//! Typed access to the token store's tables.

pub mod session;
