//! Store use-case services.
//!
//! # Responsibility
//! - Expose the collaborator-facing store operations.
//! - Keep callers decoupled from SQLite and repository details.

pub mod store;
pub mod transfer;
