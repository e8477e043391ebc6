//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define per-collection data access contracts.
//! - Isolate SQLite query details from store orchestration.
//!
//! # Invariants
//! - Repository writes must call `Record::validate()` before persistence.
//! - Repository APIs return semantic errors (`DuplicateKey`, `NotFound`) in
//!   addition to DB transport errors.

pub mod collection_repo;
