//! # sage-store
//!
//! Persistence for the Sage engine: session rows (one per user/scope/profile
//! triple) and append-only submission rows forming a backward-linked
//! conversation chain.
//!
//! Two backends implement the same [`SubmissionStore`] trait: a `SQLite`
//! store (r2d2 pool, WAL mode) for deployments and an in-memory store for
//! tests and ephemeral use.

#![deny(unsafe_code)]

pub mod errors;
pub mod memory;
pub mod sqlite;
pub mod store;
pub mod types;

pub use errors::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::SubmissionStore;
pub use types::{SessionRow, SubmissionRow};
