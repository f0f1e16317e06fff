//! `SQLite` backend: connection pool, migrations, and the store
//! implementation.

pub mod connection;
pub mod migrations;
#[allow(clippy::module_inception)]
mod store;

pub use connection::{ConnectionConfig, ConnectionPool, PooledConnection};
pub use store::SqliteStore;
