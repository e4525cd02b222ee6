//! SQLite backend for the Proeve workflow store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Ledger tables are strictly
//! append-only; aggregate tables are mutable rows; both live behind the
//! same transactional boundary.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
