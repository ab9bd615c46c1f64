//! Store implementations for Counsel.
//!
//! Every backend implements the narrow contracts from `counsel-core`
//! (`ChatStore`, `MessageStore`, `UserStore`, `DocumentStore`,
//! `DocumentTextSource`); nothing above this crate knows which database is
//! behind them.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
