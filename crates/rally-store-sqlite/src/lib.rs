//! SQLite backend for the rally store traits.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every closure handed to that thread
//! runs to completion before the next one starts; multi-statement operations
//! additionally run inside an IMMEDIATE transaction.

mod encode;
mod friendships;
mod games;
mod messages;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
