//! Core types and trait definitions for the rally chat and game service.
//!
//! No HTTP or database dependencies live here. All other crates depend on
//! it; the tic-tac-toe rules in [`game`] are pure functions over plain values.

pub mod error;
pub mod friendship;
pub mod game;
pub mod message;
pub mod store;
pub mod user;

pub use error::{Error, Result};
