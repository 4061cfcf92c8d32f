//! # skychat-store
//!
//! Visor and user repositories for the skychat messenger.
//!
//! Two backends are provided: [`memory`] keeps every aggregate in a locked
//! map, and [`Database`] persists them as JSON documents in SQLite. Both run
//! read-modify-write mutations under a single lock so updates to the same
//! visor never race.

pub mod database;
pub mod memory;
pub mod migrations;
pub mod users;
pub mod visors;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use memory::{InMemoryUserRepository, InMemoryVisorRepository};
