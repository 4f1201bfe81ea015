//! Storage layer: user accounts and their sign-in sessions.
//!
//! The [`Storage`] trait abstracts over the Postgres backend used in
//! production and the in-memory backend used by the test suite.

pub mod memory;
pub mod models;
pub mod operations;

pub use memory::MemoryStorage;
pub use models::{Session, User};
pub use operations::{PgStorage, Storage};
