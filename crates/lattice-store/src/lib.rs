//! Persistence gateway: typed data access over SQLite with an explicit
//! transactional unit-of-work.
//!
//! All data helpers take a [`store::UnitOfWork`] handle rather than a bare
//! connection, so callers control transaction boundaries and reads inside a
//! transaction observe its uncommitted writes.

pub mod data;
pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use store::{Store, UnitOfWork};
