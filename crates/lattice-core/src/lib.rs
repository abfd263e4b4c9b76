//! Shared foundation for the Lattice runtime: configuration, the error
//! taxonomy, the vendor-neutral message model with its format codecs, the
//! middle-out edit strategy, and the MQ topic schemas.

pub mod codec;
pub mod config;
pub mod error;
pub mod topics;
pub mod trim;
pub mod types;

pub use error::{LatticeError, Result};
