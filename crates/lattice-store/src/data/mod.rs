//! Typed data access, one module per aggregate. Every function takes an
//! explicit [`crate::UnitOfWork`].

pub mod disks;
pub mod messages;
pub mod projects;
pub mod sandbox;
pub mod sessions;
pub mod skills;
pub mod spaces;
pub mod tasks;

use uuid::Uuid;

use crate::error::{Result, StoreError};

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| StoreError::Invalid(format!("bad uuid {s:?}: {e}")))
}

pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}
