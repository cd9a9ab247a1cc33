//! Snapshot subsystem
//!
//! Loads a JSON description of a host scene (types, objects and host state)
//! so the engine can run outside a live host, from the command line or tests.

mod errors;
mod loader;

pub use errors::{SnapshotError, SnapshotErrorCode, SnapshotResult};
pub use loader::Snapshot;

use crate::validator::ValidatorError;

impl From<SnapshotError> for ValidatorError {
    fn from(err: SnapshotError) -> Self {
        ValidatorError::Snapshot(err.to_string())
    }
}
