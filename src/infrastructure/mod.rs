//! Infrastructure layer: I/O implementations and DI container
//!
//! This layer implements I/O boundary traits, snapshot persistence, and wires
//! up services.

pub mod di;
pub mod error;
pub mod snapshot;
pub mod traits;

pub use error::{InfraError, InfraResult};
pub use snapshot::{SnapshotFormat, SnapshotRepository};
