//! Application layer: services and use cases
//!
//! This layer orchestrates domain logic: structural mutations, resolvers and
//! read-only queries over a `TreeStore`.

pub mod error;
pub mod error_ext;
pub mod services;

pub use error::{ApplicationError, ApplicationResult};
pub use error_ext::ResultPathExt;
