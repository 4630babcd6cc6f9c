//! Domain layer: hierarchies, taxonomy and access records
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod access;
pub mod arena;
pub mod builder;
pub mod entities;
pub mod error;
pub mod store;
pub mod taxonomy;
pub mod walk;

pub use access::{
    permissions_for, AssignmentScope, PermissionSet, Role, RoleScope, User, UserEntityAssignment,
};
pub use arena::{NodeArena, PreOrderIterator};
pub use builder::StoreBuilder;
pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use store::{Snapshot, TreeStore};
pub use taxonomy::{EntityType, OrgLevel};
pub use walk::{ChainWalk, WalkError};
