//! Application services
//!
//! Concrete services that operate on a `TreeStore` passed in by the caller.
//! The mutation engine is the only writer; resolvers and the query facade
//! borrow the store for a single call.

mod authority;
mod bsc;
mod mutation;
mod query;

pub use authority::{AuthorityResolver, RoleBasis, RoleExplanation};
pub use bsc::{BscResolution, BscResolver, OwnerBasis};
pub use mutation::{DeleteReport, DropPosition, Hierarchy, MutationService, OrphanPolicy};
pub use query::{NodeQuery, QueryFacade};
