//! orgtree: corporate and organizational structure engine
//!
//! Two hierarchies live in one `TreeStore`: the legal tree of corporate
//! entities (corporation > holding > company) and, per company, the
//! operational tree of org units (directorate > division > department >
//! section). The mutation engine edits both under structural invariants; the
//! resolvers answer BSC ownership and effective-role questions.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
