//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::entities::RecordKind;

/// Domain errors represent violated structural rules.
/// None of them is raised after a partial write: the mutation engine validates
/// a complete plan before touching the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    #[error("{kind} already exists: {id}")]
    DuplicateId { kind: RecordKind, id: String },

    #[error("{child} cannot be created under {parent}")]
    InvalidParentType { child: String, parent: String },

    #[error("{child} cannot be placed under {parent}")]
    InvalidChildType { child: String, parent: String },

    #[error("cycle detected: {node} cannot be moved under {target}")]
    CycleDetected { node: String, target: String },

    #[error("BSC inheritance cycle detected at org unit: {0}")]
    InheritanceCycle(String),

    #[error("cannot delete the last root corporation: {0}")]
    CannotDeleteRoot(String),

    #[error("{kind} {id} still has {children} child node(s)")]
    OrphanPolicyViolation {
        kind: RecordKind,
        id: String,
        children: usize,
    },

    #[error("org unit {id} at level {level} cannot own a BSC")]
    BscNotPermitted { id: String, level: String },

    #[error("assignment {0} is scoped to both a corporate entity and an org unit")]
    InvalidAssignmentScope(String),
}

impl DomainError {
    pub fn entity_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: RecordKind::Entity,
            id: id.into(),
        }
    }

    pub fn unit_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: RecordKind::Unit,
            id: id.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
