//! Authority resolver
//!
//! Combines a user's direct, global and inherited assignments into one
//! effective role. Org-unit lookups are bridged to the owning company so that
//! company-level grants reach every unit of that company.

use std::fmt;

use tracing::{debug, instrument};

use crate::domain::{
    permissions_for, AssignmentScope, PermissionSet, Role, RoleScope, TreeStore,
    UserEntityAssignment,
};

/// What produced an effective role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleBasis {
    SystemAdmin,
    /// No assignment applied
    Floor,
    Global { assignment: String },
    Direct { assignment: String },
    /// Assignment on an ancestor flagged `inheritToChildren`
    Inherited { assignment: String, ancestor: String },
    /// Role held at the unit's company
    Bridged { company: String, basis: Box<RoleBasis> },
}

impl fmt::Display for RoleBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleBasis::SystemAdmin => write!(f, "system administrator"),
            RoleBasis::Floor => write!(f, "default floor"),
            RoleBasis::Global { assignment } => write!(f, "global assignment {assignment}"),
            RoleBasis::Direct { assignment } => write!(f, "direct assignment {assignment}"),
            RoleBasis::Inherited {
                assignment,
                ancestor,
            } => write!(f, "assignment {assignment} inherited from {ancestor}"),
            RoleBasis::Bridged { company, basis } => {
                write!(f, "company {company} ({basis})")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleExplanation {
    pub role: Role,
    pub basis: RoleBasis,
}

impl RoleExplanation {
    fn floor() -> Self {
        Self {
            role: Role::Viewer,
            basis: RoleBasis::Floor,
        }
    }

    /// Replace the current best if `role` is strictly stronger.
    fn raise(&mut self, role: Role, basis: impl FnOnce() -> RoleBasis) {
        if role > self.role {
            self.role = role;
            self.basis = basis();
        }
    }
}

pub struct AuthorityResolver<'a> {
    store: &'a TreeStore,
}

impl<'a> AuthorityResolver<'a> {
    pub fn new(store: &'a TreeStore) -> Self {
        Self { store }
    }

    /// Highest role `user_id` holds at `scope`. Never fails: unknown users and
    /// nodes degrade to `viewer`.
    pub fn effective_role(&self, user_id: &str, scope: &RoleScope) -> Role {
        self.explain_role(user_id, scope).role
    }

    #[instrument(level = "debug", skip(self))]
    pub fn explain_role(&self, user_id: &str, scope: &RoleScope) -> RoleExplanation {
        if self.store.user(user_id).is_some_and(|u| u.is_system_admin) {
            return RoleExplanation {
                role: Role::Admin,
                basis: RoleBasis::SystemAdmin,
            };
        }

        let mut best = RoleExplanation::floor();
        for assignment in self.store.assignments_for(user_id).filter(|a| a.is_active) {
            self.apply_assignment(&mut best, assignment, scope);
        }

        if scope.corporate_entity_id.is_none() {
            if let Some(unit) = scope
                .org_unit_id
                .as_deref()
                .and_then(|id| self.store.unit(id))
            {
                let company = self.explain_role(user_id, &RoleScope::entity(&unit.company_id));
                debug!(
                    "bridging {} to company {}: {}",
                    unit.id, unit.company_id, company.role
                );
                best.raise(company.role, || RoleBasis::Bridged {
                    company: unit.company_id.clone(),
                    basis: Box::new(company.basis),
                });
            }
        }

        best
    }

    /// Capabilities of the effective role at `scope`.
    pub fn permissions(&self, user_id: &str, scope: &RoleScope) -> PermissionSet {
        permissions_for(self.effective_role(user_id, scope))
    }

    fn apply_assignment(
        &self,
        best: &mut RoleExplanation,
        assignment: &UserEntityAssignment,
        scope: &RoleScope,
    ) {
        let id = || assignment.id.clone();
        match assignment.scope() {
            Some(AssignmentScope::Global) => {
                best.raise(assignment.role, || RoleBasis::Global { assignment: id() })
            }
            Some(AssignmentScope::Entity(entity)) => {
                let Some(target) = scope.corporate_entity_id.as_deref() else {
                    return;
                };
                if target == entity {
                    best.raise(assignment.role, || RoleBasis::Direct { assignment: id() });
                } else if assignment.inherit_to_children
                    && self.store.entities().is_descendant_of(target, entity)
                {
                    best.raise(assignment.role, || RoleBasis::Inherited {
                        assignment: id(),
                        ancestor: entity.to_string(),
                    });
                }
            }
            Some(AssignmentScope::Unit(unit)) => {
                let Some(target) = scope.org_unit_id.as_deref() else {
                    return;
                };
                if target == unit {
                    best.raise(assignment.role, || RoleBasis::Direct { assignment: id() });
                } else if assignment.inherit_to_children
                    && self.store.units().is_descendant_of(target, unit)
                {
                    best.raise(assignment.role, || RoleBasis::Inherited {
                        assignment: id(),
                        ancestor: unit.to_string(),
                    });
                }
            }
            None => {}
        }
    }
}
