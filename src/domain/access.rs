//! Users, role assignments and the static role → capability table

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::entities::default_true;

/// Access role, totally ordered by privilege weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    Viewer,
}

impl Role {
    pub fn weight(self) -> u8 {
        match self {
            Role::Admin => 3,
            Role::Editor => 2,
            Role::Viewer => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
        }
    }
}

impl PartialOrd for Role {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Role {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight().cmp(&other.weight())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "editor" => Ok(Role::Editor),
            "viewer" => Ok(Role::Viewer),
            other => Err(format!(
                "unknown role '{other}' (expected admin, editor or viewer)"
            )),
        }
    }
}

/// Subject of role assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_system_admin: bool,
}

/// A role granted to a user, optionally scoped to one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntityAssignment {
    pub id: String,
    pub user_id: String,
    pub role: Role,
    #[serde(default)]
    pub corporate_entity_id: Option<String>,
    #[serde(default)]
    pub org_unit_id: Option<String>,
    #[serde(default = "default_true")]
    pub inherit_to_children: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Resolved scope of an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentScope<'a> {
    Global,
    Entity(&'a str),
    Unit(&'a str),
}

impl UserEntityAssignment {
    /// Scope of this assignment; `None` if both scope ids are set.
    pub fn scope(&self) -> Option<AssignmentScope<'_>> {
        match (
            self.corporate_entity_id.as_deref(),
            self.org_unit_id.as_deref(),
        ) {
            (None, None) => Some(AssignmentScope::Global),
            (Some(entity), None) => Some(AssignmentScope::Entity(entity)),
            (None, Some(unit)) => Some(AssignmentScope::Unit(unit)),
            (Some(_), Some(_)) => None,
        }
    }
}

/// Target of an effective-role lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleScope {
    pub corporate_entity_id: Option<String>,
    pub org_unit_id: Option<String>,
}

impl RoleScope {
    pub fn global() -> Self {
        Self::default()
    }

    pub fn entity(id: impl Into<String>) -> Self {
        Self {
            corporate_entity_id: Some(id.into()),
            org_unit_id: None,
        }
    }

    pub fn unit(id: impl Into<String>) -> Self {
        Self {
            corporate_entity_id: None,
            org_unit_id: Some(id.into()),
        }
    }
}

/// Capability set derived from a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSet {
    pub manage_structure: bool,
    pub edit_bsc: bool,
    pub edit_portfolio: bool,
    pub import_export: bool,
    pub manage_users: bool,
    pub view_reports: bool,
    pub manage_settings: bool,
}

const ADMIN_PERMISSIONS: PermissionSet = PermissionSet {
    manage_structure: true,
    edit_bsc: true,
    edit_portfolio: true,
    import_export: true,
    manage_users: true,
    view_reports: true,
    manage_settings: true,
};

const EDITOR_PERMISSIONS: PermissionSet = PermissionSet {
    manage_structure: false,
    edit_bsc: true,
    edit_portfolio: true,
    import_export: true,
    manage_users: false,
    view_reports: true,
    manage_settings: false,
};

const VIEWER_PERMISSIONS: PermissionSet = PermissionSet {
    manage_structure: false,
    edit_bsc: false,
    edit_portfolio: false,
    import_export: false,
    manage_users: false,
    view_reports: true,
    manage_settings: false,
};

/// Static lookup of the capabilities a role grants.
pub fn permissions_for(role: Role) -> PermissionSet {
    match role {
        Role::Admin => ADMIN_PERMISSIONS,
        Role::Editor => EDITOR_PERMISSIONS,
        Role::Viewer => VIEWER_PERMISSIONS,
    }
}

impl PermissionSet {
    /// Named capabilities in table order, for display.
    pub fn entries(&self) -> [(&'static str, bool); 7] {
        [
            ("manage structure", self.manage_structure),
            ("edit BSC", self.edit_bsc),
            ("edit portfolio", self.edit_portfolio),
            ("import/export", self.import_export),
            ("manage users", self.manage_users),
            ("view reports", self.view_reports),
            ("manage settings", self.manage_settings),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_roles_when_comparing_then_orders_by_weight() {
        assert!(Role::Admin > Role::Editor);
        assert!(Role::Editor > Role::Viewer);
        assert_eq!(Role::Viewer.max(Role::Editor), Role::Editor);
    }

    #[test]
    fn given_assignment_with_both_scopes_when_resolving_scope_then_none() {
        let assignment = UserEntityAssignment {
            id: "a1".into(),
            user_id: "u".into(),
            role: Role::Editor,
            corporate_entity_id: Some("e".into()),
            org_unit_id: Some("o".into()),
            inherit_to_children: true,
            is_active: true,
        };
        assert_eq!(assignment.scope(), None);
    }

    #[test]
    fn given_assignment_json_without_flags_when_deserializing_then_defaults_to_inherit() {
        let json = r#"{"id":"a1","userId":"u1","role":"editor","corporateEntityId":"co"}"#;
        let assignment: UserEntityAssignment = serde_json::from_str(json).unwrap();
        assert!(assignment.inherit_to_children);
        assert!(assignment.is_active);
        assert_eq!(assignment.scope(), Some(AssignmentScope::Entity("co")));
    }

    #[test]
    fn given_each_role_when_mapping_permissions_then_privileges_nest() {
        let admin = permissions_for(Role::Admin);
        let editor = permissions_for(Role::Editor);
        let viewer = permissions_for(Role::Viewer);

        for ((_, a), ((_, e), (_, v))) in admin
            .entries()
            .iter()
            .zip(editor.entries().iter().zip(viewer.entries().iter()))
        {
            assert!(*a || !*e, "editor exceeds admin");
            assert!(*e || !*v, "viewer exceeds editor");
        }
        assert!(admin.manage_users);
        assert!(!editor.manage_structure);
        assert!(viewer.view_reports);
        assert!(!viewer.edit_bsc);
    }
}
