//! Tests for AuthorityResolver: effective role and permissions

use orgtree::application::services::{AuthorityResolver, MutationService, RoleBasis};
use orgtree::domain::{permissions_for, Role, RoleScope, TreeStore, UserEntityAssignment};
use orgtree::util::testing::{init_test_setup, sample_store};
use rstest::rstest;

fn grant(
    store: &mut TreeStore,
    id: &str,
    role: Role,
    entity: Option<&str>,
    unit: Option<&str>,
    inherit: bool,
) {
    MutationService::default()
        .grant(
            store,
            UserEntityAssignment {
                id: id.into(),
                user_id: "U".into(),
                role,
                corporate_entity_id: entity.map(String::from),
                org_unit_id: unit.map(String::from),
                inherit_to_children: inherit,
                is_active: true,
            },
        )
        .unwrap();
}

/// Global editor plus a non-inheriting admin grant on Co-C.
fn store_with_company_admin() -> TreeStore {
    let mut store = sample_store();
    grant(&mut store, "a-global", Role::Editor, None, None, true);
    grant(&mut store, "a-co", Role::Admin, Some("Co-C"), None, false);
    store
}

#[test]
fn given_company_admin_when_asking_for_unit_role_then_bridged_admin() {
    init_test_setup();
    // Arrange
    let store = store_with_company_admin();
    let resolver = AuthorityResolver::new(&store);

    // Act
    let explanation = resolver.explain_role("U", &RoleScope::unit("Dep1"));

    // Assert
    assert_eq!(explanation.role, Role::Admin);
    assert_eq!(
        explanation.basis,
        RoleBasis::Bridged {
            company: "Co-C".into(),
            basis: Box::new(RoleBasis::Direct {
                assignment: "a-co".into()
            }),
        }
    );
}

#[test]
fn given_company_admin_when_asking_for_parent_holding_then_global_editor_only() {
    let store = store_with_company_admin();
    let resolver = AuthorityResolver::new(&store);

    let explanation = resolver.explain_role("U", &RoleScope::entity("Hold-B"));

    assert_eq!(explanation.role, Role::Editor);
    assert_eq!(
        explanation.basis,
        RoleBasis::Global {
            assignment: "a-global".into()
        }
    );
}

#[rstest]
#[case::global(RoleScope::global())]
#[case::entity(RoleScope::entity("Co-E"))]
#[case::unit(RoleScope::unit("S1"))]
#[case::unknown_node(RoleScope::unit("ghost"))]
fn given_system_admin_when_asking_anywhere_then_admin(#[case] scope: RoleScope) {
    let store = sample_store();
    let explanation = AuthorityResolver::new(&store).explain_role("sys", &scope);
    assert_eq!(explanation.role, Role::Admin);
    assert_eq!(explanation.basis, RoleBasis::SystemAdmin);
}

#[rstest]
#[case::known_user("U")]
#[case::unknown_user("nobody")]
fn given_no_assignments_when_asking_then_viewer_floor(#[case] user: &str) {
    let store = sample_store();
    let explanation = AuthorityResolver::new(&store).explain_role(user, &RoleScope::entity("Co-C"));
    assert_eq!(explanation.role, Role::Viewer);
    assert_eq!(explanation.basis, RoleBasis::Floor);
}

#[test]
fn given_inheriting_holding_grant_when_asking_for_company_then_inherited() {
    let mut store = sample_store();
    grant(&mut store, "a-hold", Role::Editor, Some("Hold-B"), None, true);

    let explanation = AuthorityResolver::new(&store).explain_role("U", &RoleScope::entity("Co-C"));

    assert_eq!(explanation.role, Role::Editor);
    assert_eq!(
        explanation.basis,
        RoleBasis::Inherited {
            assignment: "a-hold".into(),
            ancestor: "Hold-B".into()
        }
    );
}

#[test]
fn given_non_inheriting_holding_grant_when_asking_for_company_then_floor() {
    let mut store = sample_store();
    grant(&mut store, "a-hold", Role::Admin, Some("Hold-B"), None, false);
    let resolver = AuthorityResolver::new(&store);

    assert_eq!(resolver.effective_role("U", &RoleScope::entity("Hold-B")), Role::Admin);
    assert_eq!(resolver.effective_role("U", &RoleScope::entity("Co-C")), Role::Viewer);
}

#[test]
fn given_two_inheriting_ancestor_grants_when_asking_then_highest_weight_wins() {
    let mut store = sample_store();
    grant(&mut store, "a-corp", Role::Admin, Some("Corp-A"), None, true);
    grant(&mut store, "a-hold", Role::Viewer, Some("Hold-B"), None, true);

    let explanation = AuthorityResolver::new(&store).explain_role("U", &RoleScope::entity("Co-C"));

    assert_eq!(explanation.role, Role::Admin);
    assert_eq!(
        explanation.basis,
        RoleBasis::Inherited {
            assignment: "a-corp".into(),
            ancestor: "Corp-A".into()
        }
    );
}

#[test]
fn given_inactive_assignment_when_asking_then_ignored() {
    let mut store = sample_store();
    MutationService::default()
        .grant(
            &mut store,
            UserEntityAssignment {
                id: "a-off".into(),
                user_id: "U".into(),
                role: Role::Admin,
                corporate_entity_id: Some("Co-C".into()),
                org_unit_id: None,
                inherit_to_children: true,
                is_active: false,
            },
        )
        .unwrap();

    let role = AuthorityResolver::new(&store).effective_role("U", &RoleScope::entity("Co-C"));

    assert_eq!(role, Role::Viewer);
}

#[test]
fn given_unit_grant_when_asking_for_descendant_and_sibling_then_only_descendant_inherits() {
    let mut store = sample_store();
    grant(&mut store, "a-v1", Role::Editor, None, Some("V1"), true);
    let resolver = AuthorityResolver::new(&store);

    let below = resolver.explain_role("U", &RoleScope::unit("S1"));
    let beside = resolver.effective_role("U", &RoleScope::unit("V2"));

    assert_eq!(below.role, Role::Editor);
    assert_eq!(
        below.basis,
        RoleBasis::Inherited {
            assignment: "a-v1".into(),
            ancestor: "V1".into()
        }
    );
    assert_eq!(beside, Role::Viewer);
}

#[test]
fn given_unit_grant_when_asking_for_entity_scope_then_does_not_apply() {
    let mut store = sample_store();
    grant(&mut store, "a-d1", Role::Admin, None, Some("D1"), true);

    let role = AuthorityResolver::new(&store).effective_role("U", &RoleScope::entity("Co-C"));

    assert_eq!(role, Role::Viewer);
}

#[test]
fn given_scope_with_entity_and_unit_when_asking_then_no_company_bridge() {
    let mut store = sample_store();
    grant(&mut store, "a-co", Role::Admin, Some("Co-C"), None, false);
    let scope = RoleScope {
        corporate_entity_id: Some("Co-E".into()),
        org_unit_id: Some("D1".into()),
    };

    let role = AuthorityResolver::new(&store).effective_role("U", &scope);

    assert_eq!(role, Role::Viewer);
}

#[test]
fn given_company_editor_and_unit_admin_when_asking_for_unit_then_direct_admin() {
    let mut store = sample_store();
    grant(&mut store, "a-co", Role::Editor, Some("Co-C"), None, true);
    grant(&mut store, "a-v2", Role::Admin, None, Some("V2"), false);

    let explanation = AuthorityResolver::new(&store).explain_role("U", &RoleScope::unit("V2"));

    assert_eq!(explanation.role, Role::Admin);
    assert_eq!(
        explanation.basis,
        RoleBasis::Direct {
            assignment: "a-v2".into()
        }
    );
}

#[test]
fn given_bridged_admin_when_asking_permissions_then_admin_table() {
    let store = store_with_company_admin();
    let resolver = AuthorityResolver::new(&store);

    let unit_permissions = resolver.permissions("U", &RoleScope::unit("V3"));
    let holding_permissions = resolver.permissions("U", &RoleScope::entity("Hold-B"));

    assert_eq!(unit_permissions, permissions_for(Role::Admin));
    assert!(unit_permissions.manage_structure);
    assert_eq!(holding_permissions, permissions_for(Role::Editor));
    assert!(!holding_permissions.manage_users);
}

#[test]
fn given_revoked_assignment_when_asking_then_role_drops() {
    let mut store = store_with_company_admin();
    assert_eq!(
        AuthorityResolver::new(&store).effective_role("U", &RoleScope::entity("Co-C")),
        Role::Admin
    );

    MutationService::default().revoke(&mut store, "a-co").unwrap();

    assert_eq!(
        AuthorityResolver::new(&store).effective_role("U", &RoleScope::entity("Co-C")),
        Role::Editor
    );
}
