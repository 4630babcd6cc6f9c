//! Store builder: validates a snapshot and assembles a `TreeStore`.

use tracing::{debug, warn};

use crate::domain::arena::NodeArena;
use crate::domain::entities::{CorporateEntity, HierarchyNode, OrgHierarchyConfig, OrgUnit};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::store::{Snapshot, TreeStore};
use crate::domain::taxonomy::EntityType;
use crate::domain::walk::WalkError;

/// Constructs a validated store from serialized records.
///
/// Every structural invariant is checked here so that the mutation engine and
/// resolvers can rely on them. Sibling orders are renumbered densely, keeping
/// the stored relative order.
pub struct StoreBuilder {
    config: OrgHierarchyConfig,
}

impl StoreBuilder {
    pub fn new(config: OrgHierarchyConfig) -> Self {
        Self {
            config: config.normalized(),
        }
    }

    pub fn build(self, snapshot: Snapshot) -> DomainResult<TreeStore> {
        let mut store = TreeStore::new(self.config);

        for entity in snapshot.corporate_entities {
            store.entities.insert(entity)?;
        }
        validate_entities(&store.entities)?;

        for unit in snapshot.org_units {
            store.units.insert(unit)?;
        }
        validate_units(&store)?;

        for user in snapshot.users {
            if store.users.contains_key(&user.id) {
                warn!("duplicate user record {}, keeping the last one", user.id);
            }
            store.users.insert(user.id.clone(), user);
        }

        for assignment in &snapshot.assignments {
            if assignment.scope().is_none() {
                return Err(DomainError::InvalidAssignmentScope(assignment.id.clone()));
            }
        }
        store.assignments = snapshot.assignments;

        store.entities.renumber_all();
        store.units.renumber_all();

        debug!(
            "built store: {} entities, {} units, {} users, {} assignments",
            store.entities.len(),
            store.units.len(),
            store.users.len(),
            store.assignments.len()
        );
        Ok(store)
    }
}

fn validate_entities(entities: &NodeArena<CorporateEntity>) -> DomainResult<()> {
    for entity in entities.iter() {
        match entity.parent_id() {
            None if !entity.entity_type.can_be_root() => {
                return Err(DomainError::InvalidParentType {
                    child: entity.label(),
                    parent: "root".into(),
                });
            }
            None => {}
            Some(parent_id) => {
                let parent = entities.require(parent_id)?;
                if !parent.entity_type.admits_child(entity.entity_type) {
                    return Err(DomainError::InvalidParentType {
                        child: entity.label(),
                        parent: parent.label(),
                    });
                }
            }
        }

        if let Err(e) = entities.ancestors(&entity.id, entities.max_chain()) {
            return Err(cycle_error(entity.id(), e));
        }
    }
    Ok(())
}

fn validate_units(store: &TreeStore) -> DomainResult<()> {
    let units = &store.units;
    for unit in units.iter() {
        let company = store
            .entities
            .get(&unit.company_id)
            .ok_or_else(|| DomainError::entity_not_found(&unit.company_id))?;
        if company.entity_type != EntityType::Company {
            return Err(DomainError::InvalidParentType {
                child: unit.label(),
                parent: company.label(),
            });
        }

        match unit.parent_id() {
            None if !unit.level.can_be_root() => {
                return Err(DomainError::InvalidParentType {
                    child: unit.label(),
                    parent: "root".into(),
                });
            }
            None => {}
            Some(parent_id) => {
                let parent = units.require(parent_id)?;
                if !parent.level.admits_child(unit.level) || parent.company_id != unit.company_id {
                    return Err(DomainError::InvalidParentType {
                        child: unit.label(),
                        parent: parent.label(),
                    });
                }
            }
        }

        if unit.has_bsc && !store.config.allows_bsc(unit.level) {
            return Err(DomainError::BscNotPermitted {
                id: unit.id.clone(),
                level: unit.level.to_string(),
            });
        }

        if let Some(source) = &unit.inherit_bsc_from_id {
            if !units.contains(source) {
                warn!("org unit {} inherits its BSC from unknown unit {}", unit.id, source);
            }
        }

        if let Err(e) = units.ancestors(&unit.id, store.unit_chain_bound()) {
            return Err(cycle_error(unit.id(), e));
        }
    }
    Ok(())
}

fn cycle_error(id: &str, e: WalkError) -> DomainError {
    DomainError::CycleDetected {
        node: id.to_string(),
        target: e.node().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::access::{Role, UserEntityAssignment};
    use crate::domain::taxonomy::OrgLevel;

    fn entity(id: &str, entity_type: EntityType, parent: Option<&str>) -> CorporateEntity {
        CorporateEntity {
            id: id.into(),
            name: id.into(),
            code: String::new(),
            entity_type,
            parent_entity_id: parent.map(String::from),
            display_order: 7,
            has_bsc: false,
            bsc_scope: Default::default(),
            is_active: true,
        }
    }

    fn unit(id: &str, level: OrgLevel, parent: Option<&str>) -> OrgUnit {
        OrgUnit {
            id: id.into(),
            name: id.into(),
            code: String::new(),
            level,
            company_id: "co".into(),
            parent_id: parent.map(String::from),
            display_order: 3,
            has_bsc: false,
            inherit_bsc_from_id: None,
            is_active: true,
        }
    }

    fn base() -> Snapshot {
        Snapshot {
            corporate_entities: vec![
                entity("corp", EntityType::Corporation, None),
                entity("co", EntityType::Company, Some("corp")),
            ],
            ..Snapshot::default()
        }
    }

    #[test]
    fn given_valid_snapshot_when_building_then_orders_are_dense() {
        let mut snapshot = base();
        snapshot.corporate_entities.push(entity("co2", EntityType::Company, Some("corp")));
        snapshot.org_units = vec![
            unit("d1", OrgLevel::Directorate, None),
            unit("v1", OrgLevel::Division, Some("d1")),
            unit("v2", OrgLevel::Division, Some("d1")),
        ];

        let store = StoreBuilder::new(OrgHierarchyConfig::default())
            .build(snapshot)
            .unwrap();

        let orders: Vec<_> = store
            .entities
            .children(Some("corp"), None)
            .iter()
            .map(|e| (e.id.clone(), e.display_order))
            .collect();
        assert_eq!(orders, vec![("co".to_string(), 0), ("co2".to_string(), 1)]);
        assert_eq!(store.unit("v2").unwrap().display_order, 1);
        assert_eq!(store.unit("d1").unwrap().display_order, 0);
    }

    #[test]
    fn given_company_at_root_when_building_then_invalid_parent_type() {
        let mut snapshot = base();
        snapshot.corporate_entities.push(entity("loose", EntityType::Company, None));
        let result = StoreBuilder::new(OrgHierarchyConfig::default()).build(snapshot);
        assert!(matches!(result, Err(DomainError::InvalidParentType { .. })));
    }

    #[test]
    fn given_holding_cycle_when_building_then_cycle_detected() {
        let mut snapshot = base();
        snapshot.corporate_entities.push(entity("h1", EntityType::Holding, Some("h2")));
        snapshot.corporate_entities.push(entity("h2", EntityType::Holding, Some("h1")));
        let result = StoreBuilder::new(OrgHierarchyConfig::default()).build(snapshot);
        assert!(matches!(result, Err(DomainError::CycleDetected { .. })));
    }

    #[test]
    fn given_unit_skipping_a_level_when_building_then_invalid_parent_type() {
        let mut snapshot = base();
        snapshot.org_units = vec![
            unit("d1", OrgLevel::Directorate, None),
            unit("dep", OrgLevel::Department, Some("d1")),
        ];
        let result = StoreBuilder::new(OrgHierarchyConfig::default()).build(snapshot);
        assert!(matches!(result, Err(DomainError::InvalidParentType { .. })));
    }

    #[test]
    fn given_section_with_bsc_when_building_then_bsc_not_permitted() {
        let mut snapshot = base();
        let mut section = unit("s", OrgLevel::Section, Some("dep"));
        section.has_bsc = true;
        snapshot.org_units = vec![
            unit("d1", OrgLevel::Directorate, None),
            unit("v1", OrgLevel::Division, Some("d1")),
            unit("dep", OrgLevel::Department, Some("v1")),
            section,
        ];
        let result = StoreBuilder::new(OrgHierarchyConfig::default()).build(snapshot);
        assert!(matches!(result, Err(DomainError::BscNotPermitted { .. })));
    }

    #[test]
    fn given_assignment_with_two_scopes_when_building_then_rejected() {
        let mut snapshot = base();
        snapshot.assignments.push(UserEntityAssignment {
            id: "a1".into(),
            user_id: "u".into(),
            role: Role::Admin,
            corporate_entity_id: Some("co".into()),
            org_unit_id: Some("d1".into()),
            inherit_to_children: true,
            is_active: true,
        });
        let result = StoreBuilder::new(OrgHierarchyConfig::default()).build(snapshot);
        assert_eq!(result.err(), Some(DomainError::InvalidAssignmentScope("a1".into())));
    }
}
