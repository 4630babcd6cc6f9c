//! Tree Store: the in-memory state of both hierarchies plus access records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::access::{User, UserEntityAssignment};
use crate::domain::arena::NodeArena;
use crate::domain::builder::StoreBuilder;
use crate::domain::entities::{CorporateEntity, OrgHierarchyConfig, OrgUnit};
use crate::domain::error::DomainResult;
use crate::domain::taxonomy::{EntityType, OrgLevel};

/// Serialized form of the store, exchanged with the persistence collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub corporate_entities: Vec<CorporateEntity>,
    pub org_units: Vec<OrgUnit>,
    pub users: Vec<User>,
    pub assignments: Vec<UserEntityAssignment>,
}

/// Exclusive owner of entity and unit records.
///
/// Only the mutation engine writes through the crate-private accessors;
/// resolvers and queries borrow `&TreeStore` for the duration of one call.
#[derive(Debug, Clone, Default)]
pub struct TreeStore {
    pub(crate) entities: NodeArena<CorporateEntity>,
    pub(crate) units: NodeArena<OrgUnit>,
    pub(crate) users: BTreeMap<String, User>,
    pub(crate) assignments: Vec<UserEntityAssignment>,
    pub(crate) config: OrgHierarchyConfig,
}

impl TreeStore {
    /// Empty store using the given org hierarchy configuration.
    pub fn new(config: OrgHierarchyConfig) -> Self {
        Self {
            config: config.normalized(),
            ..Self::default()
        }
    }

    /// Validate a snapshot and build a store from it.
    pub fn from_snapshot(snapshot: Snapshot, config: OrgHierarchyConfig) -> DomainResult<Self> {
        StoreBuilder::new(config).build(snapshot)
    }

    /// Serialize the current state; nodes are emitted in tree pre-order.
    pub fn to_snapshot(&self) -> Snapshot {
        let corporate_entities = self
            .entities
            .preorder(None)
            .map(|(_, e)| e.clone())
            .collect();

        let mut org_units = Vec::with_capacity(self.units.len());
        for company in self.companies() {
            org_units.extend(self.units.preorder(Some(&company.id)).map(|(_, u)| u.clone()));
        }

        Snapshot {
            corporate_entities,
            org_units,
            users: self.users.values().cloned().collect(),
            assignments: self.assignments.clone(),
        }
    }

    pub fn entities(&self) -> &NodeArena<CorporateEntity> {
        &self.entities
    }

    pub fn units(&self) -> &NodeArena<OrgUnit> {
        &self.units
    }

    pub fn entity(&self, id: &str) -> Option<&CorporateEntity> {
        self.entities.get(id)
    }

    pub fn unit(&self, id: &str) -> Option<&OrgUnit> {
        self.units.get(id)
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.get(id)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn assignments(&self) -> &[UserEntityAssignment] {
        &self.assignments
    }

    pub fn assignments_for<'a>(
        &'a self,
        user_id: &'a str,
    ) -> impl Iterator<Item = &'a UserEntityAssignment> + 'a {
        self.assignments.iter().filter(move |a| a.user_id == user_id)
    }

    pub fn config(&self) -> &OrgHierarchyConfig {
        &self.config
    }

    /// All entities of type `company`, in tree order.
    pub fn companies(&self) -> Vec<&CorporateEntity> {
        self.entities
            .preorder(None)
            .map(|(_, e)| e)
            .filter(|e| e.entity_type == EntityType::Company)
            .collect()
    }

    /// Root corporations, in display order.
    pub fn root_corporations(&self) -> Vec<&CorporateEntity> {
        self.entities
            .children(None, None)
            .into_iter()
            .filter(|e| e.entity_type == EntityType::Corporation)
            .collect()
    }

    /// Upper bound for any org-unit parent chain.
    pub fn unit_chain_bound(&self) -> usize {
        OrgLevel::DEPTH
    }
}
