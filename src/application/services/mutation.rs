//! Mutation engine
//!
//! The only writer of a `TreeStore`. Every operation first builds a complete,
//! validated plan against the current state and only then applies it, so a
//! rejected edit leaves the store untouched.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{
    AssignmentScope, ChainWalk, CorporateEntity, DomainError, DomainResult, EntityPatch,
    EntityType, HierarchyNode, NewEntity, NewUnit, NodeArena, OrgUnit, RecordKind, TreeStore,
    UnitPatch, User, UserEntityAssignment,
};

/// What happens to the children of a deleted node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrphanPolicy {
    /// Children move up to the deleted node's parent, at its former position
    #[default]
    ReparentToGrandparent,
    /// Refuse to delete a node that still has children
    RejectIfHasChildren,
    /// Delete the whole subtree
    Cascade,
}

impl fmt::Display for OrphanPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrphanPolicy::ReparentToGrandparent => "reparent-to-grandparent",
            OrphanPolicy::RejectIfHasChildren => "reject-if-has-children",
            OrphanPolicy::Cascade => "cascade",
        })
    }
}

impl FromStr for OrphanPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reparent" | "reparent-to-grandparent" => Ok(OrphanPolicy::ReparentToGrandparent),
            "reject" | "reject-if-has-children" => Ok(OrphanPolicy::RejectIfHasChildren),
            "cascade" => Ok(OrphanPolicy::Cascade),
            other => Err(format!(
                "unknown orphan policy '{other}' (expected reparent, reject or cascade)"
            )),
        }
    }
}

/// Drop target of a drag-and-drop gesture, relative to a reference node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropPosition {
    Before(String),
    After(String),
    AsChild(String),
}

/// Which hierarchy a structural command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hierarchy {
    Corporate,
    Org,
}

/// Outcome of a delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub removed_entities: Vec<String>,
    pub removed_units: Vec<String>,
    /// Children moved up to the deleted node's parent
    pub reparented: Vec<String>,
    pub revoked_assignments: usize,
}

/// A validated structural move, ready to apply.
struct MovePlan {
    node: String,
    new_parent: Option<String>,
    /// Target sibling group in final order, including the moved node
    new_group: Vec<String>,
    /// Former sibling group without the moved node (empty if unchanged)
    old_group: Vec<String>,
}

impl MovePlan {
    fn apply<N: HierarchyNode>(self, arena: &mut NodeArena<N>) {
        if let Some(node) = arena.get_mut(&self.node) {
            node.set_parent_id(self.new_parent);
        }
        arena.apply_order(&self.old_group);
        arena.apply_order(&self.new_group);
    }
}

/// A validated removal, ready to apply.
struct RemovalPlan {
    removed: Vec<String>,
    /// Orphans promoted to the deleted node's parent
    promoted: Vec<String>,
    new_parent: Option<String>,
    /// Sibling group of the deleted node after the removal, in final order
    new_group: Vec<String>,
}

impl RemovalPlan {
    fn apply<N: HierarchyNode>(&self, arena: &mut NodeArena<N>) {
        for id in &self.promoted {
            if let Some(node) = arena.get_mut(id) {
                node.set_parent_id(self.new_parent.clone());
            }
        }
        for id in &self.removed {
            arena.remove(id);
        }
        arena.apply_order(&self.new_group);
    }
}

/// Applies structural edits to a `TreeStore`.
#[derive(Debug, Clone)]
pub struct MutationService {
    guard_last_root: bool,
}

impl Default for MutationService {
    fn default() -> Self {
        Self::new(true)
    }
}

impl MutationService {
    /// `guard_last_root` refuses to delete the only remaining root corporation.
    pub fn new(guard_last_root: bool) -> Self {
        Self { guard_last_root }
    }

    // ============================================================
    // ADD
    // ============================================================

    /// Add a corporate entity under `parent` (or as a root corporation).
    #[instrument(level = "debug", skip(self, store, attrs), fields(entity_type = %attrs.entity_type))]
    pub fn add_entity(
        &self,
        store: &mut TreeStore,
        attrs: NewEntity,
        parent: Option<&str>,
    ) -> DomainResult<String> {
        let parent_node = parent.map(|p| store.entities.require(p)).transpose()?;
        let id = attrs.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        if store.entities.contains(&id) {
            return Err(DomainError::DuplicateId {
                kind: RecordKind::Entity,
                id,
            });
        }

        let admitted = match parent_node {
            None => attrs.entity_type.can_be_root(),
            Some(p) => p.entity_type.admits_child(attrs.entity_type),
        };
        if !admitted {
            return Err(DomainError::InvalidParentType {
                child: format!("{} {}", attrs.entity_type, id),
                parent: parent_label(parent_node),
            });
        }

        let display_order = store.entities.children(parent, None).len() as u32;
        let entity = CorporateEntity {
            id: id.clone(),
            name: attrs.name,
            code: attrs.code,
            entity_type: attrs.entity_type,
            parent_entity_id: parent.map(str::to_string),
            display_order,
            has_bsc: attrs.has_bsc,
            bsc_scope: attrs.bsc_scope,
            is_active: attrs.is_active,
        };
        debug!("adding {} at position {}", entity.label(), display_order);
        store.entities.insert(entity)?;
        Ok(id)
    }

    /// Add an org unit to a company, under `parent` (or as a top-level directorate).
    #[instrument(level = "debug", skip(self, store, attrs), fields(level = %attrs.level, company = %attrs.company_id))]
    pub fn add_unit(
        &self,
        store: &mut TreeStore,
        attrs: NewUnit,
        parent: Option<&str>,
    ) -> DomainResult<String> {
        let company = store.entities.require(&attrs.company_id)?;
        let parent_node = parent.map(|p| store.units.require(p)).transpose()?;
        let id = attrs.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        if store.units.contains(&id) {
            return Err(DomainError::DuplicateId {
                kind: RecordKind::Unit,
                id,
            });
        }
        let label = format!("{} {}", attrs.level, id);

        if company.entity_type != EntityType::Company {
            return Err(DomainError::InvalidParentType {
                child: label,
                parent: company.label(),
            });
        }
        let admitted = match parent_node {
            None => attrs.level.can_be_root(),
            Some(p) => p.level.admits_child(attrs.level) && p.company_id == attrs.company_id,
        };
        if !admitted {
            return Err(DomainError::InvalidParentType {
                child: label,
                parent: parent_label(parent_node),
            });
        }
        if attrs.has_bsc && !store.config.allows_bsc(attrs.level) {
            return Err(DomainError::BscNotPermitted {
                id,
                level: attrs.level.to_string(),
            });
        }
        if let Some(source) = &attrs.inherit_bsc_from_id {
            store.units.require(source)?;
        }

        let display_order = store.units.children(parent, Some(&attrs.company_id)).len() as u32;
        let unit = OrgUnit {
            id: id.clone(),
            name: attrs.name,
            code: attrs.code,
            level: attrs.level,
            company_id: attrs.company_id,
            parent_id: parent.map(str::to_string),
            display_order,
            has_bsc: attrs.has_bsc,
            inherit_bsc_from_id: attrs.inherit_bsc_from_id,
            is_active: attrs.is_active,
        };
        debug!("adding {} at position {}", unit.label(), display_order);
        store.units.insert(unit)?;
        Ok(id)
    }

    // ============================================================
    // RENAME / UPDATE
    // ============================================================

    pub fn rename_entity(&self, store: &mut TreeStore, id: &str, name: &str) -> DomainResult<()> {
        self.update_entity(
            store,
            id,
            EntityPatch {
                name: Some(name.to_string()),
                ..EntityPatch::default()
            },
        )
    }

    pub fn rename_unit(&self, store: &mut TreeStore, id: &str, name: &str) -> DomainResult<()> {
        self.update_unit(
            store,
            id,
            UnitPatch {
                name: Some(name.to_string()),
                ..UnitPatch::default()
            },
        )
    }

    pub fn update_entity(
        &self,
        store: &mut TreeStore,
        id: &str,
        patch: EntityPatch,
    ) -> DomainResult<()> {
        let entity = store
            .entities
            .get_mut(id)
            .ok_or_else(|| DomainError::entity_not_found(id))?;

        if let Some(name) = patch.name {
            entity.name = name;
        }
        if let Some(code) = patch.code {
            entity.code = code;
        }
        if let Some(has_bsc) = patch.has_bsc {
            entity.has_bsc = has_bsc;
        }
        if let Some(scope) = patch.bsc_scope {
            entity.bsc_scope = scope;
        }
        if let Some(active) = patch.is_active {
            entity.is_active = active;
        }
        Ok(())
    }

    pub fn update_unit(
        &self,
        store: &mut TreeStore,
        id: &str,
        patch: UnitPatch,
    ) -> DomainResult<()> {
        let unit = store.units.require(id)?;

        if patch.has_bsc == Some(true) && !store.config.allows_bsc(unit.level) {
            return Err(DomainError::BscNotPermitted {
                id: id.to_string(),
                level: unit.level.to_string(),
            });
        }
        match &patch.inherit_bsc_from_id {
            Some(Some(source)) => {
                store.units.require(source)?;
                if source == id || bsc_chain_reaches(&store.units, source, id) {
                    return Err(DomainError::InheritanceCycle(id.to_string()));
                }
            }
            // Clearing the override makes the unit follow its parent again.
            Some(None) => {
                if let Some(parent) = unit.parent_id.as_deref() {
                    if bsc_chain_reaches(&store.units, parent, id) {
                        return Err(DomainError::InheritanceCycle(id.to_string()));
                    }
                }
            }
            None => {}
        }

        let unit = store
            .units
            .get_mut(id)
            .ok_or_else(|| DomainError::unit_not_found(id))?;
        if let Some(name) = patch.name {
            unit.name = name;
        }
        if let Some(code) = patch.code {
            unit.code = code;
        }
        if let Some(has_bsc) = patch.has_bsc {
            unit.has_bsc = has_bsc;
        }
        if let Some(source) = patch.inherit_bsc_from_id {
            unit.inherit_bsc_from_id = source;
        }
        if let Some(active) = patch.is_active {
            unit.is_active = active;
        }
        Ok(())
    }

    // ============================================================
    // REPARENT
    // ============================================================

    /// Move a corporate entity under `new_parent` at `insert_index`.
    #[instrument(level = "debug", skip(self, store))]
    pub fn reparent_entity(
        &self,
        store: &mut TreeStore,
        id: &str,
        new_parent: Option<&str>,
        insert_index: usize,
    ) -> DomainResult<()> {
        let node = store.entities.require(id)?;
        let parent_node = new_parent.map(|p| store.entities.require(p)).transpose()?;
        reject_self_move(id, new_parent)?;

        let admitted = match parent_node {
            None => node.entity_type.can_be_root(),
            Some(p) => p.entity_type.admits_child(node.entity_type),
        };
        if !admitted {
            return Err(DomainError::InvalidChildType {
                child: node.label(),
                parent: parent_label(parent_node),
            });
        }
        reject_descendant_target(&store.entities, id, new_parent)?;

        let plan = plan_move(&store.entities, node, new_parent, None, insert_index);
        plan.apply(&mut store.entities);
        Ok(())
    }

    /// Move an org unit under `new_parent` (same company) at `insert_index`.
    #[instrument(level = "debug", skip(self, store))]
    pub fn reparent_unit(
        &self,
        store: &mut TreeStore,
        id: &str,
        new_parent: Option<&str>,
        insert_index: usize,
    ) -> DomainResult<()> {
        let node = store.units.require(id)?;
        let parent_node = new_parent.map(|p| store.units.require(p)).transpose()?;
        reject_self_move(id, new_parent)?;

        let admitted = match parent_node {
            None => node.level.can_be_root(),
            Some(p) => p.level.admits_child(node.level) && p.company_id == node.company_id,
        };
        if !admitted {
            return Err(DomainError::InvalidChildType {
                child: node.label(),
                parent: parent_label(parent_node),
            });
        }
        reject_descendant_target(&store.units, id, new_parent)?;

        // Without an override, the parent is the next BSC hop; the new parent's
        // chain must not lead back here.
        if node.inherit_bsc_from_id.is_none() {
            if let Some(p) = new_parent {
                if bsc_chain_reaches(&store.units, p, id) {
                    return Err(DomainError::InheritanceCycle(id.to_string()));
                }
            }
        }

        let company = node.company_id.clone();
        let plan = plan_move(&store.units, node, new_parent, Some(&company), insert_index);
        plan.apply(&mut store.units);
        Ok(())
    }

    /// Translate a drop target into `(new_parent, insert_index)` for `node_id`.
    pub fn resolve_drop_target(
        &self,
        store: &TreeStore,
        hierarchy: Hierarchy,
        node_id: &str,
        position: &DropPosition,
    ) -> DomainResult<(Option<String>, usize)> {
        match hierarchy {
            Hierarchy::Corporate => {
                store.entities.require(node_id)?;
                drop_target(&store.entities, node_id, position)
            }
            Hierarchy::Org => {
                store.units.require(node_id)?;
                drop_target(&store.units, node_id, position)
            }
        }
    }

    /// Apply a drag-and-drop gesture as a single reparent command.
    pub fn drop_node(
        &self,
        store: &mut TreeStore,
        hierarchy: Hierarchy,
        node_id: &str,
        position: &DropPosition,
    ) -> DomainResult<()> {
        let (parent, index) = self.resolve_drop_target(store, hierarchy, node_id, position)?;
        match hierarchy {
            Hierarchy::Corporate => self.reparent_entity(store, node_id, parent.as_deref(), index),
            Hierarchy::Org => self.reparent_unit(store, node_id, parent.as_deref(), index),
        }
    }

    // ============================================================
    // DELETE
    // ============================================================

    /// Delete a corporate entity. Deleting a company also deletes its org units.
    #[instrument(level = "debug", skip(self, store))]
    pub fn delete_entity(
        &self,
        store: &mut TreeStore,
        id: &str,
        policy: OrphanPolicy,
    ) -> DomainResult<DeleteReport> {
        let entity = store.entities.require(id)?;

        if self.guard_last_root && entity.parent_entity_id.is_none() {
            let roots = store.root_corporations();
            if roots.len() == 1 && roots[0].id == id {
                return Err(DomainError::CannotDeleteRoot(id.to_string()));
            }
        }

        let grandparent = entity
            .parent_entity_id
            .as_deref()
            .map(|p| store.entities.require(p))
            .transpose()?;
        let plan = plan_removal(&store.entities, entity, policy, |child| {
            let admitted = match grandparent {
                None => child.entity_type.can_be_root(),
                Some(gp) => gp.entity_type.admits_child(child.entity_type),
            };
            admitted.then_some(()).ok_or_else(|| DomainError::InvalidChildType {
                child: child.label(),
                parent: parent_label(grandparent),
            })
        })?;

        let removed_units: Vec<String> = store
            .units
            .iter()
            .filter(|u| plan.removed.contains(&u.company_id))
            .map(|u| u.id.clone())
            .collect();
        // Units elsewhere may inherit their BSC from units going away with a company.
        if let Some(looping) = removal_closes_bsc_cycle(&store.units, &removed_units, &[], None) {
            return Err(DomainError::InheritanceCycle(looping));
        }

        debug!(
            "deleting {} entities and {} org units, promoting {} children",
            plan.removed.len(),
            removed_units.len(),
            plan.promoted.len()
        );
        plan.apply(&mut store.entities);
        for unit_id in &removed_units {
            store.units.remove(unit_id);
        }
        let revoked = cleanup_references(store, &plan.removed, &removed_units);

        Ok(DeleteReport {
            removed_entities: plan.removed,
            removed_units,
            reparented: plan.promoted,
            revoked_assignments: revoked,
        })
    }

    /// Delete an org unit.
    #[instrument(level = "debug", skip(self, store))]
    pub fn delete_unit(
        &self,
        store: &mut TreeStore,
        id: &str,
        policy: OrphanPolicy,
    ) -> DomainResult<DeleteReport> {
        let unit = store.units.require(id)?;
        let grandparent = unit
            .parent_id
            .as_deref()
            .map(|p| store.units.require(p))
            .transpose()?;
        let plan = plan_removal(&store.units, unit, policy, |child| {
            let admitted = match grandparent {
                None => child.level.can_be_root(),
                Some(gp) => gp.level.admits_child(child.level),
            };
            admitted.then_some(()).ok_or_else(|| DomainError::InvalidChildType {
                child: child.label(),
                parent: parent_label(grandparent),
            })
        })?;

        let looping = removal_closes_bsc_cycle(
            &store.units,
            &plan.removed,
            &plan.promoted,
            plan.new_parent.as_deref(),
        );
        if let Some(looping) = looping {
            return Err(DomainError::InheritanceCycle(looping));
        }

        debug!(
            "deleting {} org units, promoting {} children",
            plan.removed.len(),
            plan.promoted.len()
        );
        plan.apply(&mut store.units);
        let revoked = cleanup_references(store, &[], &plan.removed);

        Ok(DeleteReport {
            removed_entities: Vec::new(),
            removed_units: plan.removed,
            reparented: plan.promoted,
            revoked_assignments: revoked,
        })
    }

    // ============================================================
    // USERS & ASSIGNMENTS
    // ============================================================

    pub fn add_user(&self, store: &mut TreeStore, user: User) -> DomainResult<()> {
        if store.users.contains_key(&user.id) {
            return Err(DomainError::DuplicateId {
                kind: RecordKind::User,
                id: user.id,
            });
        }
        store.users.insert(user.id.clone(), user);
        Ok(())
    }

    /// Record a role assignment. An empty id is replaced by a generated one.
    pub fn grant(
        &self,
        store: &mut TreeStore,
        mut assignment: UserEntityAssignment,
    ) -> DomainResult<String> {
        if assignment.id.is_empty() {
            assignment.id = Uuid::new_v4().to_string();
        }
        if store.assignments.iter().any(|a| a.id == assignment.id) {
            return Err(DomainError::DuplicateId {
                kind: RecordKind::Assignment,
                id: assignment.id,
            });
        }
        if !store.users.contains_key(&assignment.user_id) {
            return Err(DomainError::NotFound {
                kind: RecordKind::User,
                id: assignment.user_id,
            });
        }
        match assignment.scope() {
            None => return Err(DomainError::InvalidAssignmentScope(assignment.id.clone())),
            Some(AssignmentScope::Entity(e)) => {
                store.entities.require(e)?;
            }
            Some(AssignmentScope::Unit(u)) => {
                store.units.require(u)?;
            }
            Some(AssignmentScope::Global) => {}
        }

        let id = assignment.id.clone();
        debug!("granting {} to {} ({})", assignment.role, assignment.user_id, id);
        store.assignments.push(assignment);
        Ok(id)
    }

    pub fn revoke(
        &self,
        store: &mut TreeStore,
        assignment_id: &str,
    ) -> DomainResult<UserEntityAssignment> {
        let position = store
            .assignments
            .iter()
            .position(|a| a.id == assignment_id)
            .ok_or_else(|| DomainError::NotFound {
                kind: RecordKind::Assignment,
                id: assignment_id.to_string(),
            })?;
        Ok(store.assignments.remove(position))
    }
}

fn parent_label<N: HierarchyNode>(parent: Option<&N>) -> String {
    parent.map(|p| p.label()).unwrap_or_else(|| "root".to_string())
}

fn reject_self_move(id: &str, new_parent: Option<&str>) -> DomainResult<()> {
    if new_parent == Some(id) {
        return Err(DomainError::CycleDetected {
            node: id.to_string(),
            target: id.to_string(),
        });
    }
    Ok(())
}

/// Walk the ancestor chain of the target upward looking for the moved node.
fn reject_descendant_target<N: HierarchyNode>(
    arena: &NodeArena<N>,
    id: &str,
    new_parent: Option<&str>,
) -> DomainResult<()> {
    if let Some(target) = new_parent {
        if arena.is_descendant_of(target, id) {
            return Err(DomainError::CycleDetected {
                node: id.to_string(),
                target: target.to_string(),
            });
        }
    }
    Ok(())
}

/// Whether following BSC links (override, else parent) from `from` reaches `target`.
///
/// Units owning a BSC are walked through, not stopped at: `hasBSC` can be
/// switched off later without another chain check.
fn bsc_chain_reaches(units: &NodeArena<OrgUnit>, from: &str, target: &str) -> bool {
    chain_reaches(from, target, units.max_chain(), |current| {
        units
            .get(current)
            .and_then(|u| u.bsc_link())
            .map(str::to_string)
    })
}

fn chain_reaches<F>(from: &str, target: &str, max_depth: usize, step: F) -> bool
where
    F: FnMut(&str) -> Option<String>,
{
    if from == target {
        return true;
    }
    ChainWalk::new(from, max_depth, step)
        .map_while(Result::ok)
        .any(|id| id == target)
}

/// First surviving unit whose BSC chain would loop back to itself once
/// `removed` are gone and `promoted` hang under `new_parent`. Only units whose
/// next hop changes need checking: those losing their override to a removed
/// unit and promoted orphans.
fn removal_closes_bsc_cycle(
    units: &NodeArena<OrgUnit>,
    removed: &[String],
    promoted: &[String],
    new_parent: Option<&str>,
) -> Option<String> {
    let removed: HashSet<&str> = removed.iter().map(String::as_str).collect();
    let promoted: HashSet<&str> = promoted.iter().map(String::as_str).collect();
    let link_after = |unit: &OrgUnit| -> Option<String> {
        match unit.inherit_bsc_from_id.as_deref() {
            Some(source) if !removed.contains(source) => Some(source.to_string()),
            _ if promoted.contains(unit.id.as_str()) => new_parent.map(str::to_string),
            _ => unit.parent_id.clone(),
        }
    };

    units
        .iter()
        .filter(|u| !removed.contains(u.id.as_str()))
        .filter(|u| {
            promoted.contains(u.id.as_str())
                || u.inherit_bsc_from_id
                    .as_deref()
                    .is_some_and(|src| removed.contains(src))
        })
        .find(|u| {
            link_after(*u).is_some_and(|next| {
                chain_reaches(&next, &u.id, units.max_chain(), |current| {
                    units.get(current).and_then(link_after)
                })
            })
        })
        .map(|u| u.id.clone())
}

fn plan_move<N: HierarchyNode>(
    arena: &NodeArena<N>,
    node: &N,
    new_parent: Option<&str>,
    partition: Option<&str>,
    insert_index: usize,
) -> MovePlan {
    let ids = |group: Vec<&N>| -> Vec<String> {
        group
            .into_iter()
            .map(|n| n.id().to_string())
            .filter(|id| id != node.id())
            .collect()
    };

    let mut new_group = ids(arena.children(new_parent, partition));
    let index = insert_index.min(new_group.len());
    new_group.insert(index, node.id().to_string());

    let same_group = node.parent_id() == new_parent;
    let old_group = if same_group {
        Vec::new()
    } else {
        ids(arena.sibling_group(node))
    };

    MovePlan {
        node: node.id().to_string(),
        new_parent: new_parent.map(str::to_string),
        new_group,
        old_group,
    }
}

fn plan_removal<N, F>(
    arena: &NodeArena<N>,
    node: &N,
    policy: OrphanPolicy,
    check_promotion: F,
) -> DomainResult<RemovalPlan>
where
    N: HierarchyNode,
    F: Fn(&N) -> DomainResult<()>,
{
    let children = arena.children(Some(node.id()), None);
    let mut removed = vec![node.id().to_string()];
    let mut promoted = Vec::new();

    match policy {
        OrphanPolicy::RejectIfHasChildren if !children.is_empty() => {
            return Err(DomainError::OrphanPolicyViolation {
                kind: N::KIND,
                id: node.id().to_string(),
                children: children.len(),
            });
        }
        OrphanPolicy::RejectIfHasChildren => {}
        OrphanPolicy::ReparentToGrandparent => {
            for child in &children {
                check_promotion(child)?;
            }
            promoted = children.iter().map(|c| c.id().to_string()).collect();
        }
        OrphanPolicy::Cascade => {
            removed.extend(arena.descendants(node.id()).iter().map(|n| n.id().to_string()));
        }
    }

    let mut new_group = Vec::new();
    for sibling in arena.sibling_group(node) {
        if sibling.id() == node.id() {
            new_group.extend(promoted.iter().cloned());
        } else {
            new_group.push(sibling.id().to_string());
        }
    }

    Ok(RemovalPlan {
        removed,
        promoted,
        new_parent: node.parent_id().map(str::to_string),
        new_group,
    })
}

fn drop_target<N: HierarchyNode>(
    arena: &NodeArena<N>,
    node_id: &str,
    position: &DropPosition,
) -> DomainResult<(Option<String>, usize)> {
    let siblings_without_node = |reference: &N| -> Vec<String> {
        arena
            .sibling_group(reference)
            .into_iter()
            .map(|n| n.id().to_string())
            .filter(|id| id != node_id)
            .collect()
    };

    match position {
        DropPosition::Before(reference) | DropPosition::After(reference) => {
            let node = arena.require(node_id)?;
            let reference_node = arena.require(reference)?;
            // Sibling groups never span partitions (companies, for org units).
            if reference_node.partition() != node.partition() {
                return Err(DomainError::InvalidChildType {
                    child: node.label(),
                    parent: parent_label(
                        reference_node.parent_id().and_then(|p| arena.get(p)),
                    ),
                });
            }
            let group = siblings_without_node(reference_node);
            let base = group.iter().position(|id| id == reference).unwrap_or(group.len());
            let index = if matches!(position, DropPosition::After(_)) {
                base + 1
            } else {
                base
            };
            Ok((reference_node.parent_id().map(str::to_string), index))
        }
        DropPosition::AsChild(target) => {
            arena.require(target)?;
            let count = arena
                .children(Some(target), None)
                .iter()
                .filter(|n| n.id() != node_id)
                .count();
            Ok((Some(target.clone()), count))
        }
    }
}

/// Drop assignments scoped to removed nodes and clear BSC overrides that point
/// at removed units. Returns the number of revoked assignments.
fn cleanup_references(store: &mut TreeStore, entities: &[String], units: &[String]) -> usize {
    let entities: HashSet<&str> = entities.iter().map(String::as_str).collect();
    let units: HashSet<&str> = units.iter().map(String::as_str).collect();

    let before = store.assignments.len();
    store.assignments.retain(|a| match a.scope() {
        Some(AssignmentScope::Entity(e)) => !entities.contains(e),
        Some(AssignmentScope::Unit(u)) => !units.contains(u),
        _ => true,
    });

    let dangling: Vec<String> = store
        .units
        .iter()
        .filter(|u| {
            u.inherit_bsc_from_id
                .as_deref()
                .is_some_and(|src| units.contains(src))
        })
        .map(|u| u.id.clone())
        .collect();
    for id in dangling {
        if let Some(unit) = store.units.get_mut(&id) {
            unit.inherit_bsc_from_id = None;
        }
    }

    before - store.assignments.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrgHierarchyConfig, OrgLevel};
    use rstest::rstest;

    fn store() -> TreeStore {
        let mut store = TreeStore::new(OrgHierarchyConfig::default());
        let engine = MutationService::default();
        let corp = NewEntity::new(EntityType::Corporation, "Corp", "C").with_id("corp");
        engine.add_entity(&mut store, corp, None).unwrap();
        let co = NewEntity::new(EntityType::Company, "Co", "CO").with_id("co");
        engine.add_entity(&mut store, co, Some("corp")).unwrap();
        for id in ["d1", "d2", "d3"] {
            let unit = NewUnit::new(OrgLevel::Directorate, "co", id, id).with_id(id);
            engine.add_unit(&mut store, unit, None).unwrap();
        }
        store
    }

    fn order(store: &TreeStore) -> Vec<(String, u32)> {
        store
            .units()
            .children(None, Some("co"))
            .iter()
            .map(|u| (u.id.clone(), u.display_order))
            .collect()
    }

    #[rstest]
    #[case("reparent", OrphanPolicy::ReparentToGrandparent)]
    #[case("reject-if-has-children", OrphanPolicy::RejectIfHasChildren)]
    #[case("Cascade", OrphanPolicy::Cascade)]
    fn given_policy_name_when_parsing_then_maps_to_variant(
        #[case] input: &str,
        #[case] expected: OrphanPolicy,
    ) {
        assert_eq!(input.parse::<OrphanPolicy>().unwrap(), expected);
    }

    #[test]
    fn given_unknown_policy_when_parsing_then_error() {
        assert!("orphanize".parse::<OrphanPolicy>().is_err());
    }

    #[test]
    fn given_last_sibling_when_moving_to_front_then_group_is_renumbered() {
        let mut store = store();
        MutationService::default()
            .reparent_unit(&mut store, "d3", None, 0)
            .unwrap();
        assert_eq!(
            order(&store),
            vec![("d3".into(), 0), ("d1".into(), 1), ("d2".into(), 2)]
        );
    }

    #[test]
    fn given_after_last_sibling_when_resolving_drop_then_index_is_end_of_group() {
        let store = store();
        let target = MutationService::default()
            .resolve_drop_target(
                &store,
                Hierarchy::Org,
                "d1",
                &DropPosition::After("d3".into()),
            )
            .unwrap();
        assert_eq!(target, (None, 2));
    }

    #[test]
    fn given_empty_assignment_id_when_granting_then_generates_one() {
        let mut store = store();
        let engine = MutationService::default();
        engine
            .add_user(
                &mut store,
                User {
                    id: "u1".into(),
                    name: "Ana".into(),
                    email: None,
                    is_system_admin: false,
                },
            )
            .unwrap();
        let id = engine
            .grant(
                &mut store,
                UserEntityAssignment {
                    id: String::new(),
                    user_id: "u1".into(),
                    role: crate::domain::Role::Editor,
                    corporate_entity_id: Some("co".into()),
                    org_unit_id: None,
                    inherit_to_children: true,
                    is_active: true,
                },
            )
            .unwrap();
        assert!(!id.is_empty());
        assert_eq!(engine.revoke(&mut store, &id).unwrap().user_id, "u1");
        assert!(store.assignments().is_empty());
    }
}
