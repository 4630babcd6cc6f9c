//! Domain entities: the two hierarchies and their node records

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::taxonomy::{EntityType, OrgLevel};

/// Kind of record held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Node of the legal/corporate tree
    Entity,
    /// Node of the organizational tree, scoped per company
    Unit,
    User,
    Assignment,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Entity => f.write_str("corporate entity"),
            RecordKind::Unit => f.write_str("org unit"),
            RecordKind::User => f.write_str("user"),
            RecordKind::Assignment => f.write_str("assignment"),
        }
    }
}

/// How a corporate entity's BSC relates to its subsidiaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BscScope {
    Consolidated,
    #[default]
    Standalone,
}

impl fmt::Display for BscScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BscScope::Consolidated => f.write_str("consolidated"),
            BscScope::Standalone => f.write_str("standalone"),
        }
    }
}

impl FromStr for BscScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "consolidated" => Ok(BscScope::Consolidated),
            "standalone" => Ok(BscScope::Standalone),
            other => Err(format!(
                "unknown BSC scope '{other}' (expected consolidated or standalone)"
            )),
        }
    }
}

/// Node of the legal/corporate tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorporateEntity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub code: String,
    pub entity_type: EntityType,
    #[serde(default)]
    pub parent_entity_id: Option<String>,
    #[serde(default)]
    pub display_order: u32,
    #[serde(default, rename = "hasBSC")]
    pub has_bsc: bool,
    #[serde(default, rename = "bscScope")]
    pub bsc_scope: BscScope,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Node of the organizational tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgUnit {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub code: String,
    pub level: OrgLevel,
    /// Owning corporate entity (always of type `company`)
    pub company_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub display_order: u32,
    #[serde(default, rename = "hasBSC")]
    pub has_bsc: bool,
    /// Explicit override of where this unit takes its BSC from
    #[serde(default, rename = "inheritBSCFromId")]
    pub inherit_bsc_from_id: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

pub(crate) fn default_true() -> bool {
    true
}

/// Common view over both node types, used by the arena and the chain walker.
pub trait HierarchyNode: Clone + fmt::Debug {
    const KIND: RecordKind;

    fn id(&self) -> &str;
    fn parent_id(&self) -> Option<&str>;
    fn display_order(&self) -> u32;
    fn set_parent_id(&mut self, parent: Option<String>);
    fn set_display_order(&mut self, order: u32);

    /// Grouping of root-level siblings. Org units at the root are only
    /// siblings of other roots of the same company.
    fn partition(&self) -> Option<&str> {
        None
    }

    /// Short human-readable description, e.g. `holding Hold-B`.
    fn label(&self) -> String;
}

impl OrgUnit {
    /// Next hop of the BSC inheritance chain: the explicit override if set,
    /// otherwise the parent.
    pub fn bsc_link(&self) -> Option<&str> {
        self.inherit_bsc_from_id
            .as_deref()
            .or(self.parent_id.as_deref())
    }
}

impl HierarchyNode for CorporateEntity {
    const KIND: RecordKind = RecordKind::Entity;

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        self.parent_entity_id.as_deref()
    }

    fn display_order(&self) -> u32 {
        self.display_order
    }

    fn set_parent_id(&mut self, parent: Option<String>) {
        self.parent_entity_id = parent;
    }

    fn set_display_order(&mut self, order: u32) {
        self.display_order = order;
    }

    fn label(&self) -> String {
        format!("{} {}", self.entity_type, self.id)
    }
}

impl HierarchyNode for OrgUnit {
    const KIND: RecordKind = RecordKind::Unit;

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    fn display_order(&self) -> u32 {
        self.display_order
    }

    fn set_parent_id(&mut self, parent: Option<String>) {
        self.parent_id = parent;
    }

    fn set_display_order(&mut self, order: u32) {
        self.display_order = order;
    }

    fn partition(&self) -> Option<&str> {
        Some(&self.company_id)
    }

    fn label(&self) -> String {
        format!("{} {}", self.level, self.id)
    }
}

/// Attributes for a new corporate entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntity {
    /// Explicit id; a UUID is generated when absent
    pub id: Option<String>,
    pub name: String,
    pub code: String,
    pub entity_type: EntityType,
    pub has_bsc: bool,
    pub bsc_scope: BscScope,
    pub is_active: bool,
}

impl NewEntity {
    pub fn new(entity_type: EntityType, name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            code: code.into(),
            entity_type,
            has_bsc: false,
            bsc_scope: BscScope::default(),
            is_active: true,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_bsc(mut self, scope: BscScope) -> Self {
        self.has_bsc = true;
        self.bsc_scope = scope;
        self
    }
}

/// Attributes for a new org unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUnit {
    pub id: Option<String>,
    pub name: String,
    pub code: String,
    pub level: OrgLevel,
    pub company_id: String,
    pub has_bsc: bool,
    pub inherit_bsc_from_id: Option<String>,
    pub is_active: bool,
}

impl NewUnit {
    pub fn new(
        level: OrgLevel,
        company_id: impl Into<String>,
        name: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            code: code.into(),
            level,
            company_id: company_id.into(),
            has_bsc: false,
            inherit_bsc_from_id: None,
            is_active: true,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_bsc(mut self) -> Self {
        self.has_bsc = true;
        self
    }

    pub fn inheriting_from(mut self, unit_id: impl Into<String>) -> Self {
        self.inherit_bsc_from_id = Some(unit_id.into());
        self
    }
}

/// Field update for a corporate entity. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityPatch {
    pub name: Option<String>,
    pub code: Option<String>,
    pub has_bsc: Option<bool>,
    pub bsc_scope: Option<BscScope>,
    pub is_active: Option<bool>,
}

/// Field update for an org unit. `None` leaves a field unchanged;
/// `inherit_bsc_from_id: Some(None)` clears the override.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitPatch {
    pub name: Option<String>,
    pub code: Option<String>,
    pub has_bsc: Option<bool>,
    pub inherit_bsc_from_id: Option<Option<String>>,
    pub is_active: Option<bool>,
}

/// Display-name overrides per org level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelNames {
    pub directorate: Option<String>,
    pub division: Option<String>,
    pub department: Option<String>,
    pub section: Option<String>,
}

impl LevelNames {
    pub fn get(&self, level: OrgLevel) -> Option<&str> {
        match level {
            OrgLevel::Directorate => self.directorate.as_deref(),
            OrgLevel::Division => self.division.as_deref(),
            OrgLevel::Department => self.department.as_deref(),
            OrgLevel::Section => self.section.as_deref(),
        }
    }
}

/// Per-deployment shape of the org tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrgHierarchyConfig {
    /// Levels permitted to own a BSC
    pub bsc_levels: Vec<OrgLevel>,
    /// Display-name override per level
    pub level_names: LevelNames,
}

impl Default for OrgHierarchyConfig {
    fn default() -> Self {
        Self {
            bsc_levels: vec![
                OrgLevel::Directorate,
                OrgLevel::Division,
                OrgLevel::Department,
            ],
            level_names: LevelNames::default(),
        }
    }
}

impl OrgHierarchyConfig {
    /// Enforce the fixed rules: directorate always owns-capable, section never.
    pub fn normalized(mut self) -> Self {
        self.bsc_levels.retain(|l| *l != OrgLevel::Section);
        if !self.bsc_levels.contains(&OrgLevel::Directorate) {
            self.bsc_levels.push(OrgLevel::Directorate);
        }
        self.bsc_levels.sort();
        self.bsc_levels.dedup();
        self
    }

    pub fn allows_bsc(&self, level: OrgLevel) -> bool {
        match level {
            OrgLevel::Directorate => true,
            OrgLevel::Section => false,
            other => self.bsc_levels.contains(&other),
        }
    }

    /// Configured display name, falling back to the capitalized level name.
    pub fn level_name(&self, level: OrgLevel) -> String {
        match self.level_names.get(level) {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => {
                let raw = level.as_str();
                let mut chars = raw.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_config_without_directorate_when_normalized_then_adds_it_and_drops_section() {
        let config = OrgHierarchyConfig {
            level_names: LevelNames::default(),
            bsc_levels: vec![OrgLevel::Section, OrgLevel::Division, OrgLevel::Division],
        }
        .normalized();

        assert_eq!(
            config.bsc_levels,
            vec![OrgLevel::Directorate, OrgLevel::Division]
        );
        assert!(config.allows_bsc(OrgLevel::Directorate));
        assert!(!config.allows_bsc(OrgLevel::Department));
        assert!(!config.allows_bsc(OrgLevel::Section));
    }

    #[test]
    fn given_level_name_override_when_asking_name_then_uses_override() {
        let config = OrgHierarchyConfig {
            level_names: LevelNames {
                division: Some("Direktorat Bidang".into()),
                ..LevelNames::default()
            },
            ..OrgHierarchyConfig::default()
        };
        assert_eq!(config.level_name(OrgLevel::Division), "Direktorat Bidang");
        assert_eq!(config.level_name(OrgLevel::Section), "Section");
    }

    #[test]
    fn given_json_unit_when_deserializing_then_reads_camel_case_fields() {
        let json = r#"{
            "id": "u1", "name": "Finance", "level": "division",
            "companyId": "co", "parentId": "d1",
            "hasBSC": true, "inheritBSCFromId": null
        }"#;
        let unit: OrgUnit = serde_json::from_str(json).unwrap();
        assert_eq!(unit.level, OrgLevel::Division);
        assert_eq!(unit.parent_id.as_deref(), Some("d1"));
        assert!(unit.has_bsc);
        assert!(unit.is_active);
        assert_eq!(unit.display_order, 0);
    }
}
