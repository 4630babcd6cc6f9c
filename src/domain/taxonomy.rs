//! Fixed node taxonomies and their adjacency tables.
//!
//! Both hierarchies have a closed set of node kinds. Parent/child legality is
//! answered from static tables here; the mutation engine never branches on
//! kinds itself.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of a node in the legal/corporate tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Corporation,
    Holding,
    Company,
}

impl EntityType {
    pub const ALL: [EntityType; 3] = [
        EntityType::Corporation,
        EntityType::Holding,
        EntityType::Company,
    ];

    /// Parent types this type may hang under. Empty means root-only.
    pub fn legal_parents(self) -> &'static [EntityType] {
        match self {
            EntityType::Corporation => &[],
            EntityType::Holding => &[EntityType::Corporation, EntityType::Holding],
            EntityType::Company => &[EntityType::Holding, EntityType::Corporation],
        }
    }

    /// Whether a node of this type may sit at the root (`parent = None`).
    pub fn can_be_root(self) -> bool {
        self.legal_parents().is_empty()
    }

    /// Whether `child` may be placed directly under a node of this type.
    pub fn admits_child(self, child: EntityType) -> bool {
        child.legal_parents().contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Corporation => "corporation",
            EntityType::Holding => "holding",
            EntityType::Company => "company",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "corporation" => Ok(EntityType::Corporation),
            "holding" => Ok(EntityType::Holding),
            "company" => Ok(EntityType::Company),
            other => Err(format!(
                "unknown entity type '{other}' (expected corporation, holding or company)"
            )),
        }
    }
}

/// Level of an org unit, ordered from the top of the tree down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrgLevel {
    Directorate,
    Division,
    Department,
    Section,
}

impl OrgLevel {
    pub const ALL: [OrgLevel; 4] = [
        OrgLevel::Directorate,
        OrgLevel::Division,
        OrgLevel::Department,
        OrgLevel::Section,
    ];

    /// Number of levels in the taxonomy; also the maximum length of a parent chain.
    pub const DEPTH: usize = Self::ALL.len();

    /// Zero-based depth (directorate = 0).
    pub fn depth(self) -> usize {
        self as usize
    }

    /// The only level that may sit directly below this one.
    pub fn child(self) -> Option<OrgLevel> {
        Self::ALL.get(self.depth() + 1).copied()
    }

    /// The only level that may sit directly above this one.
    pub fn parent(self) -> Option<OrgLevel> {
        self.depth().checked_sub(1).map(|d| Self::ALL[d])
    }

    pub fn can_be_root(self) -> bool {
        self.parent().is_none()
    }

    pub fn admits_child(self, child: OrgLevel) -> bool {
        self.child() == Some(child)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrgLevel::Directorate => "directorate",
            OrgLevel::Division => "division",
            OrgLevel::Department => "department",
            OrgLevel::Section => "section",
        }
    }
}

impl fmt::Display for OrgLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrgLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "directorate" => Ok(OrgLevel::Directorate),
            "division" => Ok(OrgLevel::Division),
            "department" => Ok(OrgLevel::Department),
            "section" => Ok(OrgLevel::Section),
            other => Err(format!(
                "unknown org level '{other}' (expected directorate, division, department or section)"
            )),
        }
    }
}
