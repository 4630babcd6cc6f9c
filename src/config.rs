//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/orgtree/orgtree.toml`
//! 3. Local config: `<project_dir>/.orgtree.toml`
//! 4. Environment variables: `ORGTREE_*` prefix

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::services::OrphanPolicy;
use crate::application::ApplicationError;
use crate::domain::{LevelNames, OrgHierarchyConfig, OrgLevel};

/// Raw hierarchy section for intermediate parsing (`None` = not specified).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawHierarchy {
    pub level_names: LevelNames,
    /// Level names; `!level` removes an inherited entry
    pub bsc_levels: Option<Vec<String>>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub snapshot: Option<PathBuf>,
    pub delete_policy: Option<OrphanPolicy>,
    pub guard_last_root: Option<bool>,
    pub hierarchy: RawHierarchy,
}

/// Unified configuration for orgtree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Snapshot file holding both hierarchies (JSON or TOML by extension)
    pub snapshot: PathBuf,
    /// Orphan policy used by `delete` when none is given
    pub delete_policy: OrphanPolicy,
    /// Refuse to delete the last root corporation
    pub guard_last_root: bool,
    /// Shape of the org tree
    pub hierarchy: OrgHierarchyConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            snapshot: default_snapshot_path(),
            delete_policy: OrphanPolicy::default(),
            guard_last_root: true,
            hierarchy: OrgHierarchyConfig::default(),
        }
    }
}

fn default_snapshot_path() -> PathBuf {
    ProjectDirs::from("", "", "orgtree")
        .map(|dirs| dirs.data_dir().join("orgtree.json"))
        .unwrap_or_else(|| PathBuf::from("orgtree.json"))
}

/// Get the XDG config directory for orgtree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "orgtree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("orgtree.toml"))
}

/// Get the path to the local config file in a project directory.
pub fn local_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".orgtree.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

fn parse_level(name: &str) -> Result<OrgLevel, ApplicationError> {
    name.parse()
        .map_err(|e: String| ApplicationError::Config { message: e })
}

/// Merge a level list with union semantics and negation support.
///
/// `["division"]` adds division, `["!department"]` removes department.
pub fn merge_levels(
    base: &[OrgLevel],
    overlay: &[String],
) -> Result<Vec<OrgLevel>, ApplicationError> {
    let mut result: BTreeSet<OrgLevel> = base.iter().copied().collect();
    for entry in overlay {
        if let Some(negated) = entry.strip_prefix('!') {
            result.remove(&parse_level(negated)?);
        } else {
            result.insert(parse_level(entry)?);
        }
    }
    Ok(result.into_iter().collect())
}

fn replace_levels(levels: &[String]) -> Result<Vec<OrgLevel>, ApplicationError> {
    levels.iter().map(|l| parse_level(l)).collect()
}

fn overlay_level_names(base: &LevelNames, overlay: &LevelNames) -> LevelNames {
    LevelNames {
        directorate: overlay.directorate.clone().or_else(|| base.directorate.clone()),
        division: overlay.division.clone().or_else(|| base.division.clone()),
        department: overlay.department.clone().or_else(|| base.department.clone()),
        section: overlay.section.clone().or_else(|| base.section.clone()),
    }
}

impl Settings {
    /// Expand shell variables and tilde in the snapshot path.
    fn expand_paths(&mut self) {
        let raw = self.snapshot.to_string_lossy().to_string();
        if let Ok(expanded) = shellexpand::full(&raw) {
            self.snapshot = PathBuf::from(expanded.as_ref());
        }
    }

    /// Apply global config onto defaults: level lists REPLACE the defaults.
    fn apply_global(&self, global: &RawSettings) -> Result<Self, ApplicationError> {
        let bsc_levels = match &global.hierarchy.bsc_levels {
            Some(levels) => replace_levels(levels)?,
            None => self.hierarchy.bsc_levels.clone(),
        };
        Ok(self.overlay(global, bsc_levels))
    }

    /// Merge local config onto self: level lists UNION with negation support.
    /// A relative snapshot path is taken relative to the project directory.
    fn merge_with(
        &self,
        local: &RawSettings,
        project_dir: &Path,
    ) -> Result<Self, ApplicationError> {
        let bsc_levels = match &local.hierarchy.bsc_levels {
            Some(levels) => merge_levels(&self.hierarchy.bsc_levels, levels)?,
            None => self.hierarchy.bsc_levels.clone(),
        };
        let mut merged = self.overlay(local, bsc_levels);
        if let Some(snapshot) = &local.snapshot {
            let expandable = snapshot.to_string_lossy().starts_with(['~', '$']);
            if snapshot.is_relative() && !expandable {
                merged.snapshot = project_dir.join(snapshot);
            }
        }
        Ok(merged)
    }

    fn overlay(&self, raw: &RawSettings, bsc_levels: Vec<OrgLevel>) -> Self {
        Self {
            snapshot: raw.snapshot.clone().unwrap_or_else(|| self.snapshot.clone()),
            delete_policy: raw.delete_policy.unwrap_or(self.delete_policy),
            guard_last_root: raw.guard_last_root.unwrap_or(self.guard_last_root),
            hierarchy: OrgHierarchyConfig {
                level_names: overlay_level_names(
                    &self.hierarchy.level_names,
                    &raw.hierarchy.level_names,
                ),
                bsc_levels,
            },
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `project_dir` - Optional project directory holding `.orgtree.toml`
    ///
    /// # Level List Semantics
    /// - Defaults → Global: REPLACE
    /// - Global → Local: UNION, `!level` removes
    /// - Any → Env vars: REPLACE
    ///
    /// The hierarchy is normalized last: directorate is always BSC-capable,
    /// section never.
    pub fn load(project_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!("loading global config {}", global_path.display());
                let raw = load_raw_settings(&global_path)?;
                current = current.apply_global(&raw)?;
            }
        }

        if let Some(dir) = project_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                debug!("loading local config {}", local_path.display());
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw, dir)?;
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();
        current.hierarchy = current.hierarchy.normalized();

        Ok(current)
    }

    /// Apply ORGTREE_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("ORGTREE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("snapshot") {
            settings.snapshot = PathBuf::from(val);
        }
        if let Ok(val) = config.get_string("delete_policy") {
            settings.delete_policy = val
                .parse()
                .map_err(|e: String| ApplicationError::Config { message: e })?;
        }
        if let Ok(val) = config.get_bool("guard_last_root") {
            settings.guard_last_root = val;
        }
        if let Ok(val) = config.get_string("hierarchy.bsc_levels") {
            let levels: Vec<String> = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            settings.hierarchy.bsc_levels = replace_levels(&levels)?;
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# orgtree configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/orgtree/orgtree.toml  (defines your baseline)
#   Local:  <project_dir>/.orgtree.toml     (project-specific settings)
#   Env:    ORGTREE_* environment variables  (explicit overrides)
#           e.g. ORGTREE_DELETE_POLICY=cascade
#                ORGTREE_HIERARCHY__BSC_LEVELS=directorate,division
#
# Level List Semantics:
#   Global config REPLACES the compiled defaults.
#   Local config UNIONS with global; "!level" removes an inherited level:
#     bsc_levels = ["!department"]

# Snapshot file holding both hierarchies (.json or .toml)
# snapshot = "orgtree.json"

# Orphan policy for delete: reparent-to-grandparent | reject-if-has-children | cascade
# delete_policy = "reparent-to-grandparent"

# Refuse to delete the last remaining root corporation
# guard_last_root = true

[hierarchy]
# Levels allowed to own a BSC (directorate always, section never)
# bsc_levels = ["directorate", "division", "department"]

[hierarchy.level_names]
# directorate = "Directorate"
# division = "Division"
# department = "Department"
# section = "Section"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
