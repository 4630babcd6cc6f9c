//! File-backed snapshot persistence (JSON or TOML, chosen by extension).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::application::{ApplicationError, ResultPathExt};
use crate::domain::{OrgHierarchyConfig, Snapshot, TreeStore};
use crate::infrastructure::error::{InfraError, InfraResult};
use crate::infrastructure::traits::FileSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    Toml,
}

impl SnapshotFormat {
    pub fn from_path(path: &Path) -> InfraResult<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            _ => Err(ApplicationError::UnsupportedFormat(path.to_path_buf()).into()),
        }
    }

    fn parse(self, path: &Path, content: &str) -> InfraResult<Snapshot> {
        match self {
            Self::Json => serde_json::from_str(content).map_err(|e| InfraError::format(path, e)),
            Self::Toml => toml::from_str(content).map_err(|e| InfraError::format(path, e)),
        }
    }

    fn render(self, path: &Path, snapshot: &Snapshot) -> InfraResult<String> {
        match self {
            Self::Json => {
                serde_json::to_string_pretty(snapshot).map_err(|e| InfraError::format(path, e))
            }
            Self::Toml => toml::to_string_pretty(snapshot).map_err(|e| InfraError::format(path, e)),
        }
    }
}

/// Loads and stores the whole tree as one snapshot file.
pub struct SnapshotRepository {
    fs: Arc<dyn FileSystem>,
}

impl SnapshotRepository {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.fs.exists(path)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn load_snapshot(&self, path: &Path) -> InfraResult<Snapshot> {
        let format = SnapshotFormat::from_path(path)?;
        if !self.fs.exists(path) {
            return Err(ApplicationError::SnapshotNotFound(path.to_path_buf()).into());
        }
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read snapshot", path)?;
        format.parse(path, &content)
    }

    /// Load and validate a snapshot into a store.
    pub fn load(&self, path: &Path, config: &OrgHierarchyConfig) -> InfraResult<TreeStore> {
        let snapshot = self.load_snapshot(path)?;
        let store = TreeStore::from_snapshot(snapshot, config.clone())?;
        debug!(
            "loaded {} entities and {} org units from {}",
            store.entities().len(),
            store.units().len(),
            path.display()
        );
        Ok(store)
    }

    /// Write the store, replacing the file in one rename.
    #[instrument(level = "debug", skip(self, store))]
    pub fn save(&self, path: &Path, store: &TreeStore) -> InfraResult<()> {
        let format = SnapshotFormat::from_path(path)?;
        let content = format.render(path, &store.to_snapshot())?;

        self.fs
            .ensure_parent(path)
            .map_err(|e| InfraError::io(format!("create parent of {}", path.display()), e))?;
        let staging = staging_path(path);
        self.fs
            .write(&staging, &content)
            .map_err(|e| InfraError::io(format!("write {}", staging.display()), e))?;
        self.fs
            .rename(&staging, path)
            .map_err(|e| InfraError::io(format!("replace {}", path.display()), e))?;
        debug!("saved snapshot to {}", path.display());
        Ok(())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
