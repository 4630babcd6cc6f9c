//! Service container for dependency injection
//!
//! Wires up services with their dependencies from the effective settings.

use std::sync::Arc;

use crate::application::services::MutationService;
use crate::config::Settings;
use crate::infrastructure::snapshot::SnapshotRepository;
use crate::infrastructure::traits::{FileSystem, RealFileSystem};

/// Container holding the application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    pub snapshots: SnapshotRepository,
    pub mutations: MutationService,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(settings, Arc::new(RealFileSystem))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(settings: Settings, fs: Arc<dyn FileSystem>) -> Self {
        let settings = Arc::new(settings);
        let snapshots = SnapshotRepository::new(Arc::clone(&fs));
        let mutations = MutationService::new(settings.guard_last_root);

        Self {
            settings,
            fs,
            snapshots,
            mutations,
        }
    }
}
