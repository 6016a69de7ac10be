//! Service container for dependency injection
//!
//! Wires settings and the table store to their I/O dependencies.

use std::path::Path;
use std::sync::Arc;

use crate::config::Settings;
use crate::domain::TreeArena;
use crate::infrastructure::error::InfraResult;
use crate::infrastructure::tables::{NeuronTables, TableStore};
use crate::infrastructure::traits::{FileSystem, RealFileSystem};

/// Container holding settings and I/O services.
pub struct ServiceContainer {
    pub settings: Arc<Settings>,
    pub fs: Arc<dyn FileSystem>,
    pub tables: TableStore,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(settings, Arc::new(RealFileSystem))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(settings: Settings, fs: Arc<dyn FileSystem>) -> Self {
        let settings = Arc::new(settings);
        let tables = TableStore::new(fs.clone());
        Self {
            settings,
            fs,
            tables,
        }
    }

    /// Load every neuron in `path` as a classified tree.
    pub fn load_neurons(&self, path: &Path) -> InfraResult<Vec<TreeArena>> {
        let analysis = &self.settings.analysis;
        self.tables
            .load(path)?
            .into_iter()
            .map(|t| t.into_tree(&analysis.soma_tag, analysis.soma_radius))
            .collect()
    }

    pub fn save_neurons<'a>(
        &self,
        path: &Path,
        trees: impl IntoIterator<Item = &'a TreeArena>,
    ) -> InfraResult<()> {
        let tables: Vec<NeuronTables> = trees.into_iter().map(NeuronTables::from_tree).collect();
        self.tables.save(path, &tables)
    }
}
