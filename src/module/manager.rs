//! Module manager for orchestrating all modules
//!
//! Ties the registry, loader and initializer together behind one handle a
//! host can keep for its whole lifetime.

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ModuleHostConfig;
use crate::module::initializer::{ConcurrentInitializer, InitializationHandle};
use crate::module::loader::{LoadUnit, ModuleFactory, ModuleLoader, ScanReport};
use crate::module::registry::{
    ModuleDependencies, ModuleDiscovery, ModuleInstance, ModuleRegistry,
};
use crate::module::traits::{ModuleError, ModuleHost, ModuleState};

/// Module manager coordinates all loaded modules
#[derive(Debug)]
pub struct ModuleManager {
    registry: Arc<ModuleRegistry>,
    loader: ModuleLoader,
    initializer: ConcurrentInitializer,
    config: ModuleHostConfig,
}

impl ModuleManager {
    /// Create a manager bound to `host`, constructing modules with `factory`
    pub fn new(
        host: Arc<dyn ModuleHost>,
        factory: ModuleFactory,
        config: ModuleHostConfig,
    ) -> Self {
        let registry = Arc::new(ModuleRegistry::new(host));
        let loader = ModuleLoader::new(Arc::clone(&registry), Arc::new(factory));
        let initializer = ConcurrentInitializer::new(Arc::clone(&registry))
            .with_report_timeout(config.report_timeout());

        Self {
            registry,
            loader,
            initializer,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ModuleHostConfig {
        &self.config
    }

    /// Register an instance constructed outside any package
    pub async fn register(&self, instance: Arc<ModuleInstance>) -> Result<(), ModuleError> {
        self.registry.register(instance).await
    }

    /// Disable and unregister an instance
    pub async fn unregister(&self, instance: &ModuleInstance) -> Result<(), ModuleError> {
        self.registry.unregister(instance).await
    }

    /// Snapshot of registered instances, ordered by name
    pub async fn list(&self) -> Vec<Arc<ModuleInstance>> {
        self.registry.list().await
    }

    pub async fn get(&self, name: &str) -> Option<Arc<ModuleInstance>> {
        self.registry.get(name).await
    }

    pub async fn get_module_state(&self, name: &str) -> Option<ModuleState> {
        self.registry.state(name).await
    }

    /// Start concurrent initialization of every registered, non-enabled module
    pub async fn initialize_all(&self) -> InitializationHandle {
        self.initializer.initialize_all().await
    }

    /// Load one package into a new load unit under `parent`
    pub async fn load(
        &self,
        source: &Path,
        parent: Option<Arc<LoadUnit>>,
    ) -> Result<Vec<Arc<ModuleInstance>>, ModuleError> {
        self.loader.load(source, parent).await
    }

    /// Load every package found in `root`
    pub async fn scan_location(
        &self,
        root: &Path,
        parent: Option<Arc<LoadUnit>>,
    ) -> Result<ScanReport, ModuleError> {
        let discovery = ModuleDiscovery::with_suffix(root, &self.config.package_suffix);
        let debug_mode = self.config.debug || self.registry.host().is_debug();
        self.loader.scan_location(&discovery, parent, debug_mode).await
    }

    /// Scan the configured modules directory
    pub async fn auto_load_modules(&self) -> Result<ScanReport, ModuleError> {
        info!("Auto-discovering and loading modules");
        self.scan_location(&self.config.modules_dir(), None).await
    }

    /// Disable and unregister exactly the members of `unit`
    pub async fn teardown(&self, unit: &LoadUnit) -> Result<(), ModuleError> {
        self.registry.teardown(unit).await
    }

    /// Load units that still have registered members
    pub async fn units(&self) -> Vec<Arc<LoadUnit>> {
        self.registry.units().await
    }

    /// Unregister every module, dependents before their dependencies
    ///
    /// Every module is attempted; the first failure is returned.
    pub async fn shutdown(&self) -> Result<(), ModuleError> {
        info!("Shutting down module manager");

        let modules = self.registry.list().await;
        let resolution = ModuleDependencies::resolve(
            modules
                .iter()
                .filter_map(|m| m.descriptor().map(|d| &**d)),
        );

        let mut order: Vec<String> = resolution.load_order;
        order.reverse();
        order.extend(resolution.cyclic);

        let mut first_error = None;
        for name in order {
            let Some(instance) = self.registry.get(&name).await else {
                continue;
            };
            if let Err(e) = self.registry.unregister(&instance).await {
                warn!("Error unregistering module {}: {}", name, e);
                first_error.get_or_insert(e);
            }
        }

        info!("Module manager shut down");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
