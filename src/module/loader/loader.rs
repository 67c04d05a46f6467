//! Module loader implementation
//!
//! Loads a package into a new load unit, constructs the declared module types
//! in order and registers every instance right after construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::module::loader::factory::ModuleFactory;
use crate::module::loader::unit::LoadUnit;
use crate::module::registry::discovery::ModuleDiscovery;
use crate::module::registry::instance::ModuleInstance;
use crate::module::registry::manifest::{DeclaredModule, PackageManifest};
use crate::module::registry::table::ModuleRegistry;
use crate::module::traits::ModuleError;
use crate::module::validation::{ManifestIssue, ManifestValidator, ValidationResult};

/// A package the scan did not load
#[derive(Debug, Clone)]
pub struct SkippedPackage {
    pub path: PathBuf,
    pub error: ModuleError,
}

/// Outcome of scanning a location
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Instances constructed and registered, in scan order
    pub loaded: Vec<Arc<ModuleInstance>>,
    /// Packages that failed to load
    pub skipped: Vec<SkippedPackage>,
}

/// Module loader for loading packages into load units
pub struct ModuleLoader {
    registry: Arc<ModuleRegistry>,
    factory: Arc<ModuleFactory>,
    validator: ManifestValidator,
}

impl ModuleLoader {
    pub fn new(registry: Arc<ModuleRegistry>, factory: Arc<ModuleFactory>) -> Self {
        Self {
            registry,
            factory,
            validator: ManifestValidator::new(),
        }
    }

    pub fn factory(&self) -> &ModuleFactory {
        &self.factory
    }

    /// Load the package at `source` into a new load unit under `parent`
    ///
    /// Registration failures are not rolled back: siblings registered before
    /// the failure stay registered and the first error is returned.
    pub async fn load(
        &self,
        source: &Path,
        parent: Option<Arc<LoadUnit>>,
    ) -> Result<Vec<Arc<ModuleInstance>>, ModuleError> {
        info!("Loading package {:?}", source);

        let manifest = PackageManifest::from_package(source)?;

        if manifest.is_empty() {
            return Err(ModuleError::NotAModule(source.display().to_string()));
        }

        if let ValidationResult::Invalid(issues) = self.validator.validate(&manifest) {
            let detail = format!(
                "{}: {}",
                source.display(),
                issues
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ")
            );
            let unnamed = issues
                .iter()
                .any(|issue| matches!(issue, ManifestIssue::EmptyName { .. }));
            return Err(if unnamed {
                ModuleError::RequirementViolation(detail)
            } else {
                ModuleError::InvalidDescriptor(detail)
            });
        }

        let unit = LoadUnit::new(source, parent);
        self.registry.attach_unit(Arc::clone(&unit)).await;

        let mut constructed = Vec::with_capacity(manifest.modules.len());
        for declared in &manifest.modules {
            let result = self.construct_and_register(declared, &unit).await;
            match result {
                Ok(instance) => constructed.push(instance),
                Err(e) => {
                    warn!(
                        "Failed to load module type {} from {:?}: {}",
                        declared.type_name, source, e
                    );
                    self.registry.release_unit_if_empty(unit.id()).await;
                    return Err(e);
                }
            }
        }

        info!(
            "Loaded {} modules from {:?} into unit {}",
            constructed.len(),
            source,
            unit.id()
        );
        Ok(constructed)
    }

    async fn construct_and_register(
        &self,
        declared: &DeclaredModule,
        unit: &Arc<LoadUnit>,
    ) -> Result<Arc<ModuleInstance>, ModuleError> {
        let constructor = self
            .factory
            .get(&declared.type_name)
            .ok_or_else(|| ModuleError::UnknownType(declared.type_name.clone()))?;

        let descriptor = declared.info.resolve(constructor.implementation_version());
        debug!(
            "Constructing module {} ({}) v{}",
            descriptor.name(),
            declared.type_name,
            descriptor.version()
        );

        let instance = ModuleInstance::in_unit(constructor.construct(descriptor), unit.id());
        self.registry.register(Arc::clone(&instance)).await?;
        unit.push(Arc::clone(&instance));
        Ok(instance)
    }

    /// Load every candidate package `discovery` finds
    ///
    /// A non-directory root fails immediately. Per-package failures are
    /// logged and collected in the report; the scan continues.
    pub async fn scan_location(
        &self,
        discovery: &ModuleDiscovery,
        parent: Option<Arc<LoadUnit>>,
        debug_mode: bool,
    ) -> Result<ScanReport, ModuleError> {
        let packages = discovery.discover_packages()?;
        let mut report = ScanReport::default();

        for package in packages {
            match self.load(&package, parent.clone()).await {
                Ok(mut instances) => report.loaded.append(&mut instances),
                Err(error) => {
                    Self::log_skip(&package, &error, debug_mode);
                    report.skipped.push(SkippedPackage {
                        path: package,
                        error,
                    });
                }
            }
        }

        info!(
            "Scan of {:?} finished: {} modules loaded, {} packages skipped",
            discovery.root(),
            report.loaded.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    fn log_skip(package: &Path, error: &ModuleError, debug_mode: bool) {
        match error {
            ModuleError::NotAModule(_) if debug_mode => {
                info!("Skipping {:?}: {}", package, error);
            }
            ModuleError::NotAModule(_) => {
                debug!("Skipping {:?}: not a module", package);
            }
            _ => {
                warn!("Skipping {:?}: {}", package, error);
            }
        }
    }
}

impl std::fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("factory", &self.factory)
            .finish_non_exhaustive()
    }
}
