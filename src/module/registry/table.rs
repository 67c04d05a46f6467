//! Module registry
//!
//! Holds registered instances keyed by identity and by name, the load units
//! they belong to, and the completion signal of every registered name. All
//! mutation goes through one `RwLock`, so registration and the dependency
//! checks done by initialization tasks are linearizable.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::module::loader::unit::{LoadUnit, LoadUnitId};
use crate::module::registry::descriptor::Descriptor;
use crate::module::registry::instance::{InstanceId, ModuleInstance};
use crate::module::signal::{CompletionSignalTable, CompletionWaiter};
use crate::module::traits::{ModuleError, ModuleHost, ModuleState};

#[derive(Default)]
struct RegistryMaps {
    by_id: HashMap<InstanceId, Arc<ModuleInstance>>,
    by_name: HashMap<String, Arc<ModuleInstance>>,
    units: HashMap<LoadUnitId, Arc<LoadUnit>>,
}

impl RegistryMaps {
    fn unit_has_members(&self, unit: LoadUnitId) -> bool {
        self.by_id.values().any(|m| m.unit() == Some(unit))
    }

    fn release_unit_if_empty(&mut self, unit: LoadUnitId) -> bool {
        if self.unit_has_members(unit) {
            return false;
        }
        match self.units.remove(&unit) {
            Some(released) => {
                info!("Released load unit {} ({:?})", unit, released.source());
                true
            }
            None => false,
        }
    }
}

/// Registry of module instances
pub struct ModuleRegistry {
    maps: RwLock<RegistryMaps>,
    signals: CompletionSignalTable,
    host: Arc<dyn ModuleHost>,
}

impl ModuleRegistry {
    /// Create an empty registry bound to `host`
    pub fn new(host: Arc<dyn ModuleHost>) -> Self {
        Self {
            maps: RwLock::new(RegistryMaps::default()),
            signals: CompletionSignalTable::new(),
            host,
        }
    }

    pub fn host(&self) -> &Arc<dyn ModuleHost> {
        &self.host
    }

    pub fn signals(&self) -> &CompletionSignalTable {
        &self.signals
    }

    /// Register an instance
    ///
    /// Validates identity and name uniqueness and rejects self-dependencies,
    /// then runs the host post-construction hook, records the instance, arms
    /// its completion signal and notifies the host.
    pub async fn register(&self, instance: Arc<ModuleInstance>) -> Result<(), ModuleError> {
        let descriptor = instance.descriptor().cloned().ok_or_else(|| {
            ModuleError::RequirementViolation(format!(
                "Module instance {} has no descriptor",
                instance.id()
            ))
        })?;
        let name = descriptor.name().to_string();

        if name.trim().is_empty() {
            return Err(ModuleError::RequirementViolation(format!(
                "Module instance {} has a blank name",
                instance.id()
            )));
        }

        {
            let mut maps = self.maps.write().await;

            if maps.by_id.contains_key(&instance.id()) {
                return Err(ModuleError::AlreadyRegistered(format!(
                    "Module instance {} ({}) is already registered",
                    instance.id(),
                    name
                )));
            }

            if let Some(existing) = maps.by_name.get(&name) {
                return Err(ModuleError::AlreadyRegistered(format!(
                    "Module name {} of instance {} already taken by instance {}",
                    name,
                    instance.id(),
                    existing.id()
                )));
            }

            if descriptor.depends_on_self() {
                return Err(ModuleError::SelfDependency(name));
            }

            if instance.is_retired() {
                return Err(ModuleError::RequirementViolation(format!(
                    "Module {} was disabled and cannot be registered again",
                    name
                )));
            }

            {
                let mut module = instance.module().await;
                self.host.prepare_module(module.as_mut());
            }

            maps.by_id.insert(instance.id(), Arc::clone(&instance));
            maps.by_name.insert(name.clone(), Arc::clone(&instance));
            self.signals.arm(&name);
            instance.set_state(ModuleState::Registered);
        }

        info!(
            "Registered module {} v{} ({})",
            name,
            descriptor.version(),
            instance.id()
        );
        self.host.module_registered(&instance);
        Ok(())
    }

    /// Unregister an instance
    ///
    /// Removes both mappings and the completion signal, invokes the disable
    /// callback and releases the instance's load unit once its last member is
    /// gone. A failing disable callback is reported after removal completes.
    pub async fn unregister(&self, instance: &ModuleInstance) -> Result<(), ModuleError> {
        let label = instance.label();

        {
            let mut maps = self.maps.write().await;
            if maps.by_id.remove(&instance.id()).is_none() {
                return Err(ModuleError::NotRegistered(label));
            }
            instance.retire();
            if let Some(name) = instance.name() {
                if maps
                    .by_name
                    .get(name)
                    .is_some_and(|m| m.id() == instance.id())
                {
                    maps.by_name.remove(name);
                }
                self.signals.remove(name);
            }
            if let Some(unit) = instance.unit() {
                maps.release_unit_if_empty(unit);
            }
        }

        info!("Disabling module {}", label);
        let result = {
            // Held until Disabled is set; an enable in flight finishes first or never runs
            let mut module = instance.module().await;
            let result = module.disable().await;
            instance.set_state(ModuleState::Disabled);
            result
        };

        match result {
            Ok(()) => {
                info!("Unregistered module {}", label);
                Ok(())
            }
            Err(e) => {
                warn!("Module {} failed to disable cleanly: {}", label, e);
                Err(ModuleError::DisableFailed {
                    module: label,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Snapshot of every registered instance, ordered by name
    pub async fn list(&self) -> Vec<Arc<ModuleInstance>> {
        let maps = self.maps.read().await;
        let mut modules: Vec<_> = maps.by_name.values().cloned().collect();
        modules.sort_by(|a, b| a.name().cmp(&b.name()));
        modules
    }

    pub async fn get(&self, name: &str) -> Option<Arc<ModuleInstance>> {
        self.maps.read().await.by_name.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.maps.read().await.by_name.contains_key(name)
    }

    pub async fn is_registered(&self, id: InstanceId) -> bool {
        self.maps.read().await.by_id.contains_key(&id)
    }

    /// State of the module registered under `name`
    pub async fn state(&self, name: &str) -> Option<ModuleState> {
        self.get(name).await.map(|m| m.state())
    }

    /// Registered instances that are not enabled yet
    pub(crate) async fn pending_instances(&self) -> Vec<Arc<ModuleInstance>> {
        let maps = self.maps.read().await;
        let mut pending: Vec<_> = maps
            .by_name
            .values()
            .filter(|m| m.state() != ModuleState::Enabled)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.name().cmp(&b.name()));
        pending
    }

    /// Build the wait list for a module's dependencies
    ///
    /// Fails with [`ModuleError::MissingDependencies`] when any hard
    /// dependency is not registered. Absent soft dependencies are skipped.
    pub(crate) async fn collect_waiters(
        &self,
        descriptor: &Descriptor,
    ) -> Result<Vec<CompletionWaiter>, ModuleError> {
        let maps = self.maps.read().await;

        let missing: Vec<String> = descriptor
            .depend()
            .iter()
            .filter(|dep| !maps.by_name.contains_key(dep.as_str()))
            .cloned()
            .collect();

        if !missing.is_empty() {
            return Err(ModuleError::MissingDependencies {
                module: descriptor.name().to_string(),
                missing,
            });
        }

        let waiters = descriptor
            .all_dependencies()
            .into_iter()
            .filter(|dep| maps.by_name.contains_key(*dep))
            .filter_map(|dep| self.signals.waiter(dep))
            .collect();

        Ok(waiters)
    }

    /// Track a load unit so it can be released with its last member
    pub(crate) async fn attach_unit(&self, unit: Arc<LoadUnit>) {
        debug!("Attaching load unit {} ({:?})", unit.id(), unit.source());
        self.maps.write().await.units.insert(unit.id(), unit);
    }

    /// Release `unit` if none of its members is registered
    pub(crate) async fn release_unit_if_empty(&self, unit: LoadUnitId) -> bool {
        self.maps.write().await.release_unit_if_empty(unit)
    }

    /// Load units that still have registered members
    pub async fn units(&self) -> Vec<Arc<LoadUnit>> {
        self.maps.read().await.units.values().cloned().collect()
    }

    pub async fn unit(&self, id: LoadUnitId) -> Option<Arc<LoadUnit>> {
        self.maps.read().await.units.get(&id).cloned()
    }

    /// Disable and unregister exactly the members of `unit`
    ///
    /// Members are processed in reverse construction order. Every member is
    /// attempted; the first failure is returned.
    pub async fn teardown(&self, unit: &LoadUnit) -> Result<(), ModuleError> {
        info!("Tearing down load unit {} ({:?})", unit.id(), unit.source());

        let mut first_error = None;
        for member in unit.members().iter().rev() {
            if !self.is_registered(member.id()).await {
                continue;
            }
            if let Err(e) = self.unregister(member).await {
                first_error.get_or_insert(e);
            }
        }
        self.release_unit_if_empty(unit.id()).await;

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("signals", &self.signals)
            .finish_non_exhaustive()
    }
}
