//! Module instances and identity tokens

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::module::loader::unit::LoadUnitId;
use crate::module::registry::descriptor::Descriptor;
use crate::module::traits::{Module, ModuleState};

/// Opaque identity issued once per constructed instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(Uuid);

impl InstanceId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A constructed module together with its identity and lifecycle state
///
/// Shared as `Arc<ModuleInstance>`; cloning the `Arc` keeps the same identity,
/// constructing a new instance always yields a new one.
pub struct ModuleInstance {
    id: InstanceId,
    descriptor: Option<Arc<Descriptor>>,
    unit: Option<LoadUnitId>,
    state: Mutex<ModuleState>,
    /// Set once by `unregister`; a retired instance is never enabled or registered again
    retired: AtomicBool,
    module: tokio::sync::Mutex<Box<dyn Module>>,
}

impl ModuleInstance {
    /// Wrap a module that does not belong to any load unit
    pub fn new(module: Box<dyn Module>) -> Arc<Self> {
        Arc::new(Self::build(module, None))
    }

    pub(crate) fn in_unit(module: Box<dyn Module>, unit: LoadUnitId) -> Arc<Self> {
        Arc::new(Self::build(module, Some(unit)))
    }

    fn build(module: Box<dyn Module>, unit: Option<LoadUnitId>) -> Self {
        let descriptor = module.descriptor().cloned().map(Arc::new);
        Self {
            id: InstanceId::new(),
            descriptor,
            unit,
            state: Mutex::new(ModuleState::Constructed),
            retired: AtomicBool::new(false),
            module: tokio::sync::Mutex::new(module),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Descriptor captured at construction, if the module reported one
    pub fn descriptor(&self) -> Option<&Arc<Descriptor>> {
        self.descriptor.as_ref()
    }

    /// Module name, or `None` when no descriptor is attached
    pub fn name(&self) -> Option<&str> {
        self.descriptor.as_deref().map(Descriptor::name)
    }

    /// Load unit this instance was constructed in
    pub fn unit(&self) -> Option<LoadUnitId> {
        self.unit
    }

    pub fn state(&self) -> ModuleState {
        self.lock_state().clone()
    }

    /// Move to `state` unless already `Disabled`
    ///
    /// Returns whether the transition happened.
    pub(crate) fn set_state(&self, state: ModuleState) -> bool {
        let mut current = self.lock_state();
        if *current == ModuleState::Disabled {
            return false;
        }
        *current = state;
        true
    }

    /// Mark the instance as leaving the registry; returns `false` if it already was
    pub(crate) fn retire(&self) -> bool {
        !self.retired.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    /// Exclusive access to the module for lifecycle callbacks
    pub(crate) async fn module(&self) -> tokio::sync::MutexGuard<'_, Box<dyn Module>> {
        self.module.lock().await
    }

    // State assignment never panics halfway, so a poisoned lock still holds a valid state.
    fn lock_state(&self) -> MutexGuard<'_, ModuleState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Human-readable label for logs
    pub(crate) fn label(&self) -> String {
        match self.name() {
            Some(name) => name.to_string(),
            None => format!("<unnamed {}>", self.id),
        }
    }
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("unit", &self.unit)
            .field("state", &self.state())
            .finish()
    }
}
