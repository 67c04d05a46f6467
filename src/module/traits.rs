//! Module system traits and interfaces
//!
//! Defines the contract modules implement, the contract the host implements,
//! and the error taxonomy shared by every stage of the module lifecycle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::module::registry::descriptor::Descriptor;
use crate::module::registry::instance::ModuleInstance;

/// Module lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleState {
    /// Constructed but not yet accepted by the registry
    Constructed,
    /// Registered, waiting for initialization
    Registered,
    /// Enable callback returned successfully
    Enabled,
    /// Initialization task failed; the module stays registered
    Failed(String),
    /// Disabled and removed from the registry (terminal)
    Disabled,
}

impl ModuleState {
    /// Whether the module still counts as part of the registry
    pub fn is_registered(&self) -> bool {
        matches!(
            self,
            ModuleState::Registered | ModuleState::Enabled | ModuleState::Failed(_)
        )
    }
}

/// Module trait that all modules must implement
///
/// Instances are produced by a constructor registered in a
/// [`ModuleFactory`](crate::module::loader::ModuleFactory), which hands the
/// resolved [`Descriptor`] to the module at construction time.
#[async_trait]
pub trait Module: Send + Sync {
    /// Resolved descriptor attached at construction
    ///
    /// Returning `None` makes registration fail with
    /// [`ModuleError::RequirementViolation`].
    fn descriptor(&self) -> Option<&Descriptor>;

    /// Called once all present dependencies have been enabled
    async fn enable(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Called when the module is unregistered or its load unit is torn down
    async fn disable(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }
}

/// Host contract consumed by the module system
///
/// All methods have defaults, so a host only overrides what it needs.
pub trait ModuleHost: Send + Sync {
    /// Worker pool initialization tasks are spawned on
    fn runtime(&self) -> tokio::runtime::Handle {
        tokio::runtime::Handle::current()
    }

    /// Whether the host runs in debug mode (raises scan diagnostics verbosity)
    fn is_debug(&self) -> bool {
        false
    }

    /// Post-construction hook, run once per instance before it is registered
    ///
    /// This is where a host populates module members (services, handles).
    fn prepare_module(&self, _module: &mut dyn Module) {}

    /// Notification fired after each successful registration
    fn module_registered(&self, _instance: &ModuleInstance) {}
}

/// Host with every hook left at its default
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHost {
    debug: bool,
}

impl DefaultHost {
    /// Create a host with the given debug flag
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }
}

impl ModuleHost for DefaultHost {
    fn is_debug(&self) -> bool {
        self.debug
    }
}

/// Module system errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    #[error("Module already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Module {0} cannot depend on itself")]
    SelfDependency(String),

    #[error("Module requirement violated: {0}")]
    RequirementViolation(String),

    #[error("Module not registered: {0}")]
    NotRegistered(String),

    #[error("Missing dependencies for module {module}: {missing:?}")]
    MissingDependencies { module: String, missing: Vec<String> },

    #[error("Dependency {dependency} of module {module} failed to initialize")]
    DependencyFailed { module: String, dependency: String },

    #[error("Module {module} is part of a dependency cycle")]
    DependencyCycle { module: String },

    #[error("Module {module} failed to enable: {reason}")]
    EnableFailed { module: String, reason: String },

    #[error("Module {module} failed to disable: {reason}")]
    DisableFailed { module: String, reason: String },

    #[error("Invalid module descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("{0} is not a module")]
    NotAModule(String),

    #[error("No constructor registered for module type: {0}")]
    UnknownType(String),

    #[error("{0} is not a directory")]
    NotADirectory(String),

    #[error("I/O error: {0}")]
    Io(String),

    /// Returned by a module's own enable or disable callback; the host wraps
    /// it in `EnableFailed` or `DisableFailed`
    #[error("Module operation failed: {0}")]
    OperationError(String),
}

impl From<serde_json::Error> for ModuleError {
    fn from(e: serde_json::Error) -> Self {
        ModuleError::InvalidDescriptor(e.to_string())
    }
}

impl From<std::io::Error> for ModuleError {
    fn from(e: std::io::Error) -> Self {
        ModuleError::Io(e.to_string())
    }
}
