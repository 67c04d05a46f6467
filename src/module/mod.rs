//! Module system
//!
//! Pluggable feature units ("modules") declare hard and soft dependencies on
//! each other by name. The host loads them from packages, registers them and
//! enables them concurrently while respecting the declared ordering.
//!
//! ## Architecture
//!
//! - **Registry**: identity and name uniqueness, self-dependency rejection
//! - **Completion signals**: one-shot per-name broadcast, satisfied once a module is enabled
//! - **Initializer**: one task per module on the host runtime, ordered by signals only
//! - **Load units**: instances constructed from one package, torn down together

pub mod initializer;
pub mod loader;
pub mod manager;
pub mod registry;
pub mod signal;
pub mod traits;
pub mod validation;

pub use initializer::{ConcurrentInitializer, InitializationHandle};
pub use loader::{LoadUnit, LoadUnitId, ModuleFactory, ModuleLoader, ScanReport, SkippedPackage};
pub use manager::ModuleManager;
pub use registry::{Descriptor, InstanceId, ModuleInfo, ModuleInstance, ModuleRegistry};
pub use signal::{CompletionSignalTable, CompletionWaiter, CompletionWriter, SignalState};
pub use traits::{DefaultHost, Module, ModuleError, ModuleHost, ModuleState};
