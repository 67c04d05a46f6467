//! Module Host - dependency-aware loading and concurrent initialization of pluggable modules
//!
//! A host application registers module constructors in a
//! [`ModuleFactory`](module::ModuleFactory), scans a directory of packages,
//! and lets the [`ModuleManager`](module::ModuleManager) register and enable
//! every module once its dependencies are enabled.
//!
//! ## Design Principles
//!
//! 1. **Name-only dependencies**: a dependency is satisfied by a registered module of that name
//! 2. **Signal ordering**: dependents wait on per-name completion signals, never on each other
//! 3. **Isolated failure**: a failing module fails itself and its dependents, nothing else
//! 4. **Unit teardown**: everything loaded from one package can be removed together

pub mod config;
pub mod module;
pub mod utils;

pub use config::{LoggingConfig, ModuleHostConfig};
pub use module::{
    DefaultHost, Descriptor, InitializationHandle, LoadUnit, Module, ModuleError, ModuleFactory,
    ModuleHost, ModuleInfo, ModuleInstance, ModuleManager, ModuleState,
};
