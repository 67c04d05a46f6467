//! Module loading system
//!
//! Handles package loading, module construction and load unit grouping.

pub mod factory;
pub mod loader;
pub mod unit;

pub use factory::{ModuleConstructor, ModuleFactory};
pub use loader::{ModuleLoader, ScanReport, SkippedPackage};
pub use unit::{LoadUnit, LoadUnitId};
