//! Module registry and discovery
//!
//! Handles descriptors, package manifests, discovery, dependency ordering and
//! the registry of live module instances.

pub mod dependencies;
pub mod descriptor;
pub mod discovery;
pub mod instance;
pub mod manifest;
pub mod table;

pub use dependencies::{DependencyResolution, ModuleDependencies};
pub use descriptor::{Descriptor, ModuleInfo, UNKNOWN_VERSION};
pub use discovery::{ModuleDiscovery, DEFAULT_PACKAGE_SUFFIX};
pub use instance::{InstanceId, ModuleInstance};
pub use manifest::{write_info_file, DeclaredModule, PackageManifest, MANIFEST_FILE_NAME};
pub use table::ModuleRegistry;
