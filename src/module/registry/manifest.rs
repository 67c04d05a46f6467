//! Package manifest parsing
//!
//! Handles parsing the `module_info.json` file at the root of a package and
//! writing it back out for packaging tools.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::module::registry::descriptor::ModuleInfo;
use crate::module::traits::ModuleError;

/// Well-known path of the manifest inside a package
pub const MANIFEST_FILE_NAME: &str = "module_info.json";

/// A module type declared by a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredModule {
    /// Constructor key looked up in the host's module factory
    #[serde(rename = "type")]
    pub type_name: String,
    /// Descriptor metadata for this type
    #[serde(flatten)]
    pub info: ModuleInfo,
}

impl DeclaredModule {
    pub fn new(type_name: impl Into<String>, info: ModuleInfo) -> Self {
        Self {
            type_name: type_name.into(),
            info,
        }
    }
}

/// Package manifest (`module_info.json` structure)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    /// Declared module types, in construction order
    #[serde(default)]
    pub modules: Vec<DeclaredModule>,
}

impl PackageManifest {
    /// Path of the manifest inside `package_dir`
    pub fn path_in(package_dir: &Path) -> PathBuf {
        package_dir.join(MANIFEST_FILE_NAME)
    }

    /// Load the manifest of the package at `package_dir`
    pub fn from_package<P: AsRef<Path>>(package_dir: P) -> Result<Self, ModuleError> {
        let manifest_path = Self::path_in(package_dir.as_ref());

        if !manifest_path.is_file() {
            return Err(ModuleError::InvalidDescriptor(format!(
                "Package {:?} does not contain {}",
                package_dir.as_ref(),
                MANIFEST_FILE_NAME
            )));
        }

        let contents = std::fs::read_to_string(&manifest_path).map_err(|e| {
            ModuleError::InvalidDescriptor(format!("Failed to read manifest file: {}", e))
        })?;

        Self::from_json(&contents)
    }

    /// Parse a manifest from JSON text
    pub fn from_json(contents: &str) -> Result<Self, ModuleError> {
        serde_json::from_str(contents).map_err(|e| {
            ModuleError::InvalidDescriptor(format!("Failed to parse manifest JSON: {}", e))
        })
    }

    /// Whether the manifest declares no constructible types
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Write a package manifest into `package_dir`
///
/// Entries with `include_in_info_file == false` are left out. Returns the path
/// of the written file.
pub fn write_info_file<P: AsRef<Path>>(
    package_dir: P,
    entries: &[DeclaredModule],
) -> Result<PathBuf, ModuleError> {
    let manifest = PackageManifest {
        modules: entries
            .iter()
            .filter(|e| e.info.include_in_info_file)
            .cloned()
            .collect(),
    };

    std::fs::create_dir_all(package_dir.as_ref())?;
    let path = PackageManifest::path_in(package_dir.as_ref());
    let contents = serde_json::to_string_pretty(&manifest)?;
    std::fs::write(&path, contents)?;
    Ok(path)
}
