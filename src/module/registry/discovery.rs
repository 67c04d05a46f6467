//! Package discovery
//!
//! Scans a location for candidate packages: entries whose file name ends
//! with the configured package suffix.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::module::traits::ModuleError;

/// Default suffix identifying package directories
pub const DEFAULT_PACKAGE_SUFFIX: &str = ".module";

/// Package discovery scanner
#[derive(Debug, Clone)]
pub struct ModuleDiscovery {
    /// Directory to scan for packages
    root: PathBuf,
    /// File name suffix a candidate must carry
    suffix: String,
}

impl ModuleDiscovery {
    /// Create a new discovery scanner with the default suffix
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self::with_suffix(root, DEFAULT_PACKAGE_SUFFIX)
    }

    pub fn with_suffix<P: AsRef<Path>>(root: P, suffix: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            suffix: suffix.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `path` follows the package naming convention
    pub fn is_candidate(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.len() > self.suffix.len() && n.ends_with(&self.suffix))
    }

    /// List candidate packages, sorted by path
    ///
    /// Fails with [`ModuleError::NotADirectory`] when the root is not a directory.
    pub fn discover_packages(&self) -> Result<Vec<PathBuf>, ModuleError> {
        info!("Discovering module packages in {:?}", self.root);

        if !self.root.is_dir() {
            return Err(ModuleError::NotADirectory(
                self.root.display().to_string(),
            ));
        }

        let mut packages = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if self.is_candidate(&path) {
                packages.push(path);
            } else {
                debug!("Skipping {:?}: not a package name", path);
            }
        }

        packages.sort();
        info!("Discovered {} candidate packages", packages.len());
        Ok(packages)
    }
}
