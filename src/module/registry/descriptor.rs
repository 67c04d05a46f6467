//! Module descriptors
//!
//! [`ModuleInfo`] is the wire shape found in a package manifest;
//! [`Descriptor`] is the resolved, immutable record attached to an instance.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Version reported when neither the manifest nor the constructor supplies one
pub const UNKNOWN_VERSION: &str = "null";

/// Module metadata as written in a package manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleInfo {
    /// Module name (unique key)
    pub name: String,
    /// Module authors, in declared order
    #[serde(default)]
    pub authors: Vec<String>,
    /// Explicit version; empty or absent falls back to the implementation version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Hard dependencies (module names)
    #[serde(default)]
    pub depend: Vec<String>,
    /// Soft dependencies (module names)
    #[serde(default)]
    pub soft_depend: Vec<String>,
    /// Whether the entry is written by [`write_info_file`](crate::module::registry::manifest::write_info_file)
    #[serde(default = "default_true")]
    pub include_in_info_file: bool,
}

fn default_true() -> bool {
    true
}

impl ModuleInfo {
    /// Create module info with a name and no dependencies
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            authors: Vec::new(),
            version: None,
            depend: Vec::new(),
            soft_depend: Vec::new(),
            include_in_info_file: true,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.authors.push(author.into());
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depend.push(name.into());
        self
    }

    pub fn soft_depends_on(mut self, name: impl Into<String>) -> Self {
        self.soft_depend.push(name.into());
        self
    }

    pub fn excluded_from_info_file(mut self) -> Self {
        self.include_in_info_file = false;
        self
    }

    /// Resolve into a [`Descriptor`]
    ///
    /// Version: explicit non-empty value, else `implementation_version`, else
    /// [`UNKNOWN_VERSION`]. Blank dependency names are dropped.
    pub fn resolve(&self, implementation_version: Option<&str>) -> Descriptor {
        let version = self
            .version
            .as_deref()
            .filter(|v| !v.is_empty())
            .or(implementation_version)
            .unwrap_or(UNKNOWN_VERSION)
            .to_string();

        Descriptor {
            name: self.name.clone(),
            version,
            authors: self.authors.clone(),
            depend: collect_names(&self.depend),
            soft_depend: collect_names(&self.soft_depend),
        }
    }
}

fn collect_names(names: &[String]) -> BTreeSet<String> {
    names
        .iter()
        .filter(|n| !n.trim().is_empty())
        .cloned()
        .collect()
}

/// Resolved module descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    name: String,
    version: String,
    authors: Vec<String>,
    depend: BTreeSet<String>,
    soft_depend: BTreeSet<String>,
}

impl Descriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn authors(&self) -> &[String] {
        &self.authors
    }

    /// Hard dependency names
    pub fn depend(&self) -> &BTreeSet<String> {
        &self.depend
    }

    /// Soft dependency names
    pub fn soft_depend(&self) -> &BTreeSet<String> {
        &self.soft_depend
    }

    /// Union of hard and soft dependency names
    pub fn all_dependencies(&self) -> BTreeSet<&str> {
        self.depend
            .iter()
            .chain(self.soft_depend.iter())
            .map(String::as_str)
            .collect()
    }

    /// Whether either dependency set names this module itself
    pub fn depends_on_self(&self) -> bool {
        self.depend.contains(&self.name) || self.soft_depend.contains(&self.name)
    }
}
