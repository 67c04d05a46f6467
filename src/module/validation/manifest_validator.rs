//! Manifest validation framework
//!
//! Validates package manifests for structure before anything is constructed.
//! Names are otherwise free-form; uniqueness is enforced at registration.

use std::fmt;
use tracing::{debug, warn};

use crate::module::registry::manifest::{DeclaredModule, PackageManifest};

/// One structural problem in a manifest entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestIssue {
    /// The entry names no module type
    EmptyType { index: usize },
    /// The entry's module name is empty or whitespace
    EmptyName { index: usize },
}

impl fmt::Display for ManifestIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestIssue::EmptyType { index } => {
                write!(f, "Entry {}: module type cannot be empty", index)
            }
            ManifestIssue::EmptyName { index } => {
                write!(f, "Entry {}: module name cannot be empty", index)
            }
        }
    }
}

/// Validation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Manifest is valid
    Valid,
    /// Manifest is invalid with specific issues
    Invalid(Vec<ManifestIssue>),
}

/// Manifest validator
#[derive(Debug, Default)]
pub struct ManifestValidator;

impl ManifestValidator {
    /// Create a new manifest validator
    pub fn new() -> Self {
        Self
    }

    /// Validate a package manifest
    pub fn validate(&self, manifest: &PackageManifest) -> ValidationResult {
        let issues: Vec<ManifestIssue> = manifest
            .modules
            .iter()
            .enumerate()
            .flat_map(|(index, declared)| Self::entry_issues(index, declared))
            .collect();

        if issues.is_empty() {
            debug!(
                "Manifest validation passed ({} module types)",
                manifest.modules.len()
            );
            ValidationResult::Valid
        } else {
            warn!("Manifest validation failed: {:?}", issues);
            ValidationResult::Invalid(issues)
        }
    }

    fn entry_issues(index: usize, declared: &DeclaredModule) -> Vec<ManifestIssue> {
        let mut issues = Vec::new();
        if declared.type_name.trim().is_empty() {
            issues.push(ManifestIssue::EmptyType { index });
        }
        if declared.info.name.trim().is_empty() {
            issues.push(ManifestIssue::EmptyName { index });
        }
        issues
    }
}
