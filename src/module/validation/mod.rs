//! Package manifest validation

pub mod manifest_validator;

pub use manifest_validator::{ManifestIssue, ManifestValidator, ValidationResult};
