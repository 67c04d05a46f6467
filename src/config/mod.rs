//! Configuration management for module-host
//!
//! Handles configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::module::registry::discovery::DEFAULT_PACKAGE_SUFFIX;

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (e.g. "info", "module_host=debug"); `RUST_LOG` takes precedence
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json_format: bool,
}

/// Module host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleHostConfig {
    /// Directory scanned for module packages
    #[serde(default = "default_modules_dir")]
    pub modules_dir: String,

    /// File name suffix identifying a package
    #[serde(default = "default_package_suffix")]
    pub package_suffix: String,

    /// Raise scan diagnostics verbosity
    #[serde(default)]
    pub debug: bool,

    /// Seconds before an initialization batch reports unfinished modules
    #[serde(default = "default_report_timeout_secs")]
    pub report_timeout_secs: u64,

    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

fn default_modules_dir() -> String {
    "modules".to_string()
}

fn default_package_suffix() -> String {
    DEFAULT_PACKAGE_SUFFIX.to_string()
}

fn default_report_timeout_secs() -> u64 {
    30
}

impl Default for ModuleHostConfig {
    fn default() -> Self {
        Self {
            modules_dir: default_modules_dir(),
            package_suffix: default_package_suffix(),
            debug: false,
            report_timeout_secs: default_report_timeout_secs(),
            logging: None,
        }
    }
}

impl ModuleHostConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ModuleHostConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ModuleHostConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.modules_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("modules_dir must not be empty"));
        }

        if self.package_suffix.is_empty() {
            return Err(anyhow::anyhow!("package_suffix must not be empty"));
        }

        if self.package_suffix.contains(std::path::is_separator) {
            return Err(anyhow::anyhow!(
                "package_suffix {:?} must not contain a path separator",
                self.package_suffix
            ));
        }

        if self.report_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "report_timeout_secs must be greater than 0"
            ));
        }

        Ok(())
    }

    pub fn modules_dir(&self) -> PathBuf {
        PathBuf::from(&self.modules_dir)
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_secs(self.report_timeout_secs)
    }
}
