//! Logging initialization for module hosts
//!
//! - Respects RUST_LOG environment variable
//! - Allows configuration via config file
//! - Safe to call more than once; only the first call installs a subscriber
//!
//! # Usage
//! ```rust
//! use module_host::utils::init_logging;
//!
//! init_logging(None); // Uses RUST_LOG or defaults to "info"
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

const DEFAULT_FILTER: &str = "info";

/// Pick the filter: RUST_LOG first, then the config filter, then "info"
fn build_filter(filter: Option<&str>) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(filter.unwrap_or(DEFAULT_FILTER))
}

/// Initialize human-readable logging to stderr
///
/// # Arguments
/// * `filter` - Optional log filter from config (e.g. "info",
///   "module_host=debug,module_host::module::signal=trace").
///   If None, uses RUST_LOG or defaults to "info"
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging(filter: Option<&str>) -> bool {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(build_filter(filter))
        .try_init()
        .is_ok()
}

/// Initialize logging with JSON output for log aggregation systems
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) -> bool {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(build_filter(filter))
        .try_init()
        .is_ok()
}

/// Initialize logging from the host's [`LoggingConfig`]
///
/// Falls back to human-readable output when `json_format` is set but the
/// `json-logging` feature is disabled.
///
/// ```rust
/// use module_host::config::ModuleHostConfig;
/// use module_host::utils::init_logging_from_config;
///
/// let config = ModuleHostConfig::default();
/// init_logging_from_config(config.logging.as_ref());
/// ```
pub fn init_logging_from_config(config: Option<&LoggingConfig>) -> bool {
    let filter = config.and_then(|c| c.filter.as_deref());

    if config.is_some_and(|c| c.json_format) {
        #[cfg(feature = "json-logging")]
        {
            return init_json_logging(filter);
        }
    }
    init_logging(filter)
}
