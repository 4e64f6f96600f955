//! The `log` module defines an interface to epinet's logging facilities.
//!
//! This module (re)exports the five logging macros: `error!`, `warn!`,
//! `info!`, `debug!` and `trace!` where `error!` represents the
//! highest-priority log messages and `trace!` the lowest. To emit a log
//! message, simply use one of these macros in your code:
//!
//! ```rust
//! use epinet::info;
//!
//! pub fn do_a_thing() {
//!     info!("A thing is being done.");
//! }
//! ```
//!
//! The anomaly taxonomy maps onto levels as follows: lookup, conflict, and
//! inference anomalies are reported with `warn!`; data-integrity errors that
//! abandon a lineage branch with `error!`; sweep progress with `info!`.
//!
//! Logging is configured once, before the batch run starts, with
//! `init_logging(level)`. A batch computation has no reason to reconfigure
//! the logger mid-run.

use env_logger::{Builder, WriteStyle};
pub use log::{debug, error, info, trace, warn, LevelFilter};

use std::collections::HashMap;

// Automatically determine if output supports color.
const DEFAULT_LOG_STYLE: WriteStyle = WriteStyle::Auto;

/// Holds the logging configuration assembled before the logger is installed.
///
/// `env_logger::Builder` cannot be inspected once constructed, so this struct
/// serves as the mutable proxy that accumulates the global level and any
/// per-module ("target") filters before a single `build()`.
pub struct LogConfiguration {
    /// The "default" level filter for modules without an explicitly set
    /// filter. A global filter level of `LevelFilter::Off` disables logging.
    global_log_level: LevelFilter,
    /// Whether to colorize output.
    log_style: WriteStyle,
    /// Holds module ("target") specific level filters
    module_level: HashMap<String, LevelFilter>,
}

impl Default for LogConfiguration {
    fn default() -> Self {
        LogConfiguration {
            global_log_level: LevelFilter::Warn,
            log_style: DEFAULT_LOG_STYLE,
            module_level: HashMap::new(),
        }
    }
}

impl LogConfiguration {
    #[must_use]
    pub fn with_level(level: LevelFilter) -> Self {
        LogConfiguration {
            global_log_level: level,
            ..Default::default()
        }
    }

    /// Sets a level filter for the given module path.
    pub fn set_module_filter(&mut self, module_path: &str, level_filter: LevelFilter) {
        self.module_level
            .insert(module_path.to_string(), level_filter);
    }

    /// Removes a module-specific level filter for the given module path. The
    /// global level filter will apply to the module.
    pub fn remove_module_filter(&mut self, module_path: &str) {
        self.module_level.remove(module_path);
    }

    /// Installs a global logger described by this configuration. Attempting
    /// to install a second logger is reported and otherwise ignored, which
    /// keeps repeated initialization (e.g. across tests) harmless.
    pub fn install(&self) {
        let mut builder = Builder::new();

        builder
            .filter_level(self.global_log_level)
            .write_style(self.log_style);
        // Add module specific filters.
        for (module, filter) in &self.module_level {
            builder.filter(Some(module), *filter);
        }

        if let Err(error) = builder.try_init() {
            warn!("global logger was already installed: {}", error);
        }
    }
}

/// Installs the global logger with the given level filter. A level of
/// `LevelFilter::Off` disables logging.
pub fn init_logging(level: LevelFilter) {
    LogConfiguration::with_level(level).install();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_filters_accumulate() {
        let mut configuration = LogConfiguration::with_level(LevelFilter::Info);
        configuration.set_module_filter("epinet::lineage", LevelFilter::Trace);
        configuration.set_module_filter("epinet::sweep", LevelFilter::Off);
        assert_eq!(configuration.module_level.len(), 2);

        configuration.remove_module_filter("epinet::sweep");
        assert_eq!(configuration.module_level.len(), 1);
        assert_eq!(
            configuration.module_level.get("epinet::lineage"),
            Some(&LevelFilter::Trace)
        );
    }

    #[test]
    fn install_twice_does_not_panic() {
        init_logging(LevelFilter::Off);
        init_logging(LevelFilter::Warn);
    }
}
