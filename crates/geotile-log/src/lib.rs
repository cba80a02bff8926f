//! Structured logging for geotile binaries.
//!
//! Library crates log through the `log` facade; the subscriber installed here
//! picks those records up alongside `tracing` events. Console output carries an
//! uptime timer and the emitting module. Debug builds also write JSON lines to
//! a file for post-mortem analysis.

use std::path::{Path, PathBuf};

use geotile_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config names a level.
const DEFAULT_FILTER: &str = "info,ureq=warn,rustls=warn";

/// Name of the JSON log file inside the log directory.
const LOG_FILE: &str = "geotile.log";

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.debug.log_level`. When
/// `debug_build` is set and `log_dir` can be created, a JSON file layer is
/// added as well.
///
/// # Examples
///
/// ```no_run
/// use geotile_config::Config;
/// use geotile_log::init_logging;
///
/// let config = Config::default();
/// init_logging(Some(std::path::Path::new("./logs")), true, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let filter_str = filter_directive(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        // Loader workers are named tile-loader-N.
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_file_path(log_dir))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_names(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// Filter directive derived from the config's `log_level`, or the default.
#[must_use]
pub fn filter_directive(config: Option<&Config>) -> String {
    match config {
        Some(config) if !config.debug.log_level.is_empty() => config.debug.log_level.clone(),
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Where the JSON log lands inside `log_dir`.
#[must_use]
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE)
}

/// An `EnvFilter` built from the default directive.
#[must_use]
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_quietens_http() {
        let filter_str = default_env_filter().to_string();
        assert!(filter_str.contains("ureq=warn"));
        assert!(filter_str.contains("info"));
    }

    #[test]
    fn test_filter_follows_config() {
        let mut config = Config::default();
        config.debug.log_level = "debug,geotile_tree=trace".to_string();
        assert_eq!(filter_directive(Some(&config)), "debug,geotile_tree=trace");
    }

    #[test]
    fn test_empty_config_level_falls_back() {
        let mut config = Config::default();
        config.debug.log_level.clear();
        assert_eq!(filter_directive(Some(&config)), DEFAULT_FILTER);
        assert_eq!(filter_directive(None), DEFAULT_FILTER);
    }

    #[test]
    fn test_crate_filters_parse() {
        for directive in [
            "info",
            "warn,geotile_lod=debug",
            "info,geotile_tree::loader=trace,ureq=error",
        ] {
            assert!(EnvFilter::try_new(directive).is_ok(), "failed to parse {directive}");
        }
    }

    #[test]
    fn test_log_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = log_file_path(dir.path());
        assert_eq!(path.file_name().unwrap(), "geotile.log");
        assert!(path.starts_with(dir.path()));
    }
}
