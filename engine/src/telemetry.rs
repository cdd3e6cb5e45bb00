//! Telemetry and Observability
//!
//! Handles setting up `tracing-subscriber` for structured logging.
//! Supports config-driven log levels, environment variable overrides,
//! and format switching between pretty (debug) and JSON (release).
//!
//! The filter sits behind a reload handle so the level can be changed after
//! the preference store has been read (`media.gmp.log.*`).

use std::sync::OnceLock;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

fn default_filter(log_level: &str) -> String {
    format!("{},cdm_engine={}", log_level, log_level)
}

fn rust_log_set() -> bool {
    std::env::var_os(EnvFilter::DEFAULT_ENV).is_some()
}

/// Initialize the tracing subscriber with the given log level from config.
///
/// Priority: `RUST_LOG` env var > `log_level` parameter > default "info"
///
/// In debug builds: pretty-printed terminal output.
/// In release builds: JSON structured output with spans.
///
/// Calling this again after the subscriber is installed swaps the level.
pub fn init_telemetry_with_level(log_level: &str) {
    if FILTER_HANDLE.get().is_some() {
        set_filter(&default_filter(log_level));
        return;
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)));
    let (filter, handle) = reload::Layer::new(env_filter);

    #[cfg(debug_assertions)]
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().pretty().with_target(false))
        .try_init()
        .is_ok();

    #[cfg(not(debug_assertions))]
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_current_span(true))
        .try_init()
        .is_ok();

    if installed {
        let _ = FILTER_HANDLE.set(handle);
    }
}

/// Initialize the tracing subscriber with default settings.
///
/// Falls back to "info" level if no `RUST_LOG` env var is set.
/// Use `init_telemetry_with_level` when config is available.
pub fn init_telemetry() {
    init_telemetry_with_level("info");
}

/// Replace the active filter. No-op when `RUST_LOG` is set or telemetry
/// was never initialized.
pub fn set_filter(directives: &str) {
    if rust_log_set() {
        return;
    }
    if let Some(handle) = FILTER_HANDLE.get() {
        if let Err(e) = handle.reload(EnvFilter::new(directives)) {
            tracing::warn!("Failed to reload log filter: {}", e);
        }
    }
}

/// Map a Log.jsm numeric level onto a tracing level name
///
/// 0 and 10 are the "all"/"trace" levels, 20 debug, 30 config and 40 info,
/// 50 warn, 60 and above error.
pub fn level_from_numeric(level: i64) -> &'static str {
    match level {
        i64::MIN..=10 => "trace",
        11..=20 => "debug",
        21..=40 => "info",
        41..=50 => "warn",
        _ => "error",
    }
}

/// Filter directives derived from the logging preferences
///
/// Returns `None` when dumping is off, meaning the configured level stays.
pub fn filter_from_prefs(base_level: &str, dump: bool, level: Option<i64>) -> Option<String> {
    if !dump {
        return None;
    }
    let provider_level = level.map(level_from_numeric).unwrap_or("warn");
    Some(format!("{},cdm_engine={}", base_level, provider_level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_levels() {
        assert_eq!(level_from_numeric(0), "trace");
        assert_eq!(level_from_numeric(10), "trace");
        assert_eq!(level_from_numeric(20), "debug");
        assert_eq!(level_from_numeric(30), "info");
        assert_eq!(level_from_numeric(40), "info");
        assert_eq!(level_from_numeric(50), "warn");
        assert_eq!(level_from_numeric(60), "error");
        assert_eq!(level_from_numeric(70), "error");
    }

    #[test]
    fn test_dump_off_keeps_configured_level() {
        assert_eq!(filter_from_prefs("info", false, Some(0)), None);
    }

    #[test]
    fn test_dump_on_overrides_provider_target() {
        assert_eq!(
            filter_from_prefs("info", true, Some(0)).as_deref(),
            Some("info,cdm_engine=trace")
        );
        assert_eq!(
            filter_from_prefs("error", true, None).as_deref(),
            Some("error,cdm_engine=warn")
        );
    }

    #[test]
    fn test_set_filter_before_init_is_noop() {
        set_filter("debug");
    }
}
