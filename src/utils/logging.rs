//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for catalog lifecycle events.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;
use crate::i18n::reload::ReloadOutcome;
use crate::services::events::CatalogEvent;
use crate::utils::errors::{FetchError, I18nError, Result};

/// Initialize logging based on configuration.
///
/// `RUST_LOG` overrides the configured level. When a log file is configured
/// the returned guard must be kept alive to flush it.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| I18nError::Config(format!("Invalid log level {}: {}", config.level, e)))?;

    let stdout_layer = if config.json {
        tracing_subscriber::fmt::layer().json().with_writer(std::io::stdout).boxed()
    } else {
        tracing_subscriber::fmt::layer().with_writer(std::io::stdout).boxed()
    };

    let (file_layer, guard) = match &config.file_path {
        Some(file_path) => {
            let path = Path::new(file_path);
            let directory = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "skycommon-i18n.log".to_string());

            let file_appender = tracing_appender::rolling::daily(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| I18nError::Config(format!("Failed to initialize logging: {}", e)))?;

    info!(level = %config.level, json = config.json, "Logging initialized");
    Ok(guard)
}

/// Log a completed reload cycle
pub fn log_reload_completed(source: &str, outcome: &ReloadOutcome) {
    info!(
        source = source,
        previous_version = outcome.previous_version,
        new_version = outcome.new_version,
        locales = outcome.locales,
        entries = outcome.entries,
        dropped_entries = outcome.dropped_entries,
        "Catalog reload completed"
    );
}

/// Log a failed reload cycle
pub fn log_reload_failed(source: &str, error: &FetchError, consecutive_failures: u32, retry_in: Duration) {
    if error.is_recoverable() {
        warn!(
            source = source,
            kind = error.kind(),
            error = %error,
            consecutive_failures = consecutive_failures,
            retry_in_ms = retry_in.as_millis() as u64,
            "Catalog reload failed, keeping current catalog"
        );
    } else {
        error!(
            source = source,
            kind = error.kind(),
            error = %error,
            consecutive_failures = consecutive_failures,
            retry_in_ms = retry_in.as_millis() as u64,
            "Catalog reload failed, check OneSky credentials"
        );
    }
}

/// Log a lifecycle event received from the event bus
pub fn log_catalog_event(event: &CatalogEvent) {
    match event {
        CatalogEvent::CatalogReloaded { new_version, dropped_entry_count, locales, .. } => {
            debug!(
                event = event.name(),
                new_version = new_version,
                dropped_entries = dropped_entry_count,
                locales = locales.len(),
                "Catalog event"
            );
        }
        CatalogEvent::ReloadFailed { consecutive_failures, .. } => {
            debug!(event = event.name(), consecutive_failures = consecutive_failures, "Catalog event");
        }
        CatalogEvent::LocaleRegistered { locale } | CatalogEvent::LocaleRemoved { locale } => {
            info!(event = event.name(), locale = %locale, "Catalog event");
        }
        CatalogEvent::BundleAdded { bundle } | CatalogEvent::BundleRemoved { bundle } => {
            info!(event = event.name(), bundle = %bundle, "Catalog event");
        }
    }
}
