//! Configuration validation module
//!
//! This module provides validation functions for the engine configuration
//! to ensure all required settings are properly configured before any
//! component is built from them.

use std::collections::{HashMap, HashSet};

use crate::i18n::locale::Locale;
use crate::i18n::plural::PluralCategory;
use crate::utils::errors::{I18nError, Result};
use super::{Settings, SourceKind, CacheBackendKind};

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_i18n_config(&settings.i18n)?;
    validate_source_config(&settings.source)?;
    validate_cache_config(&settings.cache)?;
    validate_reload_config(&settings.reload)?;
    validate_logging_config(&settings.logging)?;

    Ok(())
}

/// Validate internationalization configuration
fn validate_i18n_config(config: &super::I18nConfig) -> Result<()> {
    if config.default_locale.is_empty() {
        return Err(I18nError::Config(
            "Default locale is required".to_string()
        ));
    }
    let default = Locale::parse(&config.default_locale)?;

    let mut fallbacks: HashMap<Locale, Option<Locale>> = HashMap::new();
    for locale in &config.locales {
        let tag = Locale::parse(&locale.tag)?;
        let fallback = locale.fallback.as_deref().map(Locale::parse).transpose()?;
        if fallbacks.insert(tag.clone(), fallback).is_some() {
            return Err(I18nError::Config(
                format!("Locale {} is configured more than once", tag)
            ));
        }
    }

    for start in fallbacks.keys() {
        let mut seen = HashSet::new();
        let mut current = Some(start.clone());
        while let Some(locale) = current {
            if !seen.insert(locale.clone()) {
                return Err(I18nError::Config(
                    format!("Fallback cycle detected starting at locale {}", start)
                ));
            }
            if locale == default {
                break;
            }
            current = match fallbacks.get(&locale) {
                Some(Some(explicit)) => Some(explicit.clone()),
                _ => locale.parent(),
            };
        }
    }

    if config.plural_categories.is_empty() {
        return Err(I18nError::Config(
            "At least one plural category is required".to_string()
        ));
    }
    for name in &config.plural_categories {
        if PluralCategory::parse(name).is_none() {
            return Err(I18nError::Config(
                format!("Unknown plural category: {}", name)
            ));
        }
    }
    if !config.plural_categories.iter().any(|c| c.eq_ignore_ascii_case("other")) {
        return Err(I18nError::Config(
            "Plural categories must include \"other\"".to_string()
        ));
    }

    if config.pivot_arguments.iter().all(|p| p.trim().is_empty()) {
        return Err(I18nError::Config(
            "At least one pivot argument name is required".to_string()
        ));
    }

    Ok(())
}

/// Validate catalog source configuration
fn validate_source_config(config: &super::SourceConfig) -> Result<()> {
    match config.kind {
        SourceKind::OneSky => {
            let onesky = config.onesky.as_ref().ok_or_else(|| {
                I18nError::Config("OneSky source selected but [source.onesky] is missing".to_string())
            })?;
            url::Url::parse(&onesky.api_url)?;
            if onesky.project_id == 0 {
                return Err(I18nError::Config(
                    "OneSky project ID is required".to_string()
                ));
            }
            if onesky.api_key.is_empty() || onesky.api_secret.is_empty() {
                return Err(I18nError::Config(
                    "OneSky API key and secret are required".to_string()
                ));
            }
            if onesky.bundles.is_empty() {
                return Err(I18nError::Config(
                    "At least one OneSky bundle is required".to_string()
                ));
            }
            if onesky.timeout_seconds == 0 {
                return Err(I18nError::Config(
                    "OneSky timeout must be greater than 0".to_string()
                ));
            }
        }
        SourceKind::Directory => {
            if config.directory.as_deref().map_or(true, str::is_empty) {
                return Err(I18nError::Config(
                    "Directory source selected but no directory is configured".to_string()
                ));
            }
        }
        SourceKind::Properties => {
            let properties = config.properties.as_ref().ok_or_else(|| {
                I18nError::Config("Properties source selected but [source.properties] is missing".to_string())
            })?;
            if properties.directory.is_empty() {
                return Err(I18nError::Config(
                    "Properties directory is required".to_string()
                ));
            }
            if properties.bundles.is_empty() {
                return Err(I18nError::Config(
                    "At least one properties bundle is required".to_string()
                ));
            }
        }
    }

    if let Some(shared) = &config.shared {
        validate_shared_catalog_config(shared)?;
    }

    Ok(())
}

/// Validate shared catalog configuration
fn validate_shared_catalog_config(config: &super::SharedCatalogConfig) -> Result<()> {
    url::Url::parse(&config.url)?;

    if config.ttl_seconds == 0 {
        return Err(I18nError::Config(
            "Shared catalog TTL must be greater than 0".to_string()
        ));
    }

    if config.lock && (config.lock_wait_seconds == 0 || config.lock_lease_seconds == 0) {
        return Err(I18nError::Config(
            "Shared catalog lock wait and lease must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate distributed cache configuration
fn validate_cache_config(config: &super::CacheConfig) -> Result<()> {
    if config.backend == CacheBackendKind::Redis && config.url.is_empty() {
        return Err(I18nError::Config(
            "Redis URL is required".to_string()
        ));
    }

    if config.ttl_seconds == 0 {
        return Err(I18nError::Config(
            "Cache TTL must be greater than 0".to_string()
        ));
    }

    if config.timeout_ms == 0 {
        return Err(I18nError::Config(
            "Cache timeout must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate reload coordinator configuration
fn validate_reload_config(config: &super::ReloadConfig) -> Result<()> {
    if config.interval_seconds == 0 {
        return Err(I18nError::Config(
            "Reload interval must be greater than 0".to_string()
        ));
    }

    if config.initial_backoff_ms == 0 {
        return Err(I18nError::Config(
            "Initial backoff must be greater than 0".to_string()
        ));
    }

    if config.initial_backoff_ms > config.max_backoff_seconds.saturating_mul(1000) {
        return Err(I18nError::Config(
            "Initial backoff cannot be greater than max backoff".to_string()
        ));
    }

    if !(0.0..=1.0).contains(&config.jitter) {
        return Err(I18nError::Config(
            format!("Jitter must be between 0.0 and 1.0, got {}", config.jitter)
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(I18nError::Config(
            "Log level is required".to_string()
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(I18nError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    Ok(())
}
