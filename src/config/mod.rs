//! Configuration management module
//!
//! This module handles loading and validation of engine configuration
//! from configuration files and environment variables.

pub mod settings;
pub mod validation;

pub use settings::{
    Settings, I18nConfig, LocaleConfig, SourceConfig, SourceKind, OneSkyConfig,
    PropertiesConfig, SharedCatalogConfig, LockFailureAction,
    CacheConfig, CacheBackendKind, ReloadConfig, LoggingConfig,
};
