//! Engine settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from configuration files and environment variables.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub i18n: I18nConfig,
    pub source: SourceConfig,
    pub cache: CacheConfig,
    pub reload: ReloadConfig,
    pub logging: LoggingConfig,
}

/// Internationalization configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct I18nConfig {
    /// Root of every fallback chain
    pub default_locale: String,
    /// Known locales and their explicit fallbacks
    #[serde(default)]
    pub locales: Vec<LocaleConfig>,
    /// Plural categories a catalog entry may use
    pub plural_categories: Vec<String>,
    /// Argument names consulted, in order, to select a plural variant
    pub pivot_arguments: Vec<String>,
}

/// A single configured locale
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocaleConfig {
    pub tag: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fallback: Option<String>,
}

/// Where catalogs come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    OneSky,
    Directory,
    Properties,
}

/// Catalog source configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    #[serde(default)]
    pub onesky: Option<OneSkyConfig>,
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub properties: Option<PropertiesConfig>,
    /// Share fetched catalogs between instances; `None` fetches independently
    #[serde(default)]
    pub shared: Option<SharedCatalogConfig>,
}

/// `.properties` bundles on disk, one file per bundle and locale
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PropertiesConfig {
    pub directory: String,
    pub bundles: Vec<String>,
}

/// What to do when the shared fetch lock cannot be taken in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LockFailureAction {
    /// Fetch from the origin anyway
    Ignore,
    /// Fail the reload cycle
    Fail,
}

/// Catalog snapshots shared through Redis so that one instance fetches
/// from the origin and the rest reuse its result
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SharedCatalogConfig {
    pub url: String,
    pub prefix: String,
    pub ttl_seconds: u64,
    pub lock: bool,
    pub lock_wait_seconds: u64,
    pub lock_lease_seconds: u64,
    pub on_lock_failure: LockFailureAction,
}

impl Default for SharedCatalogConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            prefix: "cache:".to_string(),
            ttl_seconds: 86_400,
            lock: true,
            lock_wait_seconds: 60,
            lock_lease_seconds: 60,
            on_lock_failure: LockFailureAction::Fail,
        }
    }
}

/// OneSky API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OneSkyConfig {
    pub api_url: String,
    pub project_id: u64,
    pub api_key: String,
    pub api_secret: String,
    pub bundles: Vec<String>,
    pub timeout_seconds: u64,
}

/// Which shared cache backs resolved results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Redis,
    Memory,
    Disabled,
}

/// Distributed cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub url: String,
    pub prefix: String,
    pub ttl_seconds: u64,
    pub timeout_ms: u64,
}

/// Reload coordinator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReloadConfig {
    pub interval_seconds: u64,
    pub initial_backoff_ms: u64,
    pub max_backoff_seconds: u64,
    /// Fraction of the backoff added as random jitter (0.0 - 1.0)
    pub jitter: f64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub json: bool,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("SKYCOMMON").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::I18nError> {
        super::validation::validate_settings(self)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            i18n: I18nConfig {
                default_locale: "en".to_string(),
                locales: vec![
                    LocaleConfig {
                        tag: "en".to_string(),
                        name: Some("English".to_string()),
                        fallback: None,
                    },
                ],
                plural_categories: ["zero", "one", "two", "few", "many", "other"]
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
                pivot_arguments: vec!["count".to_string(), "n".to_string()],
            },
            source: SourceConfig {
                kind: SourceKind::Directory,
                onesky: None,
                directory: Some("translations".to_string()),
                properties: None,
                shared: None,
            },
            cache: CacheConfig {
                backend: CacheBackendKind::Memory,
                url: "redis://localhost:6379".to_string(),
                prefix: "skycommon:i18n:".to_string(),
                ttl_seconds: 3600,
                timeout_ms: 50,
            },
            reload: ReloadConfig {
                interval_seconds: 300,
                initial_backoff_ms: 1000,
                max_backoff_seconds: 300,
                jitter: 0.2,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                json: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_toml() {
        let toml = r#"
            [i18n]
            default_locale = "en"
            plural_categories = ["one", "other"]
            pivot_arguments = ["count"]

            [[i18n.locales]]
            tag = "en"

            [[i18n.locales]]
            tag = "pt-BR"
            fallback = "pt"

            [source]
            kind = "onesky"

            [source.onesky]
            api_url = "https://platform.api.oneskyapp.com"
            project_id = 42
            api_key = "key"
            api_secret = "secret"
            bundles = ["messages.json"]
            timeout_seconds = 10

            [source.shared]
            url = "redis://cache:6379"
            prefix = "cache:"
            ttl_seconds = 86400
            lock = true
            lock_wait_seconds = 60
            lock_lease_seconds = 60
            on_lock_failure = "ignore"

            [cache]
            backend = "redis"
            url = "redis://cache:6379"
            prefix = "test:"
            ttl_seconds = 60
            timeout_ms = 25

            [reload]
            interval_seconds = 30
            initial_backoff_ms = 500
            max_backoff_seconds = 60
            jitter = 0.1

            [logging]
            level = "debug"
        "#;

        let settings: Settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.i18n.locales.len(), 2);
        assert_eq!(settings.i18n.locales[1].fallback.as_deref(), Some("pt"));
        assert_eq!(settings.source.kind, SourceKind::OneSky);
        assert_eq!(settings.source.onesky.unwrap().project_id, 42);
        assert_eq!(settings.source.shared.unwrap().on_lock_failure, LockFailureAction::Ignore);
        assert!(settings.source.properties.is_none());
        assert_eq!(settings.cache.backend, CacheBackendKind::Redis);
        assert!(settings.logging.file_path.is_none());
        assert!(!settings.logging.json);
    }

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
    }
}
