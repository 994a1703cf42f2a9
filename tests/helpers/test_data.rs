//! Test data helpers
//!
//! Sample catalog documents and settings pointing at test infrastructure.

use serde_json::{json, Value};
use skycommon_i18n::config::{
    CacheBackendKind, LocaleConfig, LockFailureAction, OneSkyConfig, PropertiesConfig, Settings,
    SharedCatalogConfig, SourceKind,
};

use super::onesky_mock::{TEST_API_KEY, TEST_API_SECRET, TEST_PROJECT_ID};

/// Multilingual export with a few deliberately malformed entries
pub fn sample_export() -> Value {
    json!({
        "en": {
            "translation": {
                "greeting": "Hello, {name}!",
                "menu": {
                    "title": "&6Main Menu",
                    "close": "Close"
                },
                "items": {
                    "one": "{n} item",
                    "other": "{n} items"
                },
                "welcome": "Welcome to {server}",
                "server_name": "&bSkyCommon",
                "broken_number": 42,
                "broken_null": null
            }
        },
        "en-GB": {
            "translation": {}
        },
        "pt": {
            "translation": {
                "greeting": "Olá, {name}!",
                "menu": { "title": "Menu principal" }
            }
        },
        "pt-BR": {
            "translation": {
                "greeting": "Oi, {name}!"
            }
        },
        "ru": {
            "translation": {
                "files_one": "{count} файл",
                "files_few": "{count} файла",
                "files_many": "{count} файлов",
                "files_other": "{count} файла"
            }
        },
        "not a locale!": {
            "translation": { "greeting": "???" }
        }
    })
}

/// Second bundle merged on top of [`sample_export`]
pub fn commands_export() -> Value {
    json!({
        "en": {
            "translation": {
                "commands": { "help": "Show help" }
            }
        }
    })
}

/// Locales known to the test configuration
pub fn test_locales() -> Vec<LocaleConfig> {
    ["en", "en-GB", "pt", "pt-BR", "ru", "de"]
        .iter()
        .map(|tag| LocaleConfig {
            tag: tag.to_string(),
            name: None,
            fallback: None,
        })
        .collect()
}

/// Settings for a OneSky source served by a mock at `api_url`
pub fn onesky_settings(api_url: &str, bundles: &[&str]) -> Settings {
    let mut settings = Settings::default();
    settings.i18n.locales = test_locales();
    settings.source.kind = SourceKind::OneSky;
    settings.source.directory = None;
    settings.source.onesky = Some(OneSkyConfig {
        api_url: api_url.to_string(),
        project_id: TEST_PROJECT_ID,
        api_key: TEST_API_KEY.to_string(),
        api_secret: TEST_API_SECRET.to_string(),
        bundles: bundles.iter().map(|b| b.to_string()).collect(),
        timeout_seconds: 2,
    });
    settings.cache.backend = CacheBackendKind::Memory;
    settings.reload.initial_backoff_ms = 10;
    settings.reload.max_backoff_seconds = 1;
    settings.reload.jitter = 0.0;
    settings
}

/// Settings for a directory source rooted at `directory`
pub fn directory_settings(directory: &std::path::Path) -> Settings {
    let mut settings = Settings::default();
    settings.i18n.locales = test_locales();
    settings.source.kind = SourceKind::Directory;
    settings.source.directory = Some(directory.display().to_string());
    settings.cache.backend = CacheBackendKind::Memory;
    settings.reload.initial_backoff_ms = 10;
    settings.reload.max_backoff_seconds = 1;
    settings.reload.jitter = 0.0;
    settings
}

/// Settings for a `.properties` source rooted at `directory`
pub fn properties_settings(directory: &std::path::Path, bundles: &[&str]) -> Settings {
    let mut settings = directory_settings(directory);
    settings.source.kind = SourceKind::Properties;
    settings.source.directory = None;
    settings.source.properties = Some(PropertiesConfig {
        directory: directory.display().to_string(),
        bundles: bundles.iter().map(|b| b.to_string()).collect(),
    });
    settings
}

/// Shared catalog settings with a short lock wait
pub fn shared_catalog_config(on_lock_failure: LockFailureAction) -> SharedCatalogConfig {
    SharedCatalogConfig {
        prefix: "test:cache:".to_string(),
        lock_wait_seconds: 1,
        on_lock_failure,
        ..SharedCatalogConfig::default()
    }
}
