//! Simple test infrastructure
//!
//! Logging setup, scratch translation directories and misbehaving cache
//! backends.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use skycommon_i18n::services::cache::{CacheBackend, SharedStore};
use skycommon_i18n::utils::errors::{I18nError, Result};

static INIT: Once = Once::new();

/// Initialize test environment
pub fn init_test_env() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt::try_init();
    });
}

/// Write `<dir>/<locale>.json`
pub fn write_translation_file(dir: &Path, locale: &str, translations: &Value) {
    let content = serde_json::to_string_pretty(translations).expect("serializable translations");
    std::fs::write(dir.join(format!("{}.json", locale)), content).expect("writable temp dir");
}

/// Cache backend that refuses every operation
#[derive(Debug, Default)]
pub struct UnreachableCache {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl CacheBackend for UnreachableCache {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(I18nError::CacheUnavailable("connection refused".to_string()))
    }

    async fn put(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(I18nError::CacheUnavailable("connection refused".to_string()))
    }

    fn name(&self) -> &'static str {
        "unreachable"
    }
}

#[async_trait]
impl SharedStore for UnreachableCache {
    async fn delete(&self, _key: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(I18nError::CacheUnavailable("connection refused".to_string()))
    }

    async fn try_lock(&self, _key: &str, _token: &str, _lease: Duration) -> Result<bool> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(I18nError::CacheUnavailable("connection refused".to_string()))
    }

    async fn unlock(&self, _key: &str, _token: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(I18nError::CacheUnavailable("connection refused".to_string()))
    }
}

/// Cache backend that answers far too slowly
#[derive(Debug)]
pub struct StalledCache {
    pub delay: Duration,
}

#[async_trait]
impl CacheBackend for StalledCache {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        tokio::time::sleep(self.delay).await;
        Ok(None)
    }

    async fn put(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stalled"
    }
}
