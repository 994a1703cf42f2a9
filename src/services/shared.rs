//! Shared catalog snapshots
//!
//! [`SharedCatalogSource`] wraps another source so that a fleet of instances
//! hits the origin once per TTL instead of once per instance. The fetched
//! catalog is stored under `{prefix}{scope}:messages`; fetching and storing
//! happen under the lock `{prefix}{scope}:lock`. A store outage never blocks a
//! reload: the wrapped source is then used directly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::{LockFailureAction, SharedCatalogConfig};
use crate::i18n::catalog::ParsedCatalog;
use crate::utils::errors::{FetchError, FetchResult, Result};
use super::cache::{RedisCacheBackend, SharedStore};
use super::source::CatalogSource;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Catalog source that reuses a snapshot another instance already fetched
pub struct SharedCatalogSource {
    inner: Arc<dyn CatalogSource>,
    store: Arc<dyn SharedStore>,
    config: SharedCatalogConfig,
}

impl SharedCatalogSource {
    pub fn new(inner: Arc<dyn CatalogSource>, store: Arc<dyn SharedStore>, config: SharedCatalogConfig) -> Self {
        Self { inner, store, config }
    }

    /// Share `inner` through the Redis instance named in `config`
    pub fn from_config(inner: Arc<dyn CatalogSource>, config: SharedCatalogConfig) -> Result<Self> {
        let store = Arc::new(RedisCacheBackend::new(&config.url)?);
        info!(
            source = inner.name(),
            ttl_seconds = config.ttl_seconds,
            lock = config.lock,
            "Sharing fetched catalogs through Redis"
        );
        Ok(Self::new(inner, store, config))
    }

    pub fn data_key(&self) -> String {
        format!("{}{}:messages", self.config.prefix, self.inner.scope())
    }

    pub fn lock_key(&self) -> String {
        format!("{}{}:lock", self.config.prefix, self.inner.scope())
    }

    /// Take the fetch lock. `None` means the caller proceeds without holding it.
    async fn acquire(&self, lock_key: &str) -> FetchResult<Option<String>> {
        if !self.config.lock {
            return Ok(None);
        }

        let token = format!("{:032x}", rand::thread_rng().gen::<u128>());
        let lease = Duration::from_secs(self.config.lock_lease_seconds);
        let wait = Duration::from_secs(self.config.lock_wait_seconds);
        let deadline = Instant::now() + wait;

        loop {
            match self.store.try_lock(lock_key, &token, lease).await {
                Ok(true) => {
                    debug!(lock = lock_key, "Shared catalog lock acquired");
                    return Ok(Some(token));
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(lock = lock_key, error = %e, "Shared catalog lock unavailable, fetching without it");
                    return Ok(None);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return match self.config.on_lock_failure {
                    LockFailureAction::Ignore => {
                        warn!(lock = lock_key, wait = ?wait, "Shared catalog lock still held, fetching anyway");
                        Ok(None)
                    }
                    LockFailureAction::Fail => Err(FetchError::Lock(format!(
                        "{} still held after {:?}",
                        lock_key, wait
                    ))),
                };
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn release(&self, lock_key: &str, token: Option<String>) {
        let Some(token) = token else { return };
        if let Err(e) = self.store.unlock(lock_key, &token).await {
            warn!(lock = lock_key, error = %e, "Failed to release shared catalog lock");
        }
    }

    async fn read_shared(&self, data_key: &str) -> Option<ParsedCatalog> {
        let payload = match self.store.get(data_key).await {
            Ok(payload) => payload?,
            Err(e) => {
                warn!(key = data_key, error = %e, "Shared catalog unavailable");
                return None;
            }
        };

        match serde_json::from_str(&payload) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(key = data_key, error = %e, "Discarding undecodable shared catalog");
                None
            }
        }
    }

    async fn fetch_locked(&self, data_key: &str) -> FetchResult<ParsedCatalog> {
        if let Some(parsed) = self.read_shared(data_key).await {
            info!(
                key = data_key,
                locales = parsed.usable_locales(),
                entries = parsed.entry_count(),
                "Using shared catalog"
            );
            return Ok(parsed);
        }

        let parsed = self.inner.fetch().await?;
        let ttl = Duration::from_secs(self.config.ttl_seconds);

        match serde_json::to_string(&parsed) {
            Ok(payload) => match self.store.put(data_key, &payload, ttl).await {
                Ok(()) => debug!(key = data_key, ttl = ?ttl, "Shared catalog stored"),
                Err(e) => warn!(key = data_key, error = %e, "Failed to store shared catalog"),
            },
            Err(e) => warn!(key = data_key, error = %e, "Failed to encode shared catalog"),
        }
        Ok(parsed)
    }
}

#[async_trait]
impl CatalogSource for SharedCatalogSource {
    async fn fetch(&self) -> FetchResult<ParsedCatalog> {
        let data_key = self.data_key();
        let lock_key = self.lock_key();

        let token = self.acquire(&lock_key).await?;
        let result = self.fetch_locked(&data_key).await;
        self.release(&lock_key, token).await;
        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn scope(&self) -> String {
        self.inner.scope()
    }

    /// Delete the shared snapshot, under the fetch lock
    async fn invalidate(&self) -> FetchResult<()> {
        let data_key = self.data_key();
        let lock_key = self.lock_key();

        let token = self.acquire(&lock_key).await?;
        let deleted = self.store.delete(&data_key).await;
        self.release(&lock_key, token).await;

        match deleted {
            Ok(()) => info!(key = %data_key, "Shared catalog invalidated"),
            Err(e) => warn!(key = %data_key, error = %e, "Failed to invalidate shared catalog"),
        }
        self.inner.invalidate().await
    }
}

impl std::fmt::Debug for SharedCatalogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCatalogSource")
            .field("inner", &self.inner.name())
            .field("store", &self.store.name())
            .field("prefix", &self.config.prefix)
            .field("lock", &self.config.lock)
            .finish()
    }
}
