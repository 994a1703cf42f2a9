//! Distributed cache layer
//!
//! Shares resolved messages between process instances. Every operation is
//! best-effort: a failed or slow read is a miss, a failed write is logged and
//! forgotten. Keys embed the catalog version and fingerprint, so entries are
//! never updated in place; a new catalog simply stops asking for the old keys
//! and TTL reclaims them.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use redis::AsyncCommands;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::{CacheBackendKind, CacheConfig};
use crate::i18n::diagnostics::Diagnostics;
use crate::i18n::locale::Locale;
use crate::utils::errors::Result;

/// Identity of one resolved message for one catalog version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub key: String,
    pub locale: Locale,
    /// Digest of the fallback chains the resolution walked
    pub chain: String,
    pub args_hash: String,
    pub version: u64,
    pub fingerprint: String,
}

impl CacheKey {
    /// Storage key. The translation key goes last because it may contain `:`.
    pub fn render(&self, prefix: &str) -> String {
        format!(
            "{}v{}.{}:{}.{}:{}:{}",
            prefix, self.version, self.fingerprint, self.locale, self.chain, self.args_hash, self.key
        )
    }
}

/// Storage behind the cache layer
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Cache backend that can also hold short-lived locks, for state shared
/// between instances beyond resolved messages
#[async_trait]
pub trait SharedStore: CacheBackend {
    async fn delete(&self, key: &str) -> Result<()>;

    /// Take `key` for `lease` if nobody holds it. `token` identifies the holder.
    async fn try_lock(&self, key: &str, token: &str, lease: Duration) -> Result<bool>;

    /// Release `key` if `token` still holds it
    async fn unlock(&self, key: &str, token: &str) -> Result<()>;
}

/// Deletes the lock only when it still carries the caller's token
const UNLOCK_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

/// Redis-backed cache shared by all instances
pub struct RedisCacheBackend {
    client: redis::Client,
    connection: OnceCell<redis::aio::ConnectionManager>,
}

impl RedisCacheBackend {
    /// Create the backend. No connection is made until first use, so an
    /// unreachable Redis does not prevent startup.
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;

        Ok(Self {
            client,
            connection: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<redis::aio::ConnectionManager> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                let manager = redis::aio::ConnectionManager::new(self.client.clone()).await?;
                info!("Connected to Redis cache");
                Ok::<_, redis::RedisError>(manager)
            })
            .await?;
        Ok(manager.clone())
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection().await?;
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[async_trait]
impl SharedStore for RedisCacheBackend {
    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn try_lock(&self, key: &str, token: &str, lease: Duration) -> Result<bool> {
        let mut conn = self.connection().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(lease.as_millis().max(1) as u64)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn unlock(&self, key: &str, token: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        redis::Script::new(UNLOCK_SCRIPT)
            .key(key)
            .arg(token)
            .invoke_async::<_, i64>(&mut conn)
            .await?;
        Ok(())
    }
}

/// Writes between sweeps of expired entries in [`MemoryCacheBackend`]
const MEMORY_SWEEP_INTERVAL: usize = 256;

/// Process-local cache with TTL, for single-instance deployments and tests
#[derive(Debug, Default)]
pub struct MemoryCacheBackend {
    entries: DashMap<String, (String, Instant)>,
    writes: AtomicUsize,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet reclaimed
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, (_, expires)| *expires > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed = removed, remaining = self.entries.len(), "Expired cache entries purged");
        }
        removed
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let value = match self.entries.get(key) {
            Some(entry) if entry.1 > now => return Ok(Some(entry.0.clone())),
            Some(_) => None,
            None => return Ok(None),
        };
        self.entries.remove_if(key, |_, (_, expires)| *expires <= now);
        Ok(value)
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.entries
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));

        // Keys of old versions are never read again, so expiry on read alone leaks
        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % MEMORY_SWEEP_INTERVAL == 0 {
            self.purge_expired();
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl SharedStore for MemoryCacheBackend {
    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn try_lock(&self, key: &str, token: &str, lease: Duration) -> Result<bool> {
        let now = Instant::now();
        let acquired = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut held) => {
                let expired = held.get().1 <= now;
                if expired {
                    held.insert((token.to_string(), now + lease));
                }
                expired
            }
            Entry::Vacant(vacant) => {
                vacant.insert((token.to_string(), now + lease));
                true
            }
        };
        Ok(acquired)
    }

    async fn unlock(&self, key: &str, token: &str) -> Result<()> {
        self.entries.remove_if(key, |_, (holder, _)| holder == token);
        Ok(())
    }
}

/// Best-effort, bounded-latency view over a [`CacheBackend`]
#[derive(Clone)]
pub struct TranslationCache {
    backend: Arc<dyn CacheBackend>,
    prefix: String,
    ttl: Duration,
    timeout: Duration,
    diagnostics: Arc<Diagnostics>,
    degraded: Arc<AtomicBool>,
}

impl TranslationCache {
    pub fn new(
        backend: Arc<dyn CacheBackend>,
        prefix: impl Into<String>,
        ttl: Duration,
        timeout: Duration,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            ttl,
            timeout,
            diagnostics,
            degraded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Build from configuration; `None` when caching is disabled
    pub fn from_config(config: &CacheConfig, diagnostics: Arc<Diagnostics>) -> Result<Option<Self>> {
        let backend: Arc<dyn CacheBackend> = match config.backend {
            CacheBackendKind::Redis => Arc::new(RedisCacheBackend::new(&config.url)?),
            CacheBackendKind::Memory => Arc::new(MemoryCacheBackend::new()),
            CacheBackendKind::Disabled => {
                info!("Translation cache disabled");
                return Ok(None);
            }
        };

        info!(
            backend = backend.name(),
            ttl_seconds = config.ttl_seconds,
            timeout_ms = config.timeout_ms,
            "Translation cache configured"
        );
        Ok(Some(Self::new(
            backend,
            config.prefix.clone(),
            Duration::from_secs(config.ttl_seconds),
            Duration::from_millis(config.timeout_ms),
            diagnostics,
        )))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Read a cached value. Errors and timeouts degrade to a miss.
    /// `deadline` shortens the configured timeout for this call only.
    pub async fn get(&self, key: &CacheKey, deadline: Option<Duration>) -> Option<String> {
        let storage_key = key.render(&self.prefix);
        let timeout = deadline.map_or(self.timeout, |d| d.min(self.timeout));

        match tokio::time::timeout(timeout, self.backend.get(&storage_key)).await {
            Ok(Ok(Some(value))) => {
                self.mark_healthy();
                self.diagnostics.cache_hit();
                debug!(key = %storage_key, "Translation cache hit");
                Some(value)
            }
            Ok(Ok(None)) => {
                self.mark_healthy();
                self.diagnostics.cache_miss();
                None
            }
            Ok(Err(e)) => {
                self.mark_degraded(&e.to_string());
                None
            }
            Err(_) => {
                self.mark_degraded(&format!("read timed out after {:?}", timeout));
                None
            }
        }
    }

    /// Write a value with the configured TTL. Failures are logged and swallowed.
    pub async fn put(&self, key: &CacheKey, value: String) {
        let storage_key = key.render(&self.prefix);

        match tokio::time::timeout(self.timeout, self.backend.put(&storage_key, &value, self.ttl)).await {
            Ok(Ok(())) => {
                debug!(key = %storage_key, ttl = ?self.ttl, "Translation cached");
            }
            Ok(Err(e)) => {
                self.diagnostics.cache_write_failed();
                debug!(key = %storage_key, error = %e, "Translation cache write failed");
            }
            Err(_) => {
                self.diagnostics.cache_write_failed();
                debug!(key = %storage_key, "Translation cache write timed out");
            }
        }
    }

    /// Record a payload that could not be decoded; counts as degraded
    pub fn reject_payload(&self, key: &CacheKey, reason: &str) {
        self.diagnostics.cache_degraded();
        warn!(key = %key.render(&self.prefix), reason = reason, "Discarding undecodable cache payload");
    }

    fn mark_degraded(&self, reason: &str) {
        self.diagnostics.cache_degraded();
        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!(
                backend = self.backend.name(),
                reason = reason,
                "Translation cache unavailable, serving from catalog"
            );
        } else {
            debug!(backend = self.backend.name(), reason = reason, "Translation cache still unavailable");
        }
    }

    fn mark_healthy(&self) {
        if self.degraded.swap(false, Ordering::Relaxed) {
            info!(backend = self.backend.name(), "Translation cache recovered");
        }
    }
}

impl std::fmt::Debug for TranslationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationCache")
            .field("backend", &self.backend.name())
            .field("prefix", &self.prefix)
            .field("ttl", &self.ttl)
            .field("timeout", &self.timeout)
            .finish()
    }
}
