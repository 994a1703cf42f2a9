//! Message resolution
//!
//! Turns `(key, locale, arguments)` into display text. Resolution never
//! fails: a key that exists in no locale of the fallback chain resolves to the
//! key itself, flagged as missing. Each call works against one catalog
//! snapshot taken when the call starts, so a concurrent reload cannot mix two
//! catalog versions into one result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::services::cache::{CacheKey, TranslationCache};
use super::arguments::{ArgValue, Arguments};
use super::catalog::{Catalog, CatalogStore};
use super::diagnostics::Diagnostics;
use super::locale::{Locale, LocaleRegistry};
use super::plural::plural_category;
use super::template::FormatSpan;

/// Distinct missing keys remembered for log deduplication
const MAX_REPORTED_MISSING: usize = 10_000;

/// Outcome of a resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedResult {
    /// Rendered text with formatting codes stripped
    pub text: String,
    /// Formatting over byte ranges of `text`
    pub directives: Vec<FormatSpan>,
    /// Locale the entry came from; `None` for a missing key
    pub locale_used: Option<Locale>,
    pub requested: Locale,
    pub fallback_used: bool,
    pub missing_key: bool,
    /// Placeholders left verbatim because no argument was bound
    pub unresolved_arguments: Vec<String>,
    /// Catalog version the result was produced from
    pub version: u64,
}

/// What is stored in the shared cache for one resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedResolution {
    text: String,
    directives: Vec<FormatSpan>,
    locale_used: Locale,
    unresolved_arguments: Vec<String>,
}

impl CachedResolution {
    fn from_result(result: &ResolvedResult) -> Option<Self> {
        Some(Self {
            text: result.text.clone(),
            directives: result.directives.clone(),
            locale_used: result.locale_used.clone()?,
            unresolved_arguments: result.unresolved_arguments.clone(),
        })
    }

    fn into_result(self, requested: &Locale, version: u64) -> ResolvedResult {
        ResolvedResult {
            fallback_used: self.locale_used != *requested,
            text: self.text,
            directives: self.directives,
            locale_used: Some(self.locale_used),
            requested: requested.clone(),
            missing_key: false,
            unresolved_arguments: self.unresolved_arguments,
            version,
        }
    }
}

pub struct Resolver {
    store: Arc<CatalogStore>,
    registry: Arc<LocaleRegistry>,
    cache: Option<TranslationCache>,
    diagnostics: Arc<Diagnostics>,
    pivots: Vec<String>,
    reported_missing: DashSet<String>,
    /// Catalog version `reported_missing` belongs to
    reported_version: AtomicU64,
}

impl Resolver {
    pub fn new(
        store: Arc<CatalogStore>,
        registry: Arc<LocaleRegistry>,
        cache: Option<TranslationCache>,
        diagnostics: Arc<Diagnostics>,
        pivots: Vec<String>,
    ) -> Self {
        Self {
            store,
            registry,
            cache,
            diagnostics,
            pivots,
            reported_missing: DashSet::new(),
            reported_version: AtomicU64::new(0),
        }
    }

    /// Resolve `key` for `locale`, consulting the shared cache first
    pub async fn resolve(&self, key: &str, locale: &Locale, args: &Arguments) -> ResolvedResult {
        self.resolve_cached(key, locale, args, None).await
    }

    /// Like [`resolve`](Self::resolve), but gives up on the cache after
    /// `timeout` and answers from the local catalog. The cache write-back is
    /// detached so it cannot hold the caller either.
    pub async fn resolve_within(
        &self,
        key: &str,
        locale: &Locale,
        args: &Arguments,
        timeout: Duration,
    ) -> ResolvedResult {
        self.resolve_cached(key, locale, args, Some(timeout)).await
    }

    /// Resolve against the local catalog only
    pub fn resolve_local(&self, key: &str, locale: &Locale, args: &Arguments) -> ResolvedResult {
        let catalog = self.store.snapshot();
        self.render(&catalog, key, locale, args)
    }

    /// Resolved text only
    pub async fn text(&self, key: &str, locale: &Locale, args: &Arguments) -> String {
        self.resolve(key, locale, args).await.text
    }

    async fn resolve_cached(
        &self,
        key: &str,
        locale: &Locale,
        args: &Arguments,
        deadline: Option<Duration>,
    ) -> ResolvedResult {
        let catalog = self.store.snapshot();
        let Some(cache) = &self.cache else {
            return self.render(&catalog, key, locale, args);
        };

        let cache_key = CacheKey {
            key: key.to_string(),
            locale: locale.clone(),
            chain: self.registry.chain_digest(locale),
            args_hash: args.stable_hash(),
            version: catalog.version(),
            fingerprint: catalog.fingerprint().to_string(),
        };

        if let Some(payload) = cache.get(&cache_key, deadline).await {
            match serde_json::from_str::<CachedResolution>(&payload) {
                Ok(cached) => {
                    let result = cached.into_result(locale, catalog.version());
                    if result.fallback_used {
                        self.diagnostics.fallback_resolution();
                    }
                    return result;
                }
                Err(e) => cache.reject_payload(&cache_key, &e.to_string()),
            }
        }

        let result = self.render(&catalog, key, locale, args);

        // Missing keys are not cached; a later catalog may add them
        if let Some(cached) = CachedResolution::from_result(&result) {
            match serde_json::to_string(&cached) {
                Ok(payload) if deadline.is_some() => {
                    let cache = cache.clone();
                    tokio::spawn(async move { cache.put(&cache_key, payload).await });
                }
                Ok(payload) => cache.put(&cache_key, payload).await,
                Err(e) => debug!(key = key, error = %e, "Failed to encode resolution for cache"),
            }
        }

        result
    }

    fn render(&self, catalog: &Catalog, key: &str, requested: &Locale, args: &Arguments) -> ResolvedResult {
        let chain = self.registry.chain(requested);
        let found = chain
            .iter()
            .find_map(|locale| catalog.lookup(locale, key).map(|entry| (locale, entry)));

        let Some((used, entry)) = found else {
            self.report_missing(key, requested, catalog.version());
            return ResolvedResult {
                text: key.to_string(),
                directives: Vec::new(),
                locale_used: None,
                requested: requested.clone(),
                fallback_used: false,
                missing_key: true,
                unresolved_arguments: Vec::new(),
                version: catalog.version(),
            };
        };

        let category = if entry.is_plural() {
            args.pivot(&self.pivots)
                .map(|n| plural_category(used.language(), n))
        } else {
            None
        };

        let rendered = entry.select(category).render(|name, _parameter| match args.get(name)? {
            ArgValue::Message(nested) => Some(self.nested_text(catalog, used, nested)),
            value => Some(value.to_string()),
        });

        if !rendered.unresolved.is_empty() {
            self.diagnostics.unresolved_placeholders(rendered.unresolved.len());
            debug!(
                key = key,
                locale = %used,
                unresolved = ?rendered.unresolved,
                "Unresolved placeholders left in message"
            );
        }

        let fallback_used = used != requested;
        if fallback_used {
            self.diagnostics.fallback_resolution();
        }

        ResolvedResult {
            text: rendered.text,
            directives: rendered.spans,
            locale_used: Some(used.clone()),
            requested: requested.clone(),
            fallback_used,
            missing_key: false,
            unresolved_arguments: rendered.unresolved,
            version: catalog.version(),
        }
    }

    /// Text of a key referenced by a `Message` argument, with no arguments of
    /// its own. Formatting codes in the nested message are dropped.
    fn nested_text(&self, catalog: &Catalog, locale: &Locale, key: &str) -> String {
        self.registry
            .chain(locale)
            .iter()
            .find_map(|candidate| catalog.lookup(candidate, key))
            .map(|entry| entry.template().render(|_, _| None).text)
            .unwrap_or_else(|| key.to_string())
    }

    /// Missing keys are logged once per catalog version, however the catalog
    /// got installed
    fn report_missing(&self, key: &str, requested: &Locale, version: u64) {
        self.diagnostics.missing_key();
        if self.reported_version.swap(version, Ordering::AcqRel) != version {
            self.reported_missing.clear();
        }
        if self.reported_missing.len() < MAX_REPORTED_MISSING
            && self.reported_missing.insert(key.to_string())
        {
            warn!(key = key, locale = %requested, version = version, "Translation key not found in any fallback locale");
        }
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("cache", &self.cache)
            .field("pivots", &self.pivots)
            .finish()
    }
}
