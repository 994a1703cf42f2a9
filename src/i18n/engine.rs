//! The i18n engine
//!
//! [`I18n`] wires the locale registry, catalog store, cache, resolver and
//! reload coordinator together and is the surface collaborators call.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::config::{Settings, SourceKind};
use crate::services::cache::TranslationCache;
use crate::services::directory::DirectorySource;
use crate::services::events::{CatalogEvent, EventBus};
use crate::services::onesky::OneSkySource;
use crate::services::properties::PropertiesSource;
use crate::services::shared::SharedCatalogSource;
use crate::services::source::{BundleSet, CatalogSource};
use crate::utils::errors::{FetchResult, I18nError, Result};
use super::arguments::Arguments;
use super::catalog::{CatalogStats, CatalogStore};
use super::diagnostics::{Diagnostics, DiagnosticsSnapshot};
use super::locale::{Locale, LocaleDefinition, LocaleRegistry};
use super::parser::ParsePolicy;
use super::reload::{ReloadCoordinator, ReloadHandle, ReloadOutcome, ReloadStatus};
use super::resolver::{ResolvedResult, Resolver};

/// Main internationalization engine
#[derive(Debug, Clone)]
pub struct I18n {
    registry: Arc<LocaleRegistry>,
    store: Arc<CatalogStore>,
    resolver: Arc<Resolver>,
    coordinator: Arc<ReloadCoordinator>,
    events: EventBus,
    diagnostics: Arc<Diagnostics>,
    bundles: Option<Arc<BundleSet>>,
}

impl I18n {
    /// Build the engine from settings. No catalog is loaded until the first
    /// [`reload`](Self::reload) or [`start`](Self::start).
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let registry = Arc::new(LocaleRegistry::from_config(&settings.i18n)?);
        let diagnostics = Arc::new(Diagnostics::new());
        let policy = ParsePolicy::from_config(&settings.i18n);

        let (source, bundles): (Arc<dyn CatalogSource>, Option<Arc<BundleSet>>) = match settings.source.kind {
            SourceKind::OneSky => {
                let config = settings.source.onesky.clone().ok_or_else(|| {
                    I18nError::Config("source.onesky is required for the onesky source".to_string())
                })?;
                let source = OneSkySource::new(config, policy)?;
                let bundles = source.bundles();
                (Arc::new(source), Some(bundles))
            }
            SourceKind::Directory => {
                let directory = settings.source.directory.clone().ok_or_else(|| {
                    I18nError::Config("source.directory is required for the directory source".to_string())
                })?;
                (Arc::new(DirectorySource::new(directory, Arc::clone(&registry), policy)), None)
            }
            SourceKind::Properties => {
                let config = settings.source.properties.as_ref().ok_or_else(|| {
                    I18nError::Config("source.properties is required for the properties source".to_string())
                })?;
                let source = PropertiesSource::new(config, Arc::clone(&registry), policy);
                let bundles = source.bundles();
                (Arc::new(source), Some(bundles))
            }
        };

        let source: Arc<dyn CatalogSource> = match &settings.source.shared {
            Some(shared) => Arc::new(SharedCatalogSource::from_config(source, shared.clone())?),
            None => source,
        };

        let cache = TranslationCache::from_config(&settings.cache, Arc::clone(&diagnostics))?;
        let engine = Self::with_components(settings, registry, source, cache, diagnostics);
        Ok(match bundles {
            Some(bundles) => engine.with_bundles(bundles),
            None => engine,
        })
    }

    /// Build the engine from already constructed components
    pub fn with_components(
        settings: &Settings,
        registry: Arc<LocaleRegistry>,
        source: Arc<dyn CatalogSource>,
        cache: Option<TranslationCache>,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        let store = Arc::new(CatalogStore::new());
        let events = EventBus::default();

        info!(
            source = source.name(),
            cache = cache.as_ref().map(TranslationCache::backend_name).unwrap_or("disabled"),
            default_locale = %registry.default_locale(),
            "I18n engine created"
        );

        let resolver = Arc::new(Resolver::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            cache,
            Arc::clone(&diagnostics),
            settings.i18n.pivot_arguments.clone(),
        ));
        let coordinator = Arc::new(ReloadCoordinator::new(
            source,
            Arc::clone(&store),
            events.clone(),
            Arc::clone(&diagnostics),
            settings.reload.clone(),
        ));

        Self {
            registry,
            store,
            resolver,
            coordinator,
            events,
            diagnostics,
            bundles: None,
        }
    }

    /// Let [`add_bundle`](Self::add_bundle) and
    /// [`remove_bundle`](Self::remove_bundle) change the bundles the source downloads
    pub fn with_bundles(mut self, bundles: Arc<BundleSet>) -> Self {
        self.bundles = Some(bundles);
        self
    }

    /// Resolve a message
    pub async fn resolve(&self, key: &str, locale: &Locale, args: &Arguments) -> ResolvedResult {
        self.resolver.resolve(key, locale, args).await
    }

    /// Resolved text for a raw locale tag, as supplied by a command framework
    pub async fn t(&self, key: &str, locale: Option<&str>, args: &Arguments) -> String {
        let locale = self.preferred_locale(locale);
        self.resolver.text(key, &locale, args).await
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn registry(&self) -> &LocaleRegistry {
        &self.registry
    }

    /// Normalize a preferred locale, defaulting when absent or invalid
    pub fn preferred_locale(&self, requested: Option<&str>) -> Locale {
        self.registry.preferred(requested)
    }

    /// Run one reload cycle now
    pub async fn reload(&self) -> FetchResult<ReloadOutcome> {
        self.coordinator.reload().await
    }

    /// Discard any catalog snapshot shared between instances and reload from
    /// the origin
    pub async fn refresh(&self) -> FetchResult<ReloadOutcome> {
        self.coordinator.refresh().await
    }

    /// Start periodic reloading in the background
    pub fn start(&self) -> ReloadHandle {
        Arc::clone(&self.coordinator).spawn()
    }

    pub fn reload_status(&self) -> ReloadStatus {
        self.coordinator.status()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.events.subscribe()
    }

    /// Statistics of the current catalog
    pub fn stats(&self) -> CatalogStats {
        self.store.snapshot().stats()
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Add or replace a locale at runtime
    pub fn register_locale(&self, definition: LocaleDefinition) {
        let locale = definition.locale.to_string();
        self.registry.register(definition);
        self.events.publish(CatalogEvent::LocaleRegistered { locale });
    }

    /// Bundles the source downloads, in merge order. Empty for sources
    /// without bundles.
    pub fn bundles(&self) -> Vec<String> {
        self.bundles.as_ref().map(|b| b.names()).unwrap_or_default()
    }

    fn bundle_set(&self) -> Result<&Arc<BundleSet>> {
        self.bundles.as_ref().ok_or_else(|| {
            I18nError::Config("The configured catalog source has no bundles".to_string())
        })
    }

    /// Add a bundle and reload. If the reload fails the bundle is taken out
    /// again and the error returned. Returns `false` if it was already present.
    pub async fn add_bundle(&self, name: &str) -> Result<bool> {
        let bundles = self.bundle_set()?;
        if !bundles.add(name) {
            return Ok(false);
        }

        if let Err(e) = self.coordinator.reload().await {
            bundles.remove(name);
            return Err(e.into());
        }
        self.events.publish(CatalogEvent::BundleAdded {
            bundle: name.to_string(),
        });
        Ok(true)
    }

    /// Remove a bundle and reload. Its keys stay served until a reload
    /// succeeds. Returns `false` if it was not present.
    pub async fn remove_bundle(&self, name: &str) -> Result<bool> {
        let bundles = self.bundle_set()?;
        if !bundles.remove(name) {
            return Ok(false);
        }

        self.events.publish(CatalogEvent::BundleRemoved {
            bundle: name.to_string(),
        });
        self.coordinator.reload().await?;
        Ok(true)
    }

    /// Remove a locale at runtime; returns whether it was known
    pub fn remove_locale(&self, locale: &Locale) -> Result<bool> {
        let removed = self.registry.remove(locale)?.is_some();
        if removed {
            self.events.publish(CatalogEvent::LocaleRemoved {
                locale: locale.to_string(),
            });
        }
        Ok(removed)
    }
}
