//! Locales and fallback chains
//!
//! A [`Locale`] is a normalized language tag. The [`LocaleRegistry`] holds the
//! configured locale definitions and derives, for any requested locale, the
//! ordered chain of locales a lookup walks before giving up.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::I18nConfig;
use crate::utils::errors::{I18nError, Result};

/// Upper bound on memoized chains for locales nobody configured.
const MAX_CACHED_CHAINS: usize = 1024;

/// Normalized language tag such as `en`, `en-GB` or `zh-Hant-TW`
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locale(Arc<str>);

impl Locale {
    /// Parse and normalize a tag. Accepts `-` or `_` as subtag separator.
    pub fn parse(tag: &str) -> Result<Self> {
        let tag = tag.trim();
        let mut normalized = String::with_capacity(tag.len());

        for (index, subtag) in tag.split(['-', '_']).enumerate() {
            let valid = !subtag.is_empty()
                && subtag.len() <= 8
                && subtag.chars().all(|c| c.is_ascii_alphanumeric());
            if !valid || (index == 0 && !(2..=8).contains(&subtag.len())) {
                return Err(I18nError::InvalidLocale(tag.to_string()));
            }
            if index == 0 && !subtag.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(I18nError::InvalidLocale(tag.to_string()));
            }

            if index > 0 {
                normalized.push('-');
            }
            match (index, subtag.len()) {
                (0, _) => normalized.push_str(&subtag.to_ascii_lowercase()),
                // Region: GB, US
                (_, 2) => normalized.push_str(&subtag.to_ascii_uppercase()),
                // Script: Hant, Latn
                (_, 4) if subtag.chars().all(|c| c.is_ascii_alphabetic()) => {
                    let lower = subtag.to_ascii_lowercase();
                    normalized.push_str(&lower[..1].to_ascii_uppercase());
                    normalized.push_str(&lower[1..]);
                }
                _ => normalized.push_str(&subtag.to_ascii_lowercase()),
            }
        }

        Ok(Self(Arc::from(normalized)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Primary language subtag
    pub fn language(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }

    /// Two-letter region subtag, if any
    pub fn region(&self) -> Option<&str> {
        self.0
            .split('-')
            .skip(1)
            .find(|s| s.len() == 2 && s.chars().all(|c| c.is_ascii_uppercase()))
    }

    /// The tag with its last subtag removed (`en-GB` -> `en`)
    pub fn parent(&self) -> Option<Locale> {
        self.0
            .rfind('-')
            .map(|idx| Self(Arc::from(&self.0[..idx])))
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Locale({})", self.0)
    }
}

impl std::str::FromStr for Locale {
    type Err = I18nError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Locale {
    type Error = I18nError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.0.to_string()
    }
}

/// A locale known to the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleDefinition {
    pub locale: Locale,
    pub name: Option<String>,
    /// Explicit fallback; when absent the parent tag is used
    pub fallback: Option<Locale>,
}

impl LocaleDefinition {
    pub fn new(locale: Locale) -> Self {
        Self {
            locale,
            name: None,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Locale) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Registry of known locales and their fallback chains
pub struct LocaleRegistry {
    default: Locale,
    definitions: ArcSwap<HashMap<Locale, LocaleDefinition>>,
    chains: DashMap<Locale, Arc<[Locale]>>,
}

impl LocaleRegistry {
    /// Create a registry containing only the default locale
    pub fn new(default: Locale) -> Self {
        let mut definitions = HashMap::new();
        definitions.insert(default.clone(), LocaleDefinition::new(default.clone()));

        Self {
            default,
            definitions: ArcSwap::from_pointee(definitions),
            chains: DashMap::new(),
        }
    }

    /// Build a registry from configuration
    pub fn from_config(config: &I18nConfig) -> Result<Self> {
        let registry = Self::new(Locale::parse(&config.default_locale)?);

        for entry in &config.locales {
            let mut definition = LocaleDefinition::new(Locale::parse(&entry.tag)?);
            definition.name = entry.name.clone();
            definition.fallback = entry.fallback.as_deref().map(Locale::parse).transpose()?;
            registry.register(definition);
        }

        info!(
            default = %registry.default,
            locales = registry.definitions.load().len(),
            "Locale registry initialized"
        );
        Ok(registry)
    }

    pub fn default_locale(&self) -> &Locale {
        &self.default
    }

    pub fn is_known(&self, locale: &Locale) -> bool {
        self.definitions.load().contains_key(locale)
    }

    pub fn definition(&self, locale: &Locale) -> Option<LocaleDefinition> {
        self.definitions.load().get(locale).cloned()
    }

    /// All known locales, sorted by tag
    pub fn locales(&self) -> Vec<Locale> {
        let mut locales: Vec<Locale> = self.definitions.load().keys().cloned().collect();
        locales.sort();
        locales
    }

    /// Add or replace a locale definition, returning the previous one
    pub fn register(&self, definition: LocaleDefinition) -> Option<LocaleDefinition> {
        let locale = definition.locale.clone();
        let mut previous = None;
        self.definitions.rcu(|current| {
            let mut next = HashMap::clone(current);
            previous = next.insert(locale.clone(), definition.clone());
            next
        });
        self.chains.clear();

        debug!(locale = %locale, replaced = previous.is_some(), "Locale registered");
        previous
    }

    /// Remove a locale definition. The default locale cannot be removed.
    pub fn remove(&self, locale: &Locale) -> Result<Option<LocaleDefinition>> {
        if *locale == self.default {
            return Err(I18nError::Config(
                format!("Cannot remove the default locale {}", locale)
            ));
        }

        let mut removed = None;
        self.definitions.rcu(|current| {
            let mut next = HashMap::clone(current);
            removed = next.remove(locale);
            next
        });
        self.chains.clear();

        debug!(locale = %locale, removed = removed.is_some(), "Locale removed");
        Ok(removed)
    }

    /// Ordered lookup chain for `locale`, always ending at the default locale
    pub fn chain(&self, locale: &Locale) -> Arc<[Locale]> {
        if let Some(chain) = self.chains.get(locale) {
            return Arc::clone(chain.value());
        }

        let chain: Arc<[Locale]> = self.compute_chain(locale).into();
        if self.is_known(locale) || self.chains.len() < MAX_CACHED_CHAINS {
            self.chains.insert(locale.clone(), Arc::clone(&chain));
        }
        chain
    }

    /// Short hex digest of every chain a lookup for `locale` can walk: its own
    /// chain and the chains of each locale on it, which nested messages use.
    /// Changes whenever a registration changes what `locale` resolves to.
    pub fn chain_digest(&self, locale: &Locale) -> String {
        let mut hasher = Sha256::new();
        for link in self.chain(locale).iter() {
            for candidate in self.chain(link).iter() {
                hasher.update(candidate.as_str().as_bytes());
                hasher.update([b',']);
            }
            hasher.update([b';']);
        }
        let digest = format!("{:x}", hasher.finalize());
        digest[..16].to_string()
    }

    fn compute_chain(&self, locale: &Locale) -> Vec<Locale> {
        let definitions = self.definitions.load();
        let mut visited = HashSet::new();
        let mut chain = Vec::new();
        let mut current = Some(locale.clone());

        while let Some(candidate) = current {
            if !visited.insert(candidate.clone()) {
                break;
            }
            chain.push(candidate.clone());
            if candidate == self.default {
                break;
            }
            current = match definitions.get(&candidate).and_then(|d| d.fallback.clone()) {
                Some(explicit) => Some(explicit),
                None => candidate.parent(),
            };
        }

        if !visited.contains(&self.default) {
            chain.push(self.default.clone());
        }
        chain
    }

    /// Normalize a requester's preferred locale, defaulting when absent or invalid
    pub fn preferred(&self, requested: Option<&str>) -> Locale {
        requested
            .and_then(|tag| Locale::parse(tag).ok())
            .unwrap_or_else(|| self.default.clone())
    }
}

impl fmt::Debug for LocaleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocaleRegistry")
            .field("default", &self.default)
            .field("locales", &self.locales())
            .finish()
    }
}
