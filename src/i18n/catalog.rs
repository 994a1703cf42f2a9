//! Catalog store
//!
//! A [`Catalog`] is an immutable, versioned snapshot of every translation
//! entry for every locale. The [`CatalogStore`] publishes exactly one current
//! catalog and replaces it with a single atomic pointer swap, so a reader that
//! took a snapshot keeps seeing that catalog in full until it drops it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use super::locale::Locale;
use super::plural::PluralCategory;
use super::template::Template;

/// One translation for one (locale, key) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredEntry", into = "StoredEntry")]
pub struct TranslationEntry {
    template: Template,
    variants: BTreeMap<PluralCategory, Template>,
    arguments: BTreeSet<String>,
}

impl TranslationEntry {
    /// Entry with a single template and no plural variants
    pub fn simple(template: impl Into<String>) -> Self {
        Self::with_variants(Template::parse(template), BTreeMap::new())
    }

    /// Entry with plural variants. `template` is used when no pivot argument
    /// is supplied.
    pub fn with_variants(template: Template, variants: BTreeMap<PluralCategory, Template>) -> Self {
        let arguments = std::iter::once(&template)
            .chain(variants.values())
            .flat_map(|t| t.placeholders().map(str::to_string).collect::<Vec<_>>())
            .collect();

        Self {
            template,
            variants,
            arguments,
        }
    }

    /// Entry built purely from plural variants (`{one: .., other: ..}`).
    /// Returns `None` when `variants` is empty.
    pub fn plural(variants: BTreeMap<PluralCategory, Template>) -> Option<Self> {
        let default = variants
            .get(&PluralCategory::One)
            .or_else(|| variants.get(&PluralCategory::Other))
            .or_else(|| variants.values().next())?
            .clone();
        Some(Self::with_variants(default, variants))
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn variants(&self) -> &BTreeMap<PluralCategory, Template> {
        &self.variants
    }

    pub fn is_plural(&self) -> bool {
        !self.variants.is_empty()
    }

    /// Argument names referenced by any of the entry's templates
    pub fn arguments(&self) -> &BTreeSet<String> {
        &self.arguments
    }

    /// Template for `category`, falling back to `other` and then the default
    pub fn select(&self, category: Option<PluralCategory>) -> &Template {
        match category {
            Some(category) => self
                .variants
                .get(&category)
                .or_else(|| self.variants.get(&PluralCategory::Other))
                .unwrap_or(&self.template),
            None => &self.template,
        }
    }
}

/// Serialized form of a [`TranslationEntry`]; argument names are derived
#[derive(Serialize, Deserialize)]
struct StoredEntry {
    template: Template,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    variants: BTreeMap<PluralCategory, Template>,
}

impl From<StoredEntry> for TranslationEntry {
    fn from(stored: StoredEntry) -> Self {
        TranslationEntry::with_variants(stored.template, stored.variants)
    }
}

impl From<TranslationEntry> for StoredEntry {
    fn from(entry: TranslationEntry) -> Self {
        StoredEntry {
            template: entry.template,
            variants: entry.variants,
        }
    }
}

/// Why an entry was left out of a catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedEntry {
    pub locale: String,
    pub key: String,
    pub reason: String,
}

/// Output of a catalog source, before it is versioned
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCatalog {
    pub locales: HashMap<Locale, HashMap<String, TranslationEntry>>,
    pub dropped: Vec<DroppedEntry>,
}

impl ParsedCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, locale: Locale, key: impl Into<String>, entry: TranslationEntry) {
        self.locales.entry(locale).or_default().insert(key.into(), entry);
    }

    pub fn drop_entry(&mut self, locale: &str, key: &str, reason: impl Into<String>) {
        self.dropped.push(DroppedEntry {
            locale: locale.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        });
    }

    /// Locales with at least one valid entry
    pub fn usable_locales(&self) -> usize {
        self.locales.values().filter(|entries| !entries.is_empty()).count()
    }

    pub fn entry_count(&self) -> usize {
        self.locales.values().map(HashMap::len).sum()
    }

    /// Merge another parsed catalog into this one; `other` wins on conflicts
    pub fn merge(&mut self, other: ParsedCatalog) {
        for (locale, entries) in other.locales {
            self.locales.entry(locale).or_default().extend(entries);
        }
        self.dropped.extend(other.dropped);
    }
}

/// Immutable, versioned set of translation entries
#[derive(Debug, Default)]
pub struct Catalog {
    version: u64,
    fingerprint: String,
    entries: HashMap<Locale, HashMap<String, Arc<TranslationEntry>>>,
}

impl Catalog {
    /// The empty catalog installed before the first reload
    pub fn empty() -> Self {
        Self::from_parsed(ParsedCatalog::default(), 0)
    }

    pub fn from_parsed(parsed: ParsedCatalog, version: u64) -> Self {
        let fingerprint = fingerprint(&parsed);
        let entries = parsed
            .locales
            .into_iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(locale, entries)| {
                let entries = entries
                    .into_iter()
                    .map(|(key, entry)| (key, Arc::new(entry)))
                    .collect();
                (locale, entries)
            })
            .collect();

        Self {
            version,
            fingerprint,
            entries,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Content hash, identical for identical catalogs built anywhere
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Exact (locale, key) lookup; `None` means not found
    pub fn lookup(&self, locale: &Locale, key: &str) -> Option<&Arc<TranslationEntry>> {
        self.entries.get(locale)?.get(key)
    }

    pub fn contains_locale(&self, locale: &Locale) -> bool {
        self.entries.contains_key(locale)
    }

    pub fn locales(&self) -> Vec<Locale> {
        let mut locales: Vec<Locale> = self.entries.keys().cloned().collect();
        locales.sort();
        locales
    }

    pub fn stats(&self) -> CatalogStats {
        let mut locales: Vec<LocaleStats> = self
            .entries
            .iter()
            .map(|(locale, entries)| LocaleStats {
                locale: locale.to_string(),
                key_count: entries.len(),
            })
            .collect();
        locales.sort_by(|a, b| a.locale.cmp(&b.locale));

        CatalogStats {
            version: self.version,
            total_entries: locales.iter().map(|l| l.key_count).sum(),
            locales,
        }
    }
}

fn fingerprint(parsed: &ParsedCatalog) -> String {
    let mut hasher = Sha256::new();
    let mut locales: Vec<_> = parsed.locales.iter().collect();
    locales.sort_by(|a, b| a.0.cmp(b.0));

    for (locale, entries) in locales {
        hasher.update(locale.as_str().as_bytes());
        hasher.update([0u8]);
        let mut keys: Vec<_> = entries.iter().collect();
        keys.sort_by(|a, b| a.0.cmp(b.0));
        for (key, entry) in keys {
            hasher.update(key.as_bytes());
            hasher.update([1u8]);
            hasher.update(entry.template().raw().as_bytes());
            for (category, template) in entry.variants() {
                hasher.update([2u8]);
                hasher.update(category.as_str().as_bytes());
                hasher.update(template.raw().as_bytes());
            }
            hasher.update([3u8]);
        }
    }

    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Translation statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub version: u64,
    pub total_entries: usize,
    pub locales: Vec<LocaleStats>,
}

/// Per-locale statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleStats {
    pub locale: String,
    pub key_count: usize,
}

/// Holder of the current catalog
#[derive(Debug)]
pub struct CatalogStore {
    current: ArcSwap<Catalog>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Catalog::empty()),
        }
    }

    pub fn current_version(&self) -> u64 {
        self.current.load().version()
    }

    /// Stable reference to the current catalog for the duration of a request
    pub fn snapshot(&self) -> Arc<Catalog> {
        self.current.load_full()
    }

    /// Exact lookup against the current catalog
    pub fn lookup(&self, locale: &Locale, key: &str) -> Option<Arc<TranslationEntry>> {
        self.current.load().lookup(locale, key).cloned()
    }

    /// Publish `catalog`, returning the version it replaced.
    ///
    /// Callers must serialize swaps and hand in strictly increasing versions.
    pub fn swap(&self, catalog: Catalog) -> u64 {
        let new_version = catalog.version();
        let previous = self.current.swap(Arc::new(catalog));
        debug_assert!(
            new_version > previous.version(),
            "catalog versions must increase"
        );

        info!(
            previous_version = previous.version(),
            new_version = new_version,
            "Catalog swapped"
        );
        previous.version()
    }
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new()
    }
}
