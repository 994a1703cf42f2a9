//! Catalog sources
//!
//! A catalog source produces a fresh [`ParsedCatalog`] on every call. Sources
//! are only ever driven by the reload coordinator.

use arc_swap::ArcSwap;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::i18n::catalog::ParsedCatalog;
use crate::utils::errors::{FetchError, FetchResult};

/// Anything that can produce a complete catalog snapshot
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self) -> FetchResult<ParsedCatalog>;

    /// Short name used in logs
    fn name(&self) -> &str;

    /// Identity of the content this source produces. Shared copies of a
    /// fetched catalog are stored under it.
    fn scope(&self) -> String {
        self.name().to_string()
    }

    /// Forget any shared copy so the next fetch goes to the origin
    async fn invalidate(&self) -> FetchResult<()> {
        Ok(())
    }
}

/// Bundle names a source downloads, in merge order. Later bundles win on
/// conflicting keys. Bundles can be added and removed while the engine runs;
/// the change takes effect on the next fetch.
#[derive(Debug)]
pub struct BundleSet {
    names: ArcSwap<Vec<String>>,
}

impl BundleSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        Self {
            names: ArcSwap::from_pointee(unique),
        }
    }

    pub fn names(&self) -> Vec<String> {
        Vec::clone(&self.names.load())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.load().iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.load().is_empty()
    }

    /// Append a bundle; `false` if it was already present
    pub fn add(&self, name: &str) -> bool {
        let mut added = false;
        self.names.rcu(|current| {
            let mut next = Vec::clone(current);
            added = !next.iter().any(|n| n == name);
            if added {
                next.push(name.to_string());
            }
            next
        });
        debug!(bundle = name, added = added, "Bundle added");
        added
    }

    /// Remove a bundle; `false` if it was not present
    pub fn remove(&self, name: &str) -> bool {
        let mut removed = false;
        self.names.rcu(|current| {
            let mut next = Vec::clone(current);
            let before = next.len();
            next.retain(|n| n != name);
            removed = next.len() != before;
            next
        });
        debug!(bundle = name, removed = removed, "Bundle removed");
        removed
    }
}

/// Log dropped entries and reject a catalog with nothing usable in it
pub(crate) fn finish_fetch(source: &str, parsed: ParsedCatalog) -> FetchResult<ParsedCatalog> {
    for dropped in &parsed.dropped {
        warn!(
            source = source,
            locale = %dropped.locale,
            key = %dropped.key,
            reason = %dropped.reason,
            "Dropped malformed catalog entry"
        );
    }

    if parsed.usable_locales() == 0 {
        return Err(FetchError::MalformedDocument(format!(
            "no usable locales ({} entries dropped)",
            parsed.dropped.len()
        )));
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::catalog::TranslationEntry;
    use crate::i18n::locale::Locale;

    #[test]
    fn test_empty_catalog_rejected() {
        let mut parsed = ParsedCatalog::new();
        parsed.drop_entry("en", "a", "null value");

        let err = finish_fetch("test", parsed).unwrap_err();
        assert_eq!(
            err,
            FetchError::MalformedDocument("no usable locales (1 entries dropped)".to_string())
        );
    }

    #[test]
    fn test_bundle_set_keeps_order_and_uniqueness() {
        let bundles = BundleSet::new(["messages.json", "commands.json", "messages.json"]);
        assert_eq!(bundles.names(), vec!["messages.json", "commands.json"]);

        assert!(bundles.add("items.json"));
        assert!(!bundles.add("commands.json"));
        assert!(bundles.remove("messages.json"));
        assert!(!bundles.remove("messages.json"));
        assert_eq!(bundles.names(), vec!["commands.json", "items.json"]);
        assert!(bundles.contains("items.json"));
        assert_eq!(bundles.len(), 2);
    }

    #[test]
    fn test_partial_catalog_accepted() {
        let mut parsed = ParsedCatalog::new();
        parsed.insert(Locale::parse("en").unwrap(), "a", TranslationEntry::simple("A"));
        parsed.drop_entry("en", "b", "null value");

        let parsed = finish_fetch("test", parsed).unwrap();
        assert_eq!(parsed.entry_count(), 1);
        assert_eq!(parsed.dropped.len(), 1);
    }
}
