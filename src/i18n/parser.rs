//! Catalog document parsing
//!
//! Catalog documents are untrusted input. Parsing follows a partial-success
//! policy: malformed entries are dropped and recorded in
//! [`ParsedCatalog::dropped`], and only a document that is unreadable as a
//! whole is rejected.
//!
//! Translation objects are nested JSON. Nested objects are flattened with `.`,
//! an object whose keys are all plural categories is a plural entry, and
//! i18next suffix keys (`items_one`, `items_other`, `items_plural`) are grouped
//! into the `items` entry.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};
use tracing::debug;

use crate::config::I18nConfig;
use crate::utils::errors::{FetchError, FetchResult};
use super::catalog::{ParsedCatalog, TranslationEntry};
use super::locale::Locale;
use super::plural::PluralCategory;
use super::template::Template;

/// Validation rules applied while parsing
#[derive(Debug, Clone)]
pub struct ParsePolicy {
    allowed_categories: BTreeSet<PluralCategory>,
}

impl ParsePolicy {
    pub fn new(allowed: impl IntoIterator<Item = PluralCategory>) -> Self {
        Self {
            allowed_categories: allowed.into_iter().collect(),
        }
    }

    /// Unknown category names are ignored; validation rejects them earlier.
    pub fn from_config(config: &I18nConfig) -> Self {
        Self::new(
            config
                .plural_categories
                .iter()
                .filter_map(|name| PluralCategory::parse(name)),
        )
    }

    pub fn allows(&self, category: PluralCategory) -> bool {
        self.allowed_categories.contains(&category)
    }
}

impl Default for ParsePolicy {
    fn default() -> Self {
        Self::new(PluralCategory::ALL)
    }
}

/// Turns a fetched document into a [`ParsedCatalog`]
pub trait DocumentParser: Send + Sync {
    /// Export format name requested from the remote service
    fn format(&self) -> &'static str;

    fn parse(&self, body: &[u8], policy: &ParsePolicy) -> FetchResult<ParsedCatalog>;
}

/// OneSky `I18NEXT_MULTILINGUAL_JSON` export:
/// `{ "<locale>": { "translation": { ... } } }`
#[derive(Debug, Clone, Copy, Default)]
pub struct I18nextMultilingualParser;

impl DocumentParser for I18nextMultilingualParser {
    fn format(&self) -> &'static str {
        "I18NEXT_MULTILINGUAL_JSON"
    }

    fn parse(&self, body: &[u8], policy: &ParsePolicy) -> FetchResult<ParsedCatalog> {
        let document: Value = serde_json::from_slice(body)
            .map_err(|e| FetchError::MalformedDocument(e.to_string()))?;
        let Value::Object(languages) = document else {
            return Err(FetchError::MalformedDocument(
                "top-level value is not an object".to_string(),
            ));
        };

        let mut parsed = ParsedCatalog::new();
        for (tag, node) in &languages {
            let Ok(locale) = Locale::parse(tag) else {
                parsed.drop_entry(tag, "*", "invalid locale identifier");
                continue;
            };
            match node.get("translation") {
                Some(Value::Object(translations)) => {
                    parse_translations(&locale, translations, policy, &mut parsed);
                }
                _ => parsed.drop_entry(tag, "*", "missing translation object"),
            }
        }

        Ok(parsed)
    }
}

enum RawEntry {
    Text(String),
    Plural(BTreeMap<PluralCategory, String>),
}

/// Parse one locale's nested translation object into `out`
pub fn parse_translations(
    locale: &Locale,
    translations: &Map<String, Value>,
    policy: &ParsePolicy,
    out: &mut ParsedCatalog,
) {
    let mut flat = BTreeMap::new();
    let mut path = KeyPath::default();
    flatten(locale, translations, policy, &mut path, &mut flat, out);

    let mut groups: BTreeMap<String, BTreeMap<PluralCategory, String>> = BTreeMap::new();
    let suffixed: Vec<(String, String, PluralCategory)> = flat
        .iter()
        .filter_map(|(key, raw)| match raw {
            RawEntry::Text(_) => split_plural_suffix(key)
                .filter(|(base, _)| has_other_variant(&flat, base))
                .map(|(base, category)| (key.clone(), base.to_string(), category)),
            RawEntry::Plural(_) => None,
        })
        .collect();
    for (key, base, category) in suffixed {
        if let Some(RawEntry::Text(text)) = flat.remove(&key) {
            groups.entry(base).or_default().insert(category, text);
        }
    }

    let mut added = 0usize;
    for (base, variants) in groups {
        if let Some(category) = variants.keys().find(|c| !policy.allows(**c)) {
            flat.remove(&base);
            out.drop_entry(locale.as_str(), &base, format!("plural category {} not allowed", category));
            continue;
        }
        let mut variants: BTreeMap<PluralCategory, Template> = variants
            .into_iter()
            .map(|(category, text)| (category, Template::parse(text)))
            .collect();

        let entry = match flat.remove(&base) {
            Some(RawEntry::Text(text)) => TranslationEntry::with_variants(Template::parse(text), variants),
            Some(RawEntry::Plural(object)) => {
                variants.extend(object.into_iter().map(|(c, t)| (c, Template::parse(t))));
                match TranslationEntry::plural(variants) {
                    Some(entry) => entry,
                    None => continue,
                }
            }
            None => match TranslationEntry::plural(variants) {
                Some(entry) => entry,
                None => continue,
            },
        };
        out.insert(locale.clone(), base, entry);
        added += 1;
    }

    for (key, raw) in flat {
        let entry = match raw {
            RawEntry::Text(text) => TranslationEntry::simple(text),
            RawEntry::Plural(object) => {
                let variants = object
                    .into_iter()
                    .map(|(c, t)| (c, Template::parse(t)))
                    .collect();
                match TranslationEntry::plural(variants) {
                    Some(entry) => entry,
                    None => continue,
                }
            }
        };
        out.insert(locale.clone(), key, entry);
        added += 1;
    }

    debug!(locale = %locale, entries = added, "Parsed locale translations");
}

fn flatten(
    locale: &Locale,
    object: &Map<String, Value>,
    policy: &ParsePolicy,
    path: &mut KeyPath,
    flat: &mut BTreeMap<String, RawEntry>,
    out: &mut ParsedCatalog,
) {
    for (segment, value) in object {
        path.push(segment);
        let key = path.build();

        if segment.trim().is_empty() {
            out.drop_entry(locale.as_str(), &key, "empty key segment");
            path.pop();
            continue;
        }

        match value {
            Value::String(text) => {
                flat.insert(key, RawEntry::Text(text.clone()));
            }
            Value::Object(nested) if nested.is_empty() => {
                out.drop_entry(locale.as_str(), &key, "empty object");
            }
            Value::Object(nested) if is_plural_object(nested) => {
                let mut variants = BTreeMap::new();
                let mut malformed = None;
                for (name, variant) in nested {
                    let category = PluralCategory::parse(name).unwrap_or(PluralCategory::Other);
                    match variant {
                        Value::String(text) if policy.allows(category) => {
                            variants.insert(category, text.clone());
                        }
                        Value::String(_) => {
                            malformed = Some(format!("plural category {} not allowed", category));
                            break;
                        }
                        _ => {
                            malformed = Some(format!("plural variant {} is not a string", category));
                            break;
                        }
                    }
                }
                match malformed {
                    Some(reason) => out.drop_entry(locale.as_str(), &key, reason),
                    None => {
                        flat.insert(key, RawEntry::Plural(variants));
                    }
                }
            }
            Value::Object(nested) => flatten(locale, nested, policy, path, flat, out),
            Value::Null => out.drop_entry(locale.as_str(), &key, "null value"),
            Value::Bool(_) | Value::Number(_) | Value::Array(_) => {
                out.drop_entry(locale.as_str(), &key, "unsupported value type");
            }
        }

        path.pop();
    }
}

fn is_plural_object(object: &Map<String, Value>) -> bool {
    object.keys().all(|k| PluralCategory::parse(k).is_some())
}

fn split_plural_suffix(key: &str) -> Option<(&str, PluralCategory)> {
    let (base, suffix) = key.rsplit_once('_')?;
    if base.is_empty() {
        return None;
    }
    let category = match suffix {
        "plural" => PluralCategory::Other,
        other => PluralCategory::parse(other)?,
    };
    Some((base, category))
}

fn has_other_variant(flat: &BTreeMap<String, RawEntry>, base: &str) -> bool {
    flat.contains_key(&format!("{}_other", base)) || flat.contains_key(&format!("{}_plural", base))
}

/// Dotted key under construction while walking nested objects
#[derive(Debug, Default)]
struct KeyPath {
    buffer: String,
    lengths: Vec<usize>,
}

impl KeyPath {
    fn push(&mut self, segment: &str) {
        let before = self.buffer.len();
        if !self.buffer.is_empty() {
            self.buffer.push('.');
        }
        self.buffer.push_str(segment);
        self.lengths.push(before);
    }

    fn pop(&mut self) {
        if let Some(before) = self.lengths.pop() {
            self.buffer.truncate(before);
        }
    }

    fn build(&self) -> String {
        self.buffer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loc(tag: &str) -> Locale {
        Locale::parse(tag).unwrap()
    }

    fn parse(document: Value, policy: &ParsePolicy) -> ParsedCatalog {
        let body = serde_json::to_vec(&document).unwrap();
        I18nextMultilingualParser.parse(&body, policy).unwrap()
    }

    #[test]
    fn test_nested_keys_are_flattened() {
        let parsed = parse(
            json!({"en": {"translation": {"commands": {"start": {"welcome": "Hi {name}"}}, "bye": "Bye"}}}),
            &ParsePolicy::default(),
        );

        let en = &parsed.locales[&loc("en")];
        assert_eq!(en["commands.start.welcome"].template().raw(), "Hi {name}");
        assert_eq!(en["bye"].template().raw(), "Bye");
        assert!(parsed.dropped.is_empty());
    }

    #[test]
    fn test_plural_object_entry() {
        let parsed = parse(
            json!({"en": {"translation": {"items": {"one": "{n} item", "other": "{n} items"}}}}),
            &ParsePolicy::default(),
        );

        let entry = &parsed.locales[&loc("en")]["items"];
        assert!(entry.is_plural());
        assert_eq!(entry.select(Some(PluralCategory::Other)).raw(), "{n} items");
        assert_eq!(entry.select(None).raw(), "{n} item");
    }

    #[test]
    fn test_i18next_suffixes_grouped() {
        let parsed = parse(
            json!({"en": {"translation": {
                "apple": "an apple",
                "apple_one": "{count} apple",
                "apple_other": "{count} apples",
                "legacy": "{count} file",
                "legacy_plural": "{count} files",
                "level_one": "Level one"
            }}}),
            &ParsePolicy::default(),
        );

        let en = &parsed.locales[&loc("en")];
        assert_eq!(en["apple"].template().raw(), "an apple");
        assert_eq!(en["apple"].select(Some(PluralCategory::Other)).raw(), "{count} apples");
        assert_eq!(en["legacy"].select(Some(PluralCategory::Few)).raw(), "{count} files");
        // No sibling `_other`, so this stays a plain key
        assert_eq!(en["level_one"].template().raw(), "Level one");
        assert!(!en.contains_key("apple_one"));
    }

    #[test]
    fn test_malformed_entries_dropped_not_fatal() {
        let policy = ParsePolicy::new([PluralCategory::One, PluralCategory::Other]);
        let parsed = parse(
            json!({
                "en": {"translation": {
                    "ok": "fine",
                    "number": 5,
                    "list": ["a"],
                    "nothing": null,
                    "slavic": {"one": "a", "few": "b", "other": "c"},
                    "bad_variant": {"one": "a", "other": 3},
                    "": "empty"
                }},
                "xx yy": {"translation": {"a": "b"}},
                "de": {"strings": {}}
            }),
            &policy,
        );

        assert_eq!(parsed.usable_locales(), 1);
        assert_eq!(parsed.entry_count(), 1);
        let reasons: Vec<_> = parsed.dropped.iter().map(|d| (d.key.as_str(), d.reason.as_str())).collect();
        assert!(reasons.contains(&("number", "unsupported value type")));
        assert!(reasons.contains(&("list", "unsupported value type")));
        assert!(reasons.contains(&("nothing", "null value")));
        assert!(reasons.contains(&("slavic", "plural category few not allowed")));
        assert!(reasons.contains(&("bad_variant", "plural variant other is not a string")));
        assert!(reasons.contains(&("", "empty key segment")));
        assert_eq!(parsed.dropped.iter().filter(|d| d.key == "*").count(), 2);
    }

    #[test]
    fn test_disallowed_suffix_drops_group() {
        let policy = ParsePolicy::new([PluralCategory::One, PluralCategory::Other]);
        let parsed = parse(
            json!({"ru": {"translation": {"x_one": "a", "x_few": "b", "x_other": "c"}}}),
            &policy,
        );
        assert_eq!(parsed.entry_count(), 0);
        assert_eq!(parsed.dropped[0].key, "x");
    }

    #[test]
    fn test_unreadable_document_rejected() {
        let policy = ParsePolicy::default();
        assert!(matches!(
            I18nextMultilingualParser.parse(b"not json", &policy),
            Err(FetchError::MalformedDocument(_))
        ));
        assert!(matches!(
            I18nextMultilingualParser.parse(b"[1, 2]", &policy),
            Err(FetchError::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_key_path() {
        let mut path = KeyPath::default();
        path.push("a");
        path.push("bc");
        assert_eq!(path.build(), "a.bc");
        path.pop();
        path.push("d");
        assert_eq!(path.build(), "a.d");
        path.pop();
        path.pop();
        assert_eq!(path.build(), "");
    }
}
