//! Java `.properties` catalog source
//!
//! Reads `<dir>/<bundle>_<locale>.properties` for every bundle and every
//! registered locale, with `-` in the tag written as `_` (`messages_pt_BR`).
//! The default locale may also live in the bare `<bundle>.properties`.
//! Bundles are merged in order, so a later bundle overrides earlier keys.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::fs;
use tracing::{debug, info};

use crate::config::PropertiesConfig;
use crate::i18n::catalog::ParsedCatalog;
use crate::i18n::locale::{Locale, LocaleRegistry};
use crate::i18n::parser::{parse_translations, ParsePolicy};
use crate::utils::errors::{FetchError, FetchResult};
use super::source::{finish_fetch, BundleSet, CatalogSource};

/// Catalog source reading `.properties` bundles from a directory
pub struct PropertiesSource {
    directory: PathBuf,
    bundles: Arc<BundleSet>,
    registry: Arc<LocaleRegistry>,
    policy: ParsePolicy,
}

impl PropertiesSource {
    pub fn new(config: &PropertiesConfig, registry: Arc<LocaleRegistry>, policy: ParsePolicy) -> Self {
        Self {
            directory: PathBuf::from(&config.directory),
            bundles: Arc::new(BundleSet::new(config.bundles.iter().cloned())),
            registry,
            policy,
        }
    }

    pub fn bundles(&self) -> Arc<BundleSet> {
        Arc::clone(&self.bundles)
    }

    fn candidates(&self, bundle: &str, locale: &Locale) -> Vec<PathBuf> {
        let mut paths = vec![self
            .directory
            .join(format!("{}_{}.properties", bundle, locale.as_str().replace('-', "_")))];
        if locale == self.registry.default_locale() {
            paths.push(self.directory.join(format!("{}.properties", bundle)));
        }
        paths
    }

    async fn read_first(&self, paths: &[PathBuf]) -> FetchResult<Option<(PathBuf, String)>> {
        for path in paths {
            match fs::read(path).await {
                Ok(bytes) => return Ok(Some((path.clone(), decode(bytes)))),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(FetchError::Io(format!("failed to read {}: {}", path.display(), e)));
                }
            }
        }
        Ok(None)
    }

    async fn load_bundle(&self, bundle: &str, out: &mut ParsedCatalog) -> FetchResult<()> {
        for locale in self.registry.locales() {
            let paths = self.candidates(bundle, &locale);
            let Some((path, content)) = self.read_first(&paths).await? else {
                debug!(bundle = bundle, locale = %locale, "No properties file for locale");
                continue;
            };

            let parsed = parse_properties(&content);
            for (line, reason) in &parsed.errors {
                out.drop_entry(locale.as_str(), &format!("{}:{}", path_name(&path), line), reason.clone());
            }

            let translations: Map<String, Value> = parsed
                .entries
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect();
            let before = out.entry_count();
            parse_translations(&locale, &translations, &self.policy, out);
            debug!(
                bundle = bundle,
                locale = %locale,
                path = %path.display(),
                keys = out.entry_count().saturating_sub(before),
                "Loaded properties file"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogSource for PropertiesSource {
    async fn fetch(&self) -> FetchResult<ParsedCatalog> {
        let names = self.bundles.names();
        let mut merged = ParsedCatalog::new();

        for bundle in &names {
            let mut parsed = ParsedCatalog::new();
            self.load_bundle(bundle, &mut parsed).await?;
            merged.merge(parsed);
        }

        let merged = finish_fetch(self.name(), merged)?;
        info!(
            directory = %self.directory.display(),
            bundles = names.len(),
            locales = merged.usable_locales(),
            entries = merged.entry_count(),
            "Loaded catalog from properties bundles"
        );
        Ok(merged)
    }

    fn name(&self) -> &str {
        "properties"
    }

    fn scope(&self) -> String {
        format!("properties:{}:{}", self.directory.display(), self.bundles.names().join(","))
    }
}

impl std::fmt::Debug for PropertiesSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertiesSource")
            .field("directory", &self.directory)
            .field("bundles", &self.bundles.names())
            .finish()
    }
}

fn path_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// UTF-8 when valid, otherwise ISO-8859-1 as classic `.properties` files are
fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
    }
}

/// Key/value pairs of a `.properties` document, plus lines that could not be read
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PropertiesDocument {
    pub entries: Vec<(String, String)>,
    /// `(line number, reason)`
    pub errors: Vec<(usize, String)>,
}

/// Parse the `java.util.Properties` text format: `#`/`!` comments, `=`, `:`
/// or whitespace separators, backslash line continuations and escapes
/// including `\uXXXX`. Later duplicates win.
pub fn parse_properties(text: &str) -> PropertiesDocument {
    let mut document = PropertiesDocument::default();
    let mut lines = text.lines().enumerate();

    while let Some((index, line)) = lines.next() {
        let first = line.trim_start();
        if first.is_empty() || first.starts_with('#') || first.starts_with('!') {
            continue;
        }

        let mut logical = first.to_string();
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some((_, next)) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (raw_key, raw_value) = split_key_value(&logical);
        match (unescape(raw_key), unescape(raw_value)) {
            (Ok(key), Ok(value)) => {
                document.entries.retain(|(existing, _)| *existing != key);
                document.entries.push((key, value));
            }
            (Err(reason), _) | (_, Err(reason)) => document.errors.push((index + 1, reason)),
        }
    }

    document
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (index, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => return (&line[..index], trim_blank(&line[index + 1..])),
            c if is_blank(c) => {
                let rest = trim_blank(&line[index..]);
                let rest = rest
                    .strip_prefix(|c: char| c == '=' || c == ':')
                    .map_or(rest, trim_blank);
                return (&line[..index], rest);
            }
            _ => {}
        }
    }
    (line, "")
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

fn trim_blank(text: &str) -> &str {
    text.trim_start_matches(is_blank)
}

fn unescape(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .and_then(char::from_u32)
                    .ok_or_else(|| format!("malformed \\u escape: \\u{}", hex))?;
                out.push(decoded);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    Ok(out)
}
