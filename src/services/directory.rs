//! Local directory catalog source
//!
//! Reads `<dir>/<locale>.json` for every locale in the registry. Each file
//! holds one nested translation object in the same shape as the `translation`
//! node of a OneSky export.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::i18n::catalog::ParsedCatalog;
use crate::i18n::locale::LocaleRegistry;
use crate::i18n::parser::{parse_translations, ParsePolicy};
use crate::utils::errors::{FetchError, FetchResult};
use super::source::{finish_fetch, CatalogSource};

#[derive(Debug, Clone)]
pub struct DirectorySource {
    directory: PathBuf,
    registry: Arc<LocaleRegistry>,
    policy: ParsePolicy,
}

impl DirectorySource {
    pub fn new(directory: impl Into<PathBuf>, registry: Arc<LocaleRegistry>, policy: ParsePolicy) -> Self {
        Self {
            directory: directory.into(),
            registry,
            policy,
        }
    }
}

#[async_trait]
impl CatalogSource for DirectorySource {
    async fn fetch(&self) -> FetchResult<ParsedCatalog> {
        let mut parsed = ParsedCatalog::new();

        for locale in self.registry.locales() {
            let file_path = self.directory.join(format!("{}.json", locale));

            let content = match fs::read(&file_path).await {
                Ok(content) => content,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!(locale = %locale, path = %file_path.display(), "Translation file not found");
                    continue;
                }
                Err(e) => {
                    return Err(FetchError::Io(format!(
                        "failed to read {}: {}",
                        file_path.display(),
                        e
                    )));
                }
            };

            match serde_json::from_slice::<Value>(&content) {
                Ok(Value::Object(translations)) => {
                    let before = parsed.entry_count();
                    parse_translations(&locale, &translations, &self.policy, &mut parsed);
                    debug!(
                        locale = %locale,
                        keys = parsed.entry_count() - before,
                        "Loaded translation file"
                    );
                }
                Ok(_) => parsed.drop_entry(locale.as_str(), "*", "translation file is not an object"),
                Err(e) => parsed.drop_entry(locale.as_str(), "*", format!("invalid JSON: {}", e)),
            }
        }

        let parsed = finish_fetch(self.name(), parsed)?;
        info!(
            directory = %self.directory.display(),
            locales = parsed.usable_locales(),
            entries = parsed.entry_count(),
            "Loaded catalog from directory"
        );
        Ok(parsed)
    }

    fn name(&self) -> &str {
        "directory"
    }
}
