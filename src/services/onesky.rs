//! OneSky catalog source
//!
//! Downloads the multilingual export of every configured bundle from the
//! OneSky platform API and merges them into one catalog. Bundles are fetched
//! concurrently; a single failing bundle fails the whole fetch so that keys
//! never disappear because one file was unreachable.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::{Client, StatusCode};
use tracing::{debug, info};

use crate::config::OneSkyConfig;
use crate::i18n::catalog::ParsedCatalog;
use crate::i18n::parser::{DocumentParser, I18nextMultilingualParser, ParsePolicy};
use crate::utils::errors::{FetchError, FetchResult, I18nError, Result};
use crate::utils::helpers::{format_bytes, truncate_text};
use super::source::{finish_fetch, BundleSet, CatalogSource};

/// Catalog source backed by the OneSky platform API
#[derive(Clone)]
pub struct OneSkySource {
    client: Client,
    config: OneSkyConfig,
    timeout: Duration,
    parser: Arc<dyn DocumentParser>,
    policy: ParsePolicy,
    bundles: Arc<BundleSet>,
}

impl OneSkySource {
    /// Create a new OneSkySource instance
    pub fn new(config: OneSkyConfig, policy: ParsePolicy) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_seconds);
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("skycommon-i18n/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(I18nError::Http)?;

        let bundles = Arc::new(BundleSet::new(config.bundles.iter().cloned()));

        Ok(Self {
            client,
            config,
            timeout,
            parser: Arc::new(I18nextMultilingualParser),
            policy,
            bundles,
        })
    }

    /// Replace the document parser (and with it the requested export format)
    pub fn with_parser(mut self, parser: Arc<dyn DocumentParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Bundles downloaded on each fetch
    pub fn bundles(&self) -> Arc<BundleSet> {
        Arc::clone(&self.bundles)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/1/projects/{}/translations/multilingual",
            self.config.api_url.trim_end_matches('/'),
            self.config.project_id
        )
    }

    /// Fetch and parse a single bundle
    async fn fetch_bundle(&self, bundle: &str) -> FetchResult<ParsedCatalog> {
        let timestamp = chrono::Utc::now().timestamp();
        let url = self.endpoint();

        debug!(bundle = bundle, url = %url, "Requesting OneSky export");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("api_key", self.config.api_key.clone()),
                ("timestamp", timestamp.to_string()),
                ("dev_hash", dev_hash(timestamp, &self.config.api_secret)),
                ("source_file_name", bundle.to_string()),
                ("file_format", self.parser.format().to_string()),
            ])
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Authentication(format!("HTTP {} for bundle {}", status, bundle)));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FetchError::Network(format!(
                "HTTP {} for bundle {}: {}",
                status,
                bundle,
                truncate_text(&error_text, 200)
            )));
        }

        let body = response.bytes().await.map_err(|e| self.map_transport_error(e))?;
        let parsed = self.parser.parse(&body, &self.policy)?;

        debug!(
            bundle = bundle,
            size = %format_bytes(body.len() as u64),
            entries = parsed.entry_count(),
            dropped = parsed.dropped.len(),
            "Parsed OneSky export"
        );
        Ok(parsed)
    }

    fn map_transport_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::from(e)
        }
    }
}

#[async_trait]
impl CatalogSource for OneSkySource {
    async fn fetch(&self) -> FetchResult<ParsedCatalog> {
        let names = self.bundles.names();
        let bundles = try_join_all(names.iter().map(|b| self.fetch_bundle(b))).await?;

        let mut merged = ParsedCatalog::new();
        for parsed in bundles {
            merged.merge(parsed);
        }

        let merged = finish_fetch(self.name(), merged)?;
        info!(
            project_id = self.config.project_id,
            bundles = names.len(),
            locales = merged.usable_locales(),
            entries = merged.entry_count(),
            "Fetched catalog from OneSky"
        );
        Ok(merged)
    }

    fn name(&self) -> &str {
        "onesky"
    }

    fn scope(&self) -> String {
        format!("onesky:{}:{}", self.config.project_id, self.bundles.names().join(","))
    }
}

impl std::fmt::Debug for OneSkySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OneSkySource")
            .field("api_url", &self.config.api_url)
            .field("project_id", &self.config.project_id)
            .field("bundles", &self.bundles.names())
            .field("format", &self.parser.format())
            .finish()
    }
}

/// Request signature: hex md5 of the timestamp followed by the API secret
pub fn dev_hash(timestamp: i64, secret: &str) -> String {
    format!("{:x}", md5::compute(format!("{}{}", timestamp, secret)))
}
