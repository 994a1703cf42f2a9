//! Mock OneSky API server for testing
//!
//! This module provides a mock HTTP server that simulates the OneSky platform
//! API multilingual export endpoint. It uses wiremock to create configurable
//! mock responses.

use serde_json::Value;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

pub const TEST_PROJECT_ID: u64 = 4242;
pub const TEST_API_KEY: &str = "test-api-key";
pub const TEST_API_SECRET: &str = "test-api-secret";

/// Configuration for mock responses
#[derive(Debug, Clone)]
pub struct MockResponseConfig {
    pub status: u16,
    pub delay_ms: Option<u64>,
}

impl Default for MockResponseConfig {
    fn default() -> Self {
        Self {
            status: 200,
            delay_ms: None,
        }
    }
}

/// Mock OneSky API server
pub struct OneSkyMockServer {
    pub server: MockServer,
}

impl OneSkyMockServer {
    /// Create a new mock OneSky API server
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn api_url(&self) -> String {
        self.server.uri()
    }

    fn export_path() -> String {
        format!("/1/projects/{}/translations/multilingual", TEST_PROJECT_ID)
    }

    /// Serve `document` as the export of `bundle`
    pub async fn mock_export(&self, bundle: &str, document: Value) {
        self.mock_export_with(bundle, document, MockResponseConfig::default()).await;
    }

    pub async fn mock_export_with(&self, bundle: &str, document: Value, config: MockResponseConfig) {
        let mut response = ResponseTemplate::new(config.status).set_body_json(document);

        if let Some(delay) = config.delay_ms {
            response = response.set_delay(std::time::Duration::from_millis(delay));
        }

        Mock::given(method("GET"))
            .and(path(Self::export_path()))
            .and(query_param("api_key", TEST_API_KEY))
            .and(query_param("source_file_name", bundle))
            .and(query_param("file_format", "I18NEXT_MULTILINGUAL_JSON"))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Answer every export request for `bundle` with `status` and a raw body
    pub async fn mock_raw(&self, bundle: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path(Self::export_path()))
            .and(query_param("source_file_name", bundle))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Drop every mounted mock
    pub async fn reset(&self) {
        self.server.reset().await;
    }

    /// Query parameters of every request received so far
    pub async fn received_queries(&self) -> Vec<Vec<(String, String)>> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|request| {
                request
                    .url
                    .query_pairs()
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .collect()
    }
}
