//! Reload coordination tests
//!
//! Catalog reloads through the engine, against a translations directory,
//! `.properties` bundles and a mock OneSky API.

mod helpers;

use std::time::Duration;

use assert_matches::assert_matches;
use helpers::*;
use serde_json::json;
use serial_test::serial;
use skycommon_i18n::i18n::{Arguments, I18n, Locale, LocaleDefinition, ReloadState};
use skycommon_i18n::{CatalogEvent, FetchError, I18nError};

fn loc(tag: &str) -> Locale {
    Locale::parse(tag).unwrap()
}

async fn wait_for_version(i18n: &I18n, version: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while i18n.stats().version < version {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("catalog never reached version {}", version));
}

#[tokio::test]
async fn test_directory_reload_publishes_event() {
    init_test_env();
    let dir = tempfile::tempdir().unwrap();
    write_translation_file(dir.path(), "en", &json!({ "greeting": "Hello", "bad": null }));
    write_translation_file(dir.path(), "pt", &json!({ "greeting": "Olá" }));

    let i18n = I18n::from_settings(&directory_settings(dir.path())).unwrap();
    let mut events = i18n.subscribe();

    let outcome = tokio_test::assert_ok!(i18n.reload().await);
    assert_eq!((outcome.previous_version, outcome.new_version), (0, 1));
    assert_eq!(outcome.dropped_entries, 1);
    assert_eq!(outcome.locales, 2);

    assert_matches!(
        events.recv().await.unwrap(),
        CatalogEvent::CatalogReloaded { previous_version: 0, new_version: 1, dropped_entry_count: 1, locales, .. }
            if locales == vec!["en".to_string(), "pt".to_string()]
    );

    let stats = i18n.stats();
    assert_eq!(stats.version, 1);
    assert_eq!(stats.total_entries, 2);
    assert_eq!(i18n.diagnostics().dropped_entries, 1);
}

#[tokio::test]
async fn test_failed_reload_keeps_current_catalog() {
    init_test_env();
    let dir = tempfile::tempdir().unwrap();
    write_translation_file(dir.path(), "en", &json!({ "greeting": "Hello" }));

    let i18n = I18n::from_settings(&directory_settings(dir.path())).unwrap();
    tokio_test::assert_ok!(i18n.reload().await);
    let mut events = i18n.subscribe();

    std::fs::write(dir.path().join("en.json"), "{ truncated").unwrap();
    let err = tokio_test::assert_err!(i18n.reload().await);
    assert_matches!(err, FetchError::MalformedDocument(_));

    assert_eq!(i18n.stats().version, 1);
    assert_eq!(i18n.t("greeting", Some("en"), &Arguments::new()).await, "Hello");

    let status = i18n.reload_status();
    assert_eq!(status.state, ReloadState::Idle);
    assert_eq!(status.consecutive_failures, 1);
    assert!(status.last_error.is_some());
    assert_matches!(
        events.recv().await.unwrap(),
        CatalogEvent::ReloadFailed { consecutive_failures: 1, .. }
    );
}

#[tokio::test]
async fn test_runtime_locale_is_picked_up_by_next_reload() {
    init_test_env();
    let dir = tempfile::tempdir().unwrap();
    write_translation_file(dir.path(), "en", &json!({ "greeting": "Hello" }));
    write_translation_file(dir.path(), "it", &json!({ "greeting": "Ciao" }));

    let i18n = I18n::from_settings(&directory_settings(dir.path())).unwrap();
    tokio_test::assert_ok!(i18n.reload().await);
    assert_eq!(i18n.t("greeting", Some("it"), &Arguments::new()).await, "Hello");

    i18n.register_locale(LocaleDefinition::new(loc("it")).with_name("Italiano"));
    tokio_test::assert_ok!(i18n.reload().await);

    let result = i18n.resolve("greeting", &loc("it"), &Arguments::new()).await;
    assert_eq!(result.text, "Ciao");
    assert!(!result.fallback_used);
}

#[tokio::test]
async fn test_background_reloader_trigger_and_shutdown() {
    init_test_env();
    let dir = tempfile::tempdir().unwrap();
    write_translation_file(dir.path(), "en", &json!({ "greeting": "Hello" }));

    let i18n = I18n::from_settings(&directory_settings(dir.path())).unwrap();
    let handle = i18n.start();
    wait_for_version(&i18n, 1).await;

    write_translation_file(dir.path(), "en", &json!({ "greeting": "Hello again" }));
    handle.trigger();
    wait_for_version(&i18n, 2).await;
    assert_eq!(i18n.t("greeting", None, &Arguments::new()).await, "Hello again");

    handle.shutdown().await;
    assert!(i18n.reload_status().last_success.is_some());
}

#[tokio::test]
async fn test_background_reloader_retries_after_failure() {
    init_test_env();
    let dir = tempfile::tempdir().unwrap();

    // No files yet: the first cycles fail and are retried with backoff
    let i18n = I18n::from_settings(&directory_settings(dir.path())).unwrap();
    let handle = i18n.start();

    tokio::time::timeout(Duration::from_secs(5), async {
        while i18n.reload_status().consecutive_failures < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    write_translation_file(dir.path(), "en", &json!({ "greeting": "Hello" }));
    wait_for_version(&i18n, 1).await;
    assert_eq!(i18n.reload_status().consecutive_failures, 0);

    handle.shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_onesky_end_to_end() {
    init_test_env();
    let mock = OneSkyMockServer::new().await;
    mock.mock_export("messages.json", sample_export()).await;

    let i18n = I18n::from_settings(&onesky_settings(&mock.api_url(), &["messages.json"])).unwrap();
    let outcome = tokio_test::assert_ok!(i18n.reload().await);
    assert_eq!(outcome.dropped_entries, 3);

    let greet = Arguments::new().with("name", "Ana");
    assert_eq!(i18n.t("greeting", Some("en-GB"), &greet).await, "Hello, Ana!");

    // Upstream outage keeps serving the installed catalog
    mock.reset().await;
    mock.mock_raw("messages.json", 500, "internal error").await;
    assert_matches!(i18n.reload().await, Err(FetchError::Network(_)));
    assert_eq!(i18n.t("greeting", Some("pt-BR"), &greet).await, "Oi, Ana!");

    // Recovery installs the new content
    mock.reset().await;
    mock.mock_export(
        "messages.json",
        json!({ "en": { "translation": { "greeting": "Welcome back, {name}!" } } }),
    )
    .await;
    let outcome = tokio_test::assert_ok!(i18n.reload().await);
    assert_eq!(outcome.new_version, 2);
    assert_eq!(i18n.t("greeting", Some("pt-BR"), &greet).await, "Welcome back, Ana!");
    assert_eq!(i18n.reload_status().consecutive_failures, 0);
}

#[tokio::test]
#[serial]
async fn test_bundles_added_and_removed_at_runtime() {
    init_test_env();
    let mock = OneSkyMockServer::new().await;
    mock.mock_export("messages.json", sample_export()).await;
    mock.mock_export("commands.json", commands_export()).await;

    let i18n = I18n::from_settings(&onesky_settings(&mock.api_url(), &["messages.json"])).unwrap();
    tokio_test::assert_ok!(i18n.reload().await);
    let args = Arguments::new();
    assert_eq!(i18n.t("commands.help", Some("en"), &args).await, "commands.help");

    let mut events = i18n.subscribe();
    assert!(tokio_test::assert_ok!(i18n.add_bundle("commands.json").await));
    assert_eq!(i18n.bundles(), vec!["messages.json", "commands.json"]);
    assert_eq!(i18n.t("commands.help", Some("en"), &args).await, "Show help");
    assert_matches!(events.recv().await.unwrap(), CatalogEvent::CatalogReloaded { new_version: 2, .. });
    assert_matches!(
        events.recv().await.unwrap(),
        CatalogEvent::BundleAdded { bundle } if bundle == "commands.json"
    );

    // Adding twice is a no-op
    assert!(!tokio_test::assert_ok!(i18n.add_bundle("commands.json").await));
    assert_eq!(i18n.stats().version, 2);

    assert!(tokio_test::assert_ok!(i18n.remove_bundle("commands.json").await));
    assert_eq!(i18n.bundles(), vec!["messages.json"]);
    assert_eq!(i18n.t("commands.help", Some("en"), &args).await, "commands.help");
    assert_matches!(
        events.recv().await.unwrap(),
        CatalogEvent::BundleRemoved { bundle } if bundle == "commands.json"
    );
    assert_matches!(events.recv().await.unwrap(), CatalogEvent::CatalogReloaded { new_version: 3, .. });

    assert!(!tokio_test::assert_ok!(i18n.remove_bundle("commands.json").await));
}

#[tokio::test]
#[serial]
async fn test_failed_bundle_add_is_rolled_back() {
    init_test_env();
    let mock = OneSkyMockServer::new().await;
    mock.mock_export("messages.json", sample_export()).await;
    mock.mock_raw("missing.json", 404, "no such file").await;

    let i18n = I18n::from_settings(&onesky_settings(&mock.api_url(), &["messages.json"])).unwrap();
    tokio_test::assert_ok!(i18n.reload().await);

    let err = tokio_test::assert_err!(i18n.add_bundle("missing.json").await);
    assert_matches!(err, I18nError::Fetch(_));
    assert_eq!(i18n.bundles(), vec!["messages.json"]);
    assert_eq!(i18n.stats().version, 1);

    // The next reload no longer asks for the rejected bundle
    tokio_test::assert_ok!(i18n.reload().await);
    assert_eq!(i18n.stats().version, 2);
}

#[tokio::test]
async fn test_properties_engine_reloads_bundles() {
    init_test_env();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("messages.properties"),
        "greeting = Hello, {name}!\nitems_one = {count} item\nitems_other = {count} items\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("messages_pt.properties"), "greeting = Ol\\u00e1, {name}!\n").unwrap();
    std::fs::write(dir.path().join("extra_en.properties"), "farewell = Bye\n").unwrap();

    let i18n = I18n::from_settings(&properties_settings(dir.path(), &["messages"])).unwrap();
    tokio_test::assert_ok!(i18n.reload().await);

    let greet = Arguments::new().with("name", "Ana");
    assert_eq!(i18n.t("greeting", Some("pt-BR"), &greet).await, "Olá, Ana!");
    assert_eq!(i18n.t("items", Some("en"), &Arguments::new().with("count", 2)).await, "2 items");
    assert_eq!(i18n.t("farewell", Some("en"), &Arguments::new()).await, "farewell");

    assert!(tokio_test::assert_ok!(i18n.add_bundle("extra").await));
    assert_eq!(i18n.t("farewell", Some("en"), &Arguments::new()).await, "Bye");
}

#[tokio::test]
async fn test_directory_source_has_no_bundles() {
    init_test_env();
    let dir = tempfile::tempdir().unwrap();
    write_translation_file(dir.path(), "en", &json!({ "greeting": "Hello" }));

    let i18n = I18n::from_settings(&directory_settings(dir.path())).unwrap();
    assert!(i18n.bundles().is_empty());
    assert_matches!(i18n.add_bundle("messages").await, Err(I18nError::Config(_)));
}
