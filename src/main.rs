//! SkyCommon i18n service
//!
//! Main application entry point. Keeps the translation catalog fresh and the
//! shared cache warm; send SIGHUP to force a reload.

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use skycommon_i18n::{
    config::Settings,
    i18n::I18n,
    utils::{helpers::format_timestamp, logging},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new().context("failed to load settings")?;
    settings.validate().context("invalid settings")?;

    // Initialize logging
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", skycommon_i18n::info());

    let i18n = I18n::from_settings(&settings).context("failed to build i18n engine")?;

    let mut events = i18n.subscribe();
    let event_logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => logging::log_catalog_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped = skipped, "Event logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let reloader = i18n.start();
    info!("SkyCommon i18n is ready!");

    wait_for_shutdown(&i18n, &reloader).await?;

    info!("Shutting down...");
    reloader.shutdown().await;
    event_logger.abort();

    let status = i18n.reload_status();
    info!(
        version = status.current_version,
        last_success = status.last_success.map(format_timestamp).as_deref(),
        consecutive_failures = status.consecutive_failures,
        diagnostics = ?i18n.diagnostics(),
        "SkyCommon i18n has been shut down"
    );

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown(i18n: &I18n, reloader: &skycommon_i18n::i18n::ReloadHandle) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for ctrl-c")?;
                return Ok(());
            }
            _ = hangup.recv() => {
                info!(version = i18n.stats().version, "SIGHUP received, reloading catalog");
                reloader.trigger();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_i18n: &I18n, _reloader: &skycommon_i18n::i18n::ReloadHandle) -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    Ok(())
}
