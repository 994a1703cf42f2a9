//! Catalog reload coordination
//!
//! A reload cycle moves `Idle -> Fetching -> Validating -> Swapping -> Idle`.
//! A failure while fetching or validating moves to `Error` and back to `Idle`
//! without touching the published catalog. Cycles are serialized; resolution
//! never waits on them.
//!
//! The background task reloads once on start, then on a fixed interval or on
//! an explicit trigger. Failed cycles are retried with exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::ReloadConfig;
use crate::services::events::{CatalogEvent, EventBus};
use crate::services::source::CatalogSource;
use crate::utils::errors::{FetchError, FetchResult};
use crate::utils::logging::{log_reload_completed, log_reload_failed};
use super::catalog::{Catalog, CatalogStore};
use super::diagnostics::Diagnostics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadState {
    Idle,
    Fetching,
    Validating,
    Swapping,
    Error,
}

/// Observable state of the coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReloadStatus {
    pub state: ReloadState,
    pub current_version: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    /// Delay before the background task retries after a failure
    pub next_retry_in: Option<Duration>,
}

/// Result of a successful cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadOutcome {
    pub previous_version: u64,
    pub new_version: u64,
    pub dropped_entries: usize,
    pub locales: usize,
    pub entries: usize,
}

pub struct ReloadCoordinator {
    source: Arc<dyn CatalogSource>,
    store: Arc<CatalogStore>,
    events: EventBus,
    diagnostics: Arc<Diagnostics>,
    config: ReloadConfig,
    cycle: Mutex<()>,
    status: ArcSwap<ReloadStatus>,
}

impl ReloadCoordinator {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        store: Arc<CatalogStore>,
        events: EventBus,
        diagnostics: Arc<Diagnostics>,
        config: ReloadConfig,
    ) -> Self {
        let status = ReloadStatus {
            state: ReloadState::Idle,
            current_version: store.current_version(),
            last_success: None,
            last_error: None,
            consecutive_failures: 0,
            next_retry_in: None,
        };

        Self {
            source,
            store,
            events,
            diagnostics,
            config,
            cycle: Mutex::new(()),
            status: ArcSwap::from_pointee(status),
        }
    }

    pub fn status(&self) -> ReloadStatus {
        ReloadStatus::clone(&self.status.load())
    }

    /// Run one reload cycle now, waiting for any cycle already in progress
    pub async fn reload(&self) -> FetchResult<ReloadOutcome> {
        let _cycle = self.cycle.lock().await;

        self.transition(ReloadState::Fetching);
        let parsed = match self.source.fetch().await {
            Ok(parsed) => parsed,
            Err(e) => return Err(self.fail(e)),
        };

        self.transition(ReloadState::Validating);
        if parsed.usable_locales() == 0 {
            return Err(self.fail(FetchError::MalformedDocument("no usable locales".to_string())));
        }
        let dropped_entries = parsed.dropped.len();
        let catalog = Catalog::from_parsed(parsed, self.store.current_version() + 1);

        self.transition(ReloadState::Swapping);
        let new_version = catalog.version();
        let stats = catalog.stats();
        let locales: Vec<String> = stats.locales.iter().map(|l| l.locale.clone()).collect();
        let previous_version = self.store.swap(catalog);
        let now = Utc::now();

        self.update(|status| {
            status.state = ReloadState::Idle;
            status.current_version = new_version;
            status.last_success = Some(now);
            status.last_error = None;
            status.consecutive_failures = 0;
            status.next_retry_in = None;
        });
        self.diagnostics.reload_succeeded(dropped_entries);

        let outcome = ReloadOutcome {
            previous_version,
            new_version,
            dropped_entries,
            locales: locales.len(),
            entries: stats.total_entries,
        };
        log_reload_completed(self.source.name(), &outcome);

        self.events.publish(CatalogEvent::CatalogReloaded {
            previous_version,
            new_version,
            dropped_entry_count: dropped_entries,
            locales,
            reloaded_at: now,
        });

        Ok(outcome)
    }

    /// Drop the source's shared snapshot, then reload from the origin
    pub async fn refresh(&self) -> FetchResult<ReloadOutcome> {
        self.source.invalidate().await?;
        self.reload().await
    }

    fn fail(&self, error: FetchError) -> FetchError {
        let failures = self.status.load().consecutive_failures.saturating_add(1);
        let retry_in = self.backoff(failures);
        let message = error.to_string();

        self.transition(ReloadState::Error);
        self.update(|status| {
            status.state = ReloadState::Idle;
            status.last_error = Some(message.clone());
            status.consecutive_failures = failures;
            status.next_retry_in = Some(retry_in);
        });
        self.diagnostics.reload_failed();
        log_reload_failed(self.source.name(), &error, failures, retry_in);

        self.events.publish(CatalogEvent::ReloadFailed {
            error: message,
            consecutive_failures: failures,
            retry_in,
        });
        error
    }

    /// Delay before retry number `failures` (1-based)
    pub fn backoff(&self, failures: u32) -> Duration {
        let initial = self.config.initial_backoff_ms as f64 / 1000.0;
        let max = self.config.max_backoff_seconds as f64;
        let exponent = failures.saturating_sub(1).min(32) as i32;
        let base = (initial * 2f64.powi(exponent)).min(max);

        let jitter = if self.config.jitter > 0.0 {
            rand::thread_rng().gen::<f64>() * self.config.jitter
        } else {
            0.0
        };

        Duration::try_from_secs_f64((base * (1.0 + jitter)).min(max))
            .unwrap_or(Duration::from_secs(self.config.max_backoff_seconds))
    }

    fn transition(&self, state: ReloadState) {
        debug!(source = self.source.name(), state = ?state, "Reload state changed");
        self.update(|status| status.state = state);
    }

    fn update<F: Fn(&mut ReloadStatus)>(&self, apply: F) {
        self.status.rcu(|current| {
            let mut next = ReloadStatus::clone(current);
            apply(&mut next);
            next
        });
    }

    /// Start the background reload task
    pub fn spawn(self: Arc<Self>) -> ReloadHandle {
        let trigger = Arc::new(Notify::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(Arc::clone(&trigger), shutdown_rx));

        ReloadHandle {
            trigger,
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(self: Arc<Self>, trigger: Arc<Notify>, mut shutdown: watch::Receiver<bool>) {
        let interval = Duration::from_secs(self.config.interval_seconds);
        info!(
            source = self.source.name(),
            interval_seconds = self.config.interval_seconds,
            "Reload coordinator started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let result = tokio::select! {
                result = self.reload() => Some(result),
                _ = shutdown.changed() => None,
            };
            let delay = match result {
                Some(Ok(_)) => interval,
                Some(Err(_)) => self.status().next_retry_in.unwrap_or(interval),
                None => {
                    self.update(|status| status.state = ReloadState::Idle);
                    break;
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = trigger.notified() => debug!("Reload requested"),
                _ = shutdown.changed() => break,
            }
        }

        info!(source = self.source.name(), "Reload coordinator stopped");
    }
}

impl std::fmt::Debug for ReloadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadCoordinator")
            .field("source", &self.source.name())
            .field("status", &self.status())
            .finish()
    }
}

/// Control handle for the background reload task
#[derive(Debug)]
pub struct ReloadHandle {
    trigger: Arc<Notify>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReloadHandle {
    /// Request a reload without waiting for the interval
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Stop the task, abandoning any cycle in progress
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            debug!(error = %e, "Reload task ended abnormally");
        }
    }
}
