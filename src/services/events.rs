//! Catalog lifecycle events
//!
//! Published on a broadcast channel for whatever collaborator wants them
//! (audit logs, admin notifications, metrics). The engine itself never
//! subscribes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Lifecycle event emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CatalogEvent {
    CatalogReloaded {
        previous_version: u64,
        new_version: u64,
        dropped_entry_count: usize,
        locales: Vec<String>,
        reloaded_at: DateTime<Utc>,
    },
    ReloadFailed {
        error: String,
        consecutive_failures: u32,
        retry_in: Duration,
    },
    LocaleRegistered {
        locale: String,
    },
    LocaleRemoved {
        locale: String,
    },
    BundleAdded {
        bundle: String,
    },
    BundleRemoved {
        bundle: String,
    },
}

impl CatalogEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CatalogEvent::CatalogReloaded { .. } => "catalog_reloaded",
            CatalogEvent::ReloadFailed { .. } => "reload_failed",
            CatalogEvent::LocaleRegistered { .. } => "locale_registered",
            CatalogEvent::LocaleRemoved { .. } => "locale_removed",
            CatalogEvent::BundleAdded { .. } => "bundle_added",
            CatalogEvent::BundleRemoved { .. } => "bundle_removed",
        }
    }
}

/// Fan-out of [`CatalogEvent`]s to any number of subscribers
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CatalogEvent>,
}

impl EventBus {
    /// Subscribers lagging more than `capacity` events behind lose the oldest ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event, returning the number of subscribers reached
    pub fn publish(&self, event: CatalogEvent) -> usize {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => {
                trace!(event = name, receivers = receivers, "Event published");
                receivers
            }
            Err(_) => {
                trace!(event = name, "Event published with no subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
