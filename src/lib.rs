//! SkyCommon i18n
//!
//! Locale resolution and translation caching for SkyCommon services.
//! Catalogs are pulled from OneSky (or a local directory), published as
//! immutable versioned snapshots, and resolved with locale fallback,
//! pluralization and argument substitution. Resolved messages are shared
//! between instances through Redis.

pub mod config;
pub mod services;
pub mod i18n;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{FetchError, I18nError, Result};

// Re-export main components for easy access
pub use i18n::{Arguments, I18n, Locale, ResolvedResult};
pub use services::CatalogEvent;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
