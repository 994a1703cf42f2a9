//! Services module
//!
//! This module contains the engine's external integrations: catalog sources,
//! the shared translation cache and the lifecycle event bus.

pub mod cache;
pub mod directory;
pub mod events;
pub mod onesky;
pub mod properties;
pub mod shared;
pub mod source;

// Re-export commonly used services
pub use cache::{CacheBackend, CacheKey, MemoryCacheBackend, RedisCacheBackend, SharedStore, TranslationCache};
pub use directory::DirectorySource;
pub use events::{CatalogEvent, EventBus};
pub use onesky::OneSkySource;
pub use properties::PropertiesSource;
pub use shared::SharedCatalogSource;
pub use source::{BundleSet, CatalogSource};
