//! Internationalization module
//!
//! Locale handling, catalogs, message templates, resolution and catalog
//! reloading. [`I18n`] is the entry point; the submodules are public for
//! callers that assemble the pieces themselves.

pub mod arguments;
pub mod catalog;
pub mod diagnostics;
pub mod engine;
pub mod locale;
pub mod parser;
pub mod plural;
pub mod reload;
pub mod resolver;
pub mod template;

// Re-export commonly used i18n components
pub use arguments::{ArgValue, Arguments};
pub use catalog::{Catalog, CatalogStats, CatalogStore, LocaleStats, ParsedCatalog, TranslationEntry};
pub use diagnostics::{Diagnostics, DiagnosticsSnapshot};
pub use engine::I18n;
pub use locale::{Locale, LocaleDefinition, LocaleRegistry};
pub use plural::{plural_category, PluralCategory};
pub use reload::{ReloadCoordinator, ReloadHandle, ReloadOutcome, ReloadState, ReloadStatus};
pub use resolver::{ResolvedResult, Resolver};
pub use template::{Color, Decoration, FormatSpan, Style};
