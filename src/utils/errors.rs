//! Error handling for SkyCommon i18n
//!
//! This module defines the error types used throughout the engine. Resolution
//! itself never fails; these errors surface from configuration, catalog
//! sources and the cache backends, where they are either propagated to the
//! operator or swallowed at the component boundary.

use std::time::Duration;
use thiserror::Error;

/// Main error type for the i18n engine
#[derive(Error, Debug)]
pub enum I18nError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Invalid locale: {0}")]
    InvalidLocale(String),

    #[error("Catalog fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Errors raised while fetching or parsing a catalog snapshot
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("network failure: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("I/O failure: {0}")]
    Io(String),

    #[error("shared catalog lock unavailable: {0}")]
    Lock(String),
}

/// Result type alias for i18n operations
pub type Result<T> = std::result::Result<T, I18nError>;

/// Result type alias for catalog fetches
pub type FetchResult<T> = std::result::Result<T, FetchError>;

impl I18nError {
    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            I18nError::Config(_) => false,
            I18nError::Settings(_) => false,
            I18nError::InvalidLocale(_) => false,
            I18nError::Fetch(e) => e.is_recoverable(),
            I18nError::CacheUnavailable(_) => true,
            I18nError::Redis(_) => true,
            I18nError::Http(_) => true,
            I18nError::Serialization(_) => false,
            I18nError::Io(_) => true,
            I18nError::UrlParse(_) => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            I18nError::Config(_) => ErrorSeverity::Critical,
            I18nError::Settings(_) => ErrorSeverity::Critical,
            I18nError::UrlParse(_) => ErrorSeverity::Critical,
            I18nError::InvalidLocale(_) => ErrorSeverity::Info,
            I18nError::CacheUnavailable(_) => ErrorSeverity::Warning,
            I18nError::Redis(_) => ErrorSeverity::Warning,
            I18nError::Fetch(FetchError::Authentication(_)) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }
}

impl FetchError {
    /// Authentication failures are retried too, but they rarely heal without
    /// operator intervention.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FetchError::Authentication(_))
    }

    /// Short machine-readable name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::Timeout(_) => "timeout",
            FetchError::MalformedDocument(_) => "malformed_document",
            FetchError::Authentication(_) => "authentication",
            FetchError::Io(_) => "io",
            FetchError::Lock(_) => "lock",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(Duration::ZERO)
        } else if e.is_decode() {
            FetchError::MalformedDocument(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_recoverability() {
        assert!(FetchError::Network("refused".to_string()).is_recoverable());
        assert!(FetchError::Timeout(Duration::from_secs(5)).is_recoverable());
        assert!(!FetchError::Authentication("bad key".to_string()).is_recoverable());
        assert!(FetchError::Io("permission denied".to_string()).is_recoverable());
        assert_eq!(FetchError::Io("permission denied".to_string()).kind(), "io");
    }

    #[test]
    fn test_severity_mapping() {
        let err = I18nError::Config("missing".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(!err.is_recoverable());

        let err = I18nError::Fetch(FetchError::Authentication("denied".to_string()));
        assert_eq!(err.severity(), ErrorSeverity::Critical);

        let err = I18nError::CacheUnavailable("timeout".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = I18nError::from(FetchError::MalformedDocument("no usable locales".to_string()));
        assert_eq!(
            err.to_string(),
            "Catalog fetch error: malformed document: no usable locales"
        );
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARN");
    }
}
