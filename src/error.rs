//! Unified error type for discovery, export and configuration.
//!
//! Most failures in this crate are *expected noise* (a dead link, a page that
//! will not parse, an extractor that finds nothing) and never surface as an
//! [`AppError`]; they shrink the output instead. The variants here cover what
//! a caller can act on.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// YAML parsing or serialization failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// CSV writing failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// A fetch returned something other than a usable page
    #[error("fetch of {url} failed: {message}")]
    Fetch { url: String, message: String },

    /// Browser automation failed (launch, navigation, DOM access)
    #[error("browser error: {0}")]
    Browser(String),

    /// The consent element never became clickable
    #[error("consent element '{selector}' not clickable after {attempts} attempts")]
    ConsentTimeout { selector: String, attempts: usize },

    /// Homepage is not registered in the configuration
    #[error(
        "homepage {0} is not configured; register it with `newsfeedback add {0}` and rerun"
    )]
    UnknownHomepage(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn fetch(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn browser(message: impl std::fmt::Display) -> Self {
        Self::Browser(message.to_string())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_homepage_message_is_actionable() {
        let err = AppError::UnknownHomepage("https://www.example.de/".to_string());
        let msg = err.to_string();
        assert!(msg.contains("newsfeedback add https://www.example.de/"));
    }

    #[test]
    fn test_consent_timeout_message() {
        let err = AppError::ConsentTimeout {
            selector: "button.accept".to_string(),
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "consent element 'button.accept' not clickable after 3 attempts"
        );
    }
}
