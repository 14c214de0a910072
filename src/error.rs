// src/error.rs
//! Typed errors for the fetch layer and startup configuration.
//! Everything above these seams uses `anyhow` with context.

use thiserror::Error;

/// Failure of a single upstream retrieval.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("failed to decode response body: {0}")]
    Decode(String),

    #[error("upstream answered with HTTP {0}")]
    Status(u16),

    #[error("upstream served an interstitial challenge page")]
    Challenge,

    #[error("giving up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: Box<FetchError>,
    },

    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Conditions worth another attempt. Terminal outcomes are not retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Network(_)
                | FetchError::Decode(_)
                | FetchError::Status(_)
                | FetchError::Challenge
        )
    }
}

/// Missing or invalid settings. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file '{0}' not found")]
    NotFound(String),

    #[error("reading configuration file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported configuration format in '{0}' (expected TOML or JSON)")]
    Format(String),

    #[error("configuration error: '{0}' is required")]
    Missing(&'static str),

    #[error("configuration error: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(FetchError::Network("reset".into()).is_transient());
        assert!(FetchError::Status(503).is_transient());
        assert!(FetchError::Challenge.is_transient());
        assert!(!FetchError::Cancelled.is_transient());
    }

    #[test]
    fn exhausted_names_last_condition() {
        let e = FetchError::Exhausted {
            url: "https://example.org/feed".into(),
            attempts: 3,
            last: Box::new(FetchError::Status(429)),
        };
        let msg = e.to_string();
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("HTTP 429"));
    }
}
