//! Error types and handling for colorpage-core operations.
//!
//! Only a handful of conditions are ever surfaced to callers of the pipeline:
//! an invalid [`GenerationRequest`](crate::GenerationRequest), a broken
//! configuration file, or a manifest that cannot be written. Everything that
//! involves an external service is modelled as an [`Outcome`](crate::Outcome)
//! instead and degrades without raising.
//!
//! ## Error Categories
//!
//! - **Request Errors**: invalid age group, difficulty, page count or name
//! - **I/O Errors**: file system operations, disk access
//! - **Network Errors**: HTTP requests made by the asset fetcher
//! - **Configuration Errors**: unreadable or malformed config files
//! - **Image Errors**: raster encoding failures
//!
//! ## Recovery Hints
//!
//! ```rust
//! use colorpage_core::Error;
//!
//! let err = Error::Timeout("reference download".to_string());
//! assert!(err.is_recoverable());
//! assert_eq!(err.category(), "timeout");
//! ```

use thiserror::Error;

/// The main error type for colorpage-core operations.
///
/// `Display` gives a short user-facing message; `Debug` keeps the wrapped
/// source error for diagnostics.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// Covers copying reference images, writing page images and persisting
    /// the run manifest.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Network operation failed.
    ///
    /// Raised by the asset fetcher when a download returns a non-success
    /// status or the connection drops.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The generation request was rejected before the pipeline started.
    ///
    /// ## Common Causes
    ///
    /// - Age group outside `child`, `teen`, `adult`
    /// - Difficulty outside `easy`, `medium`, `hard`
    /// - Page count of zero
    /// - Empty character name
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration is invalid or inaccessible.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource was not found.
    ///
    /// Used for local reference paths that do not exist and for 404
    /// responses while downloading.
    #[error("Not found: {0}")]
    NotFound(String),

    /// URL is malformed or uses an unsupported scheme.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Operation timed out.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Raster encoding or decoding failed.
    #[error("Image error: {0}")]
    Image(String),

    /// Generic error for uncategorized failures.
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Self::Serialization(format!("invalid base64 payload: {err}"))
    }
}

impl Error {
    /// Check if the error might succeed on a later attempt.
    ///
    /// The pipeline itself never retries. It logs this flag for skipped
    /// references, and the batch command records it per failed combination
    /// so a rerun can be limited to the retryable ones.
    ///
    /// ```rust
    /// use colorpage_core::Error;
    /// use std::io;
    ///
    /// assert!(Error::Io(io::Error::new(io::ErrorKind::TimedOut, "slow disk")).is_recoverable());
    /// assert!(!Error::InvalidRequest("page_count must be at least 1".into()).is_recoverable());
    /// ```
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Get the error category as a string identifier for structured logs.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Network(_) => "network",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Config(_) => "config",
            Self::NotFound(_) => "not_found",
            Self::InvalidUrl(_) => "invalid_url",
            Self::Timeout(_) => "timeout",
            Self::Serialization(_) => "serialization",
            Self::Image(_) => "image",
            Self::Other(_) => "other",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io;

    #[test]
    fn test_error_display_formatting() {
        let cases = vec![
            (
                Error::InvalidRequest("page_count must be at least 1".to_string()),
                "Invalid request: page_count must be at least 1",
            ),
            (
                Error::Config("missing [paths] table".to_string()),
                "Configuration error: missing [paths] table",
            ),
            (
                Error::NotFound("test_images/none.png".to_string()),
                "Not found: test_images/none.png",
            ),
            (Error::Timeout("upload".to_string()), "Timeout: upload"),
            (Error::Other("boom".to_string()), "boom"),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.category(), "io");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_recoverability() {
        assert!(Error::Timeout("x".into()).is_recoverable());
        assert!(Error::Io(io::Error::new(io::ErrorKind::Interrupted, "x")).is_recoverable());
        assert!(!Error::Io(io::Error::new(io::ErrorKind::PermissionDenied, "x")).is_recoverable());
        assert!(!Error::InvalidRequest("x".into()).is_recoverable());
        assert!(!Error::Config("x".into()).is_recoverable());
        assert!(!Error::Image("x".into()).is_recoverable());
    }

    #[test]
    fn test_categories_are_distinct_for_core_variants() {
        let categories = [
            Error::InvalidRequest(String::new()).category(),
            Error::Config(String::new()).category(),
            Error::NotFound(String::new()).category(),
            Error::InvalidUrl(String::new()).category(),
            Error::Timeout(String::new()).category(),
            Error::Serialization(String::new()).category(),
            Error::Image(String::new()).category(),
            Error::Other(String::new()).category(),
        ];
        let unique: std::collections::HashSet<_> = categories.iter().collect();
        assert_eq!(unique.len(), categories.len());
    }

    proptest! {
        #[test]
        fn prop_message_preserved(msg in "[a-zA-Z0-9 ]{0,64}") {
            let err = Error::InvalidRequest(msg.clone());
            prop_assert!(err.to_string().ends_with(&msg));
            prop_assert!(!err.is_recoverable());
        }
    }
}
