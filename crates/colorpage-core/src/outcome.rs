//! Typed results for calls into optional external services.
//!
//! Every stage that talks to an external service can run without it. Instead
//! of raising, those stages return an [`Outcome`]: either the value the
//! service produced, or a fallback value together with the
//! [`ServiceFailure`] that forced the fallback. Callers can therefore tell
//! "degraded gracefully" apart from "genuinely failed" without inspecting
//! log output.
//!
//! ```rust
//! use colorpage_core::{Outcome, ServiceFailure};
//!
//! let fresh = Outcome::Fresh("refined prompt".to_string());
//! assert!(!fresh.is_degraded());
//!
//! let degraded = Outcome::degraded("raw prompt".to_string(), ServiceFailure::NoCredential);
//! assert_eq!(degraded.reason(), Some(&ServiceFailure::NoCredential));
//! assert_eq!(degraded.into_inner(), "raw prompt");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an external service could not provide a usable result.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ServiceFailure {
    /// The credential needed to call the service is not configured.
    #[error("no credential configured")]
    NoCredential,

    /// The request never produced a response (connect error, timeout, I/O).
    #[error("transport error: {0}")]
    TransportError(String),

    /// The service answered, but with a non-success status or an unexpected shape.
    #[error("bad response: {0}")]
    BadResponse(String),

    /// The response was well-formed but did not carry the expected payload.
    #[error("response carried no payload")]
    NoPayload,
}

impl ServiceFailure {
    /// Classify a transport-level `reqwest` failure.
    #[must_use]
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TransportError(format!("timed out: {err}"))
        } else if err.is_decode() {
            Self::BadResponse(format!("undecodable body: {err}"))
        } else {
            Self::TransportError(err.to_string())
        }
    }

    /// Classify a non-success HTTP status.
    #[must_use]
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        Self::BadResponse(format!("HTTP {status}"))
    }

    /// Short machine-readable label used in structured logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::NoCredential => "no_credential",
            Self::TransportError(_) => "transport_error",
            Self::BadResponse(_) => "bad_response",
            Self::NoPayload => "no_payload",
        }
    }
}

/// A value that either came fresh from a service or from its fallback path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The service produced this value.
    Fresh(T),
    /// The service was unusable; `value` is the documented fallback.
    Degraded {
        /// Fallback value.
        value: T,
        /// Why the fallback was taken.
        reason: ServiceFailure,
    },
}

impl<T> Outcome<T> {
    /// Build a degraded outcome.
    #[must_use]
    pub const fn degraded(value: T, reason: ServiceFailure) -> Self {
        Self::Degraded { value, reason }
    }

    /// Whether the fallback path was taken.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// The failure that forced the fallback, if any.
    #[must_use]
    pub const fn reason(&self) -> Option<&ServiceFailure> {
        match self {
            Self::Fresh(_) => None,
            Self::Degraded { reason, .. } => Some(reason),
        }
    }

    /// Borrow the carried value.
    #[must_use]
    pub const fn value(&self) -> &T {
        match self {
            Self::Fresh(value) | Self::Degraded { value, .. } => value,
        }
    }

    /// Unwrap into the carried value, fresh or fallback.
    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            Self::Fresh(value) | Self::Degraded { value, .. } => value,
        }
    }

    /// Transform the carried value, keeping the provenance.
    #[must_use]
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Fresh(value) => Outcome::Fresh(f(value)),
            Self::Degraded { value, reason } => Outcome::Degraded {
                value: f(value),
                reason,
            },
        }
    }
}
