//! Shared HTTP client construction.

use crate::{Error, Result};
use reqwest::Client;
use std::time::Duration;

/// Upper bound on any single request; individual calls set tighter limits.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(120);

/// Build the client every service component shares.
///
/// Per-call timeouts are applied on each `RequestBuilder`, so one client can
/// serve the 10 s search call and the 60 s image generation alike.
pub fn build_client() -> Result<Client> {
    Client::builder()
        .timeout(CLIENT_TIMEOUT)
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("colorpage/", env!("CARGO_PKG_VERSION")))
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(Error::Network)
}

/// True for `http://` and `https://` URLs.
pub fn is_remote(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Strip an optional `file://` prefix, leaving a filesystem path.
pub fn local_path(url: &str) -> &str {
    url.strip_prefix("file://").unwrap_or(url)
}
