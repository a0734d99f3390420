//! Configuration for the coloring-page pipeline.
//!
//! All credentials, endpoints and tunables live in one [`Config`] value that is
//! passed to each component when it is constructed. Nothing reads the
//! environment after construction, so two pipelines with different configs can
//! coexist in one process (the test suite relies on this).
//!
//! ## Configuration Hierarchy
//!
//! 1. **Explicit path**: `Config::load_from(path)`
//! 2. **`COLORPAGE_CONFIG`**: path to a TOML file
//! 3. **Platform config dir**: `<config_dir>/config.toml` (see [`Config::default_path`])
//! 4. **Defaults**: every field has one
//!
//! Environment variables are applied on top by [`Config::with_env_overrides`].
//!
//! ## Example Configuration File
//!
//! ```toml
//! [credentials]
//! gemini_api_key = "..."
//! search_api_key = "..."
//! search_engine_id = "..."
//! storage_bucket = "coloring-pages.example.app"
//! storage_token = "ya29...."
//!
//! [paths]
//! download_dir = "downloaded_images"
//! output_dir = "production_output"
//! assets_dir = "test_images"
//!
//! [pipeline]
//! reference_limit = 5
//! page_delay_ms = 2000
//! ```
//!
//! ```rust
//! use colorpage_core::Config;
//!
//! let config = Config::default();
//! assert!(!config.credentials.has_generation());
//! assert_eq!(config.pipeline.reference_limit, 5);
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Optional service credentials. Every missing credential has a fallback.
    pub credentials: Credentials,
    /// Base URLs of the external services.
    pub endpoints: EndpointsConfig,
    /// Model identifiers for the generative service.
    pub models: ModelsConfig,
    /// Local directories.
    pub paths: PathsConfig,
    /// Pacing, limits and timeouts.
    pub pipeline: PipelineSettings,
}

/// Credentials for the optional external services.
///
/// Empty strings are treated the same as absent values.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Key for the generative text/image API.
    pub gemini_api_key: Option<String>,
    /// Key for the image search API.
    pub search_api_key: Option<String>,
    /// Custom search engine identifier.
    pub search_engine_id: Option<String>,
    /// Object storage bucket receiving published assets.
    pub storage_bucket: Option<String>,
    /// OAuth bearer token used for uploads.
    pub storage_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn mask(value: Option<&str>) -> &'static str {
            if value.is_some() { "<set>" } else { "<unset>" }
        }
        f.debug_struct("Credentials")
            .field("gemini_api_key", &mask(self.gemini_api_key()))
            .field("search_api_key", &mask(self.search_api_key()))
            .field("search_engine_id", &mask(self.search_engine_id()))
            .field("storage_bucket", &self.storage_bucket())
            .field("storage_token", &mask(self.storage_token()))
            .finish()
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl Credentials {
    /// Generative API key, if configured.
    #[must_use]
    pub fn gemini_api_key(&self) -> Option<&str> {
        non_empty(self.gemini_api_key.as_ref())
    }

    /// Search API key, if configured.
    #[must_use]
    pub fn search_api_key(&self) -> Option<&str> {
        non_empty(self.search_api_key.as_ref())
    }

    /// Search engine id, if configured.
    #[must_use]
    pub fn search_engine_id(&self) -> Option<&str> {
        non_empty(self.search_engine_id.as_ref())
    }

    /// Storage bucket, if configured.
    #[must_use]
    pub fn storage_bucket(&self) -> Option<&str> {
        non_empty(self.storage_bucket.as_ref())
    }

    /// Storage bearer token, if configured.
    #[must_use]
    pub fn storage_token(&self) -> Option<&str> {
        non_empty(self.storage_token.as_ref())
    }

    /// Both halves of the search credential are present.
    #[must_use]
    pub fn has_search(&self) -> bool {
        self.search_api_key().is_some() && self.search_engine_id().is_some()
    }

    /// The generative API can be called.
    #[must_use]
    pub fn has_generation(&self) -> bool {
        self.gemini_api_key().is_some()
    }

    /// Bucket and token are both present.
    #[must_use]
    pub fn has_storage(&self) -> bool {
        self.storage_bucket().is_some() && self.storage_token().is_some()
    }
}

/// Base URLs for the external services (overridable for tests and proxies).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    /// Image search endpoint.
    pub search_url: String,
    /// Generative API base URL (without the `/v1beta/...` suffix).
    pub gemini_base_url: String,
    /// Object storage base URL, used for both uploads and public links.
    pub storage_base_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            search_url: "https://www.googleapis.com/customsearch/v1".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            storage_base_url: "https://storage.googleapis.com".to_string(),
        }
    }
}

/// Model identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Model used to refine prompts.
    pub text_model: String,
    /// Model used to draw pages.
    pub image_model: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            text_model: "gemini-2.5-flash".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
        }
    }
}

/// Local directories used by a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Where fetched reference images are stored.
    pub download_dir: PathBuf,
    /// Where manifests and locally published pages are written.
    pub output_dir: PathBuf,
    /// Bundled sample images used by the offline reference resolver.
    pub assets_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloaded_images"),
            output_dir: PathBuf::from("production_output"),
            assets_dir: PathBuf::from("test_images"),
        }
    }
}

/// Pacing, limits and per-call timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// How many reference candidates to locate.
    pub reference_limit: usize,
    /// Pause between consecutive page generations, in milliseconds.
    pub page_delay_ms: u64,
    /// Timeout for the image search call.
    pub search_timeout_secs: u64,
    /// Timeout for each reference download attempt.
    pub download_timeout_secs: u64,
    /// Timeout for each storage upload.
    pub upload_timeout_secs: u64,
    /// Timeout for the prompt refinement call.
    pub optimize_timeout_secs: u64,
    /// Timeout for each page generation call.
    pub generate_timeout_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            reference_limit: 5,
            page_delay_ms: 2000,
            search_timeout_secs: 10,
            download_timeout_secs: 10,
            upload_timeout_secs: 30,
            optimize_timeout_secs: 30,
            generate_timeout_secs: 60,
        }
    }
}

impl PipelineSettings {
    /// Pause between consecutive pages.
    #[must_use]
    pub const fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    /// Search call timeout.
    #[must_use]
    pub const fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    /// Download timeout.
    #[must_use]
    pub const fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Upload timeout.
    #[must_use]
    pub const fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    /// Prompt refinement timeout.
    #[must_use]
    pub const fn optimize_timeout(&self) -> Duration {
        Duration::from_secs(self.optimize_timeout_secs)
    }

    /// Page generation timeout.
    #[must_use]
    pub const fn generate_timeout(&self) -> Duration {
        Duration::from_secs(self.generate_timeout_secs)
    }
}

impl Config {
    /// Load configuration from the standard locations, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = match std::env::var("COLORPAGE_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Some(PathBuf::from(path)),
            _ => Self::default_path().filter(|p| p.exists()),
        };

        let config = match path {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    /// Load configuration from an explicit TOML file (no environment overrides).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse config {}: {e}", path.display()))
        })
    }

    /// Platform config file location.
    ///
    /// - Linux: `~/.config/colorpage/config.toml`
    /// - macOS: `~/Library/Application Support/dev.outfitter.colorpage/config.toml`
    /// - Windows: `%APPDATA%\outfitter\colorpage\config\config.toml`
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "outfitter", "colorpage")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply environment variable overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Split out from [`Config::with_env_overrides`] so the mapping can be
    /// exercised without touching the process environment.
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GEMINI_API_KEY") {
            self.credentials.gemini_api_key = Some(v);
        }
        if let Some(v) = get("GOOGLE_SEARCH_API_KEY") {
            self.credentials.search_api_key = Some(v);
        }
        if let Some(v) = get("GOOGLE_SEARCH_ENGINE_ID") {
            self.credentials.search_engine_id = Some(v);
        }
        if let Some(v) = get("COLORPAGE_STORAGE_BUCKET") {
            self.credentials.storage_bucket = Some(v);
        }
        if let Some(v) = get("COLORPAGE_STORAGE_TOKEN") {
            self.credentials.storage_token = Some(v);
        }
        if let Some(v) = get("COLORPAGE_DOWNLOAD_DIR") {
            self.paths.download_dir = PathBuf::from(v);
        }
        if let Some(v) = get("COLORPAGE_OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get("COLORPAGE_ASSETS_DIR") {
            self.paths.assets_dir = PathBuf::from(v);
        }
        if let Some(v) = get("COLORPAGE_PAGE_DELAY_MS") {
            match v.trim().parse::<u64>() {
                Ok(ms) => self.pipeline.page_delay_ms = ms,
                Err(e) => tracing::warn!(value = %v, "ignoring COLORPAGE_PAGE_DELAY_MS: {e}"),
            }
        }
        self
    }
}
