//! Command implementations for the colorpage CLI

mod batch;
mod extract;
mod generate;

pub use batch::execute as run_batch;
pub use extract::execute as extract_manifest;
pub use generate::{RunSettings, execute as generate};

use anyhow::{Context, Result};
use colorpage_core::Config;
use std::path::Path;

/// Resolve configuration: explicit `--config`, else `COLORPAGE_CONFIG`, else
/// the platform file, else defaults. Environment overrides apply last.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => Ok(Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?
            .with_env_overrides()),
        None => Config::load().context("Failed to load configuration"),
    }
}
