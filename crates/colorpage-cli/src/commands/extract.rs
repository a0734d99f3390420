//! Extract command implementation

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use colorpage_core::extract_images;

/// Execute the extract command
pub async fn execute(manifest: &Path, output_dir: &Path) -> Result<usize> {
    let count = extract_images(manifest, output_dir)
        .await
        .with_context(|| format!("Failed to extract images from {}", manifest.display()))?;

    println!(
        "{} Extracted {count} image(s) to {}",
        "✓".green(),
        output_dir.display()
    );
    Ok(count)
}
