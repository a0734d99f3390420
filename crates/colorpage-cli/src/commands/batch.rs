//! Batch command implementation
//!
//! Runs every (character, age group, difficulty) combination from a JSON
//! character file, one after another, and writes a summary next to the
//! manifests. A failing combination is recorded and the batch moves on.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use colored::Colorize;
use colorpage_core::{Config, Error, GenerationRequest};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::generate::{RunSettings, run_once};

/// Character file layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterFile {
    pub characters: Vec<CharacterEntry>,
}

/// One character and the combinations to run for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterEntry {
    pub name: String,
    pub age_groups: Vec<String>,
    pub difficulties: Vec<String>,
    pub count: u32,
}

impl CharacterEntry {
    fn new(name: &str, age_groups: &[&str], difficulties: &[&str], count: u32) -> Self {
        Self {
            name: name.to_string(),
            age_groups: age_groups.iter().map(ToString::to_string).collect(),
            difficulties: difficulties.iter().map(ToString::to_string).collect(),
            count,
        }
    }
}

impl Default for CharacterFile {
    fn default() -> Self {
        Self {
            characters: vec![
                CharacterEntry::new("도라에몽", &["child"], &["easy", "medium"], 5),
                CharacterEntry::new("하츄핑", &["child"], &["easy", "medium", "hard"], 3),
                CharacterEntry::new("미키마우스", &["child", "teen"], &["easy"], 4),
            ],
        }
    }
}

/// Outcome of one combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntry {
    pub character: String,
    pub age_group: String,
    pub difficulty: String,
    pub count: u32,
    pub generated: usize,
    pub status: BatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The failure looked transient; rerunning the combination may succeed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

/// Written to `batch_results_<timestamp>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub timestamp: String,
    pub total_generated: usize,
    pub output_dir: PathBuf,
    pub results: Vec<BatchEntry>,
}

/// Read the character file, writing the default one first if it is missing.
pub fn load_or_create(path: &Path) -> Result<CharacterFile> {
    if !path.exists() {
        let default = CharacterFile::default();
        let json = serde_json::to_string_pretty(&default)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write default character file {}", path.display()))?;
        println!("{} Created default character file: {}", "✓".green(), path.display());
        return Ok(default);
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read character file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse character file {}", path.display()))
}

/// Whether the pipeline error behind `err` is worth another attempt.
fn is_retryable(err: &anyhow::Error) -> bool {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<Error>())
        .is_some_and(Error::is_recoverable)
}

async fn run_entry(
    config: &Config,
    settings: &RunSettings,
    name: &str,
    age_group: &str,
    difficulty: &str,
    count: u32,
) -> BatchEntry {
    let mut entry = BatchEntry {
        character: name.to_string(),
        age_group: age_group.to_string(),
        difficulty: difficulty.to_string(),
        count,
        generated: 0,
        status: BatchStatus::Failed,
        manifest: None,
        error: None,
        retryable: false,
    };

    let outcome = match GenerationRequest::parse(name, age_group, difficulty, count) {
        Ok(request) => run_once(config, request, settings).await,
        Err(e) => Err(e.into()),
    };

    match outcome {
        Ok(report) => {
            entry.generated = report.achieved();
            entry.status = BatchStatus::Success;
            entry.manifest = Some(report.manifest_path);
        },
        Err(e) => {
            entry.retryable = is_retryable(&e);
            warn!(
                character = name,
                age_group,
                difficulty,
                retryable = entry.retryable,
                "combination failed: {e:#}"
            );
            entry.error = Some(format!("{e:#}"));
        },
    }
    entry
}

/// Execute the batch command
pub async fn execute(config: Config, characters: &Path, settings: RunSettings) -> Result<PathBuf> {
    let file = load_or_create(characters)?;
    std::fs::create_dir_all(&settings.output_dir).with_context(|| {
        format!("Failed to create output directory {}", settings.output_dir.display())
    })?;

    println!("Character file: {}", characters.display());
    println!("Output directory: {}", settings.output_dir.display());
    println!(
        "Storage upload: {}",
        if settings.no_storage { "disabled" } else { "enabled" }
    );

    let mut results = Vec::new();
    for character in &file.characters {
        println!("\n{}", character.name.bold());
        for age_group in &character.age_groups {
            for difficulty in &character.difficulties {
                println!("  {age_group}/{difficulty} - {} page(s)", character.count);
                let entry = run_entry(
                    &config,
                    &settings,
                    &character.name,
                    age_group,
                    difficulty,
                    character.count,
                )
                .await;
                print_entry(&entry);
                results.push(entry);
            }
        }
    }

    let summary = BatchSummary {
        timestamp: Utc::now().to_rfc3339(),
        total_generated: results.iter().map(|r| r.generated).sum(),
        output_dir: settings.output_dir.clone(),
        results,
    };

    let path = settings.output_dir.join(format!(
        "batch_results_{}.json",
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    std::fs::write(&path, serde_json::to_string_pretty(&summary)?)
        .with_context(|| format!("Failed to write batch results {}", path.display()))?;

    println!("\nTotal pages generated: {}", summary.total_generated);
    println!("Results: {}", path.display());
    Ok(path)
}

fn print_entry(entry: &BatchEntry) {
    match entry.status {
        BatchStatus::Success => println!(
            "  {} {} ({}/{}) - {}/{}",
            "✓".green(),
            entry.character,
            entry.age_group,
            entry.difficulty,
            entry.generated,
            entry.count
        ),
        BatchStatus::Failed => println!(
            "  {} {} ({}/{}): {}{}",
            "✗".red(),
            entry.character,
            entry.age_group,
            entry.difficulty,
            entry.error.as_deref().unwrap_or("unknown error"),
            if entry.retryable { " (retryable)" } else { "" }
        ),
    }
}
