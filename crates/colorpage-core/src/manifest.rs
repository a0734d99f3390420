//! Run manifest: the single durable record of a pipeline run.
//!
//! [`aggregate`] collects the in-memory results into a [`RunManifest`];
//! [`persist`] serializes it as a [`ManifestDocument`] to
//! `coloring_pages_<character>_<age>_<difficulty>_<YYYYmmdd_HHMMSS>.json`,
//! with a numeric suffix when that name is already taken.
//!
//! The document is pretty-printed UTF-8 with non-ASCII characters kept
//! as-is, so Korean character names stay readable.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::Result;
use crate::types::{
    AgeGroup, Difficulty, GenerationRequest, PageRecord, ReferenceAsset, SynthesizedPrompt,
    file_timestamp, sanitize_segment,
};

/// The current schema version for [`ManifestDocument`].
///
/// Bump this when making breaking changes to the document structure.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Everything a run produced, in memory.
#[derive(Debug, Clone)]
pub struct RunManifest {
    /// The validated request.
    pub request: GenerationRequest,
    /// Raw and optimized prompt.
    pub prompt: SynthesizedPrompt,
    /// References in locator order.
    pub references: Vec<ReferenceAsset>,
    /// Successful pages in ascending order.
    pub pages: Vec<PageRecord>,
    /// When the manifest was assembled.
    pub generated_at: DateTime<Utc>,
}

/// Assemble the manifest for a run. Order of references and pages is preserved.
pub fn aggregate(
    request: GenerationRequest,
    prompt: SynthesizedPrompt,
    references: Vec<ReferenceAsset>,
    pages: Vec<PageRecord>,
) -> RunManifest {
    debug_assert!(
        pages
            .windows(2)
            .all(|w| w[0].page_number < w[1].page_number),
        "page numbers must be strictly ascending"
    );
    RunManifest {
        request,
        prompt,
        references,
        pages,
        generated_at: Utc::now(),
    }
}

impl RunManifest {
    /// Pages actually produced.
    #[must_use]
    pub fn achieved(&self) -> usize {
        self.pages.len()
    }

    /// Serializable form.
    #[must_use]
    pub fn to_document(&self) -> ManifestDocument {
        let request = &self.request;
        ManifestDocument {
            schema_version: SCHEMA_VERSION.to_string(),
            character_name: request.character_name().to_string(),
            age_group: request.age_group(),
            difficulty: request.difficulty(),
            total_pages: request.page_count(),
            generated_at: self.generated_at,
            prompt_used: self.prompt.optimized_prompt.clone(),
            reference_images: self
                .references
                .iter()
                .map(|asset| ReferenceImageEntry {
                    local_path: asset.local_path.to_string_lossy().into_owned(),
                    published_url: asset.published_url.clone(),
                    title: asset.candidate.display_title.clone(),
                })
                .collect(),
            generated_pages: self
                .pages
                .iter()
                .map(|page| GeneratedPageEntry {
                    page_number: page.page_number,
                    character_name: request.character_name().to_string(),
                    age_group: request.age_group(),
                    difficulty: request.difficulty(),
                    prompt: page.prompt.clone(),
                    reference_image: page.reference_url.clone(),
                    generated_image_base64: page.image.data_base64.clone(),
                    generated_image_url: page.generated_image_url.clone(),
                    generated_at: page.generated_at,
                })
                .collect(),
        }
    }
}

/// On-disk manifest (snake_case JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestDocument {
    /// Document schema version.
    #[serde(default)]
    pub schema_version: String,
    /// Character the run was for.
    pub character_name: String,
    /// Requested age group.
    pub age_group: AgeGroup,
    /// Requested difficulty.
    pub difficulty: Difficulty,
    /// Pages requested (not necessarily produced).
    pub total_pages: u32,
    /// When the manifest was written.
    pub generated_at: DateTime<Utc>,
    /// Optimized prompt.
    pub prompt_used: String,
    /// Fetched and published references.
    #[serde(default)]
    pub reference_images: Vec<ReferenceImageEntry>,
    /// Produced pages.
    #[serde(default)]
    pub generated_pages: Vec<GeneratedPageEntry>,
}

/// One reference image in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceImageEntry {
    /// Local copy.
    pub local_path: String,
    /// Storage or `file://` URL.
    pub published_url: String,
    /// Search result title.
    pub title: String,
}

/// One produced page in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedPageEntry {
    /// 1-based page number.
    pub page_number: u32,
    /// Character name.
    pub character_name: String,
    /// Age group.
    pub age_group: AgeGroup,
    /// Difficulty.
    pub difficulty: Difficulty,
    /// Prompt used.
    pub prompt: String,
    /// Reference URL the page was seeded from.
    pub reference_image: String,
    /// Page image, base64.
    pub generated_image_base64: String,
    /// Storage or `file://` URL of the page.
    pub generated_image_url: String,
    /// When the page was produced.
    pub generated_at: DateTime<Utc>,
}

/// File name for a manifest of `request` written now.
///
/// Age group and difficulty are part of the name so that the runs of one
/// batch land in separate files.
pub fn manifest_file_name(request: &GenerationRequest) -> String {
    format!(
        "coloring_pages_{}_{}_{}_{}.json",
        sanitize_segment(request.character_name()),
        request.age_group(),
        request.difficulty(),
        file_timestamp()
    )
}

const MAX_NAME_ATTEMPTS: usize = 100;

/// Create `name` in `dir` without touching an existing file, appending
/// `_2`, `_3`, ... to the stem on collision.
async fn create_unique(dir: &Path, name: &str) -> Result<(PathBuf, tokio::fs::File)> {
    let (stem, extension) = name.rsplit_once('.').unwrap_or((name, "json"));
    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let candidate = if attempt == 1 {
            dir.join(name)
        } else {
            dir.join(format!("{stem}_{attempt}.{extension}"))
        };
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %candidate.display(), "manifest name taken");
            },
            Err(e) => return Err(e.into()),
        }
    }
    Err(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free manifest name for '{name}' in {}", dir.display()),
    )
    .into())
}

/// Write the manifest into `output_dir`, returning the file path.
///
/// An existing manifest is never overwritten. This is the only step of a
/// run whose failure is surfaced to the caller.
pub async fn persist(manifest: &RunManifest, output_dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(output_dir).await?;
    let json = serde_json::to_string_pretty(&manifest.to_document())?;
    let (path, mut file) =
        create_unique(output_dir, &manifest_file_name(&manifest.request)).await?;
    file.write_all(json.as_bytes()).await?;
    file.flush().await?;
    info!(
        path = %path.display(),
        pages = manifest.achieved(),
        requested = manifest.request.page_count(),
        "manifest written"
    );
    Ok(path)
}
