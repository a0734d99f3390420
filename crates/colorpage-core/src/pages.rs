//! Per-page synthesis.
//!
//! Pages are produced strictly in ascending order. Each page picks a reference
//! (cycling through the run's references) and a pose variation (cycling
//! through [`VARIATIONS`]), asks a [`PageRenderer`] for an image, publishes
//! it and records the result. A page that fails is logged, kept in the
//! returned [`PageBatch`] and otherwise skipped; the run carries on.
//!
//! ```rust
//! use colorpage_core::pages::variation_for;
//!
//! assert_eq!(variation_for(1), variation_for(11));
//! assert_ne!(variation_for(1), variation_for(2));
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::gemini::GeminiClient;
use crate::http::{is_remote, local_path};
use crate::outcome::ServiceFailure;
use crate::publisher::AssetPublisher;
use crate::raster::placeholder_png;
use crate::types::{
    GenerationRequest, ImageOrigin, PageRecord, ReferenceAsset, ReferenceSlot, SynthesizedImage,
};

/// Pose and expression descriptors, cycled by page number.
pub const VARIATIONS: [&str; 10] = [
    "cute and friendly expression",
    "happy and cheerful pose",
    "playful and energetic stance",
    "calm and peaceful pose",
    "excited and joyful expression",
    "thoughtful and curious look",
    "adventurous and brave pose",
    "gentle and kind expression",
    "funny and silly pose",
    "confident and proud stance",
];

/// Variation for a 1-based page number.
#[must_use]
pub const fn variation_for(page_number: u32) -> &'static str {
    VARIATIONS[(page_number.saturating_sub(1) as usize) % VARIATIONS.len()]
}

/// Reference slot and URL for a 1-based page number.
///
/// Cycles through `references`; an empty list yields the default reference.
#[must_use]
pub fn reference_for(
    references: &[ReferenceAsset],
    page_number: u32,
    default_url: &str,
) -> (ReferenceSlot, String) {
    if references.is_empty() {
        return (ReferenceSlot::Default, default_url.to_string());
    }
    let index = (page_number.saturating_sub(1) as usize) % references.len();
    (
        ReferenceSlot::Index(index),
        references[index].published_url.clone(),
    )
}

/// Full image-model instruction for one page.
#[must_use]
pub fn page_instruction(prompt: &str, reference_url: &str, variation: &str) -> String {
    format!(
        "Create a coloring page based on the reference image:\n\
         \n\
         Reference image: {reference_url}\n\
         Character description: {prompt}\n\
         \n\
         Requirements:\n\
         - Convert the character from the reference image into a coloring page style\n\
         - Thick black outlines (3-5px)\n\
         - Simple and clear coloring areas\n\
         - Child-friendly design for easy coloring\n\
         - White background\n\
         - A4 print size (210x297mm at 300DPI = 2480x3508 pixels)\n\
         - High resolution for crisp printing\n\
         - Character should be in {variation} pose\n\
         - Each image should have different poses or expressions\n\
         - Optimize for A4 paper printing\n\
         - Ensure character fits well within A4 proportions\n\
         - Leave appropriate margins for printing\n\
         \n\
         Generate the coloring page image optimized for A4 printing."
    )
}

// ============================================================
// Wait policy
// ============================================================

/// Pause inserted between consecutive page generations.
#[async_trait]
pub trait WaitPolicy: Send + Sync {
    /// Wait before the next page.
    async fn wait(&self);
}

/// Sleep for a fixed duration.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

#[async_trait]
impl WaitPolicy for FixedDelay {
    async fn wait(&self) {
        if !self.0.is_zero() {
            tokio::time::sleep(self.0).await;
        }
    }
}

/// Do not wait at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl WaitPolicy for NoDelay {
    async fn wait(&self) {}
}

// ============================================================
// Renderer seam
// ============================================================

/// Everything a renderer needs for one page.
#[derive(Debug, Clone, Copy)]
pub struct PageInput<'a> {
    /// 1-based page number.
    pub page_number: u32,
    /// Optimized prompt.
    pub prompt: &'a str,
    /// Published reference URL or local path.
    pub reference_url: &'a str,
    /// Pose variation.
    pub variation: &'a str,
}

/// Produces the image for one page (allows mocking in tests).
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Render a page or report why the service could not.
    async fn render(
        &self,
        input: PageInput<'_>,
    ) -> Result<(SynthesizedImage, ImageOrigin), ServiceFailure>;
}

/// Renders through the image model, or locally without a credential.
pub struct GeminiRenderer {
    gemini: GeminiClient,
    client: Client,
    generate_timeout: Duration,
    reference_timeout: Duration,
}

impl GeminiRenderer {
    /// Create a renderer.
    pub const fn new(
        gemini: GeminiClient,
        client: Client,
        generate_timeout: Duration,
        reference_timeout: Duration,
    ) -> Self {
        Self {
            gemini,
            client,
            generate_timeout,
            reference_timeout,
        }
    }

    /// Read a reference into base64 with a sniffed MIME type.
    async fn encode_reference(&self, url: &str) -> Result<(String, String), String> {
        let bytes = if is_remote(url) {
            let response = self
                .client
                .get(url)
                .timeout(self.reference_timeout)
                .send()
                .await
                .map_err(|e| e.to_string())?;
            if !response.status().is_success() {
                return Err(format!("HTTP {}", response.status()));
            }
            response.bytes().await.map_err(|e| e.to_string())?.to_vec()
        } else {
            tokio::fs::read(local_path(url))
                .await
                .map_err(|e| format!("{}: {e}", local_path(url)))?
        };

        if bytes.is_empty() {
            return Err("reference image is empty".to_string());
        }
        let mime = image::guess_format(&bytes).map_or("image/png", |f| f.to_mime_type());
        Ok((mime.to_string(), STANDARD.encode(&bytes)))
    }
}

fn local_page() -> Result<(SynthesizedImage, ImageOrigin), ServiceFailure> {
    placeholder_png()
        .map(|image| (image, ImageOrigin::LocalFallback))
        .map_err(|e| ServiceFailure::BadResponse(format!("local raster failed: {e}")))
}

#[async_trait]
impl PageRenderer for GeminiRenderer {
    async fn render(
        &self,
        input: PageInput<'_>,
    ) -> Result<(SynthesizedImage, ImageOrigin), ServiceFailure> {
        if !self.gemini.has_credential() {
            debug!(page = input.page_number, "no generation credential, drawing locally");
            return local_page();
        }

        let (mime, reference) = match self.encode_reference(input.reference_url).await {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(page = input.page_number, url = %input.reference_url, "reference unreadable, drawing locally: {e}");
                return local_page();
            },
        };

        let instruction = page_instruction(input.prompt, input.reference_url, input.variation);
        self.gemini
            .generate_image(&instruction, &reference, &mime, self.generate_timeout)
            .await
            .map(|image| (image, ImageOrigin::Service))
    }
}

// ============================================================
// Batch results
// ============================================================

/// A page that could not be synthesized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPage {
    /// 1-based page number.
    pub page_number: u32,
    /// Why it failed.
    pub reason: ServiceFailure,
    /// When it failed.
    pub failed_at: DateTime<Utc>,
}

impl FailedPage {
    /// Record a failure now.
    #[must_use]
    pub fn new(page_number: u32, reason: ServiceFailure) -> Self {
        Self {
            page_number,
            reason,
            failed_at: Utc::now(),
        }
    }
}

/// A synthesized page whose image could not be stored anywhere.
///
/// The page is still recorded, with an empty URL; its image survives only
/// as the base64 payload in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnpublishedPage {
    /// 1-based page number.
    pub page_number: u32,
    /// Why publishing failed.
    pub error: String,
}

/// Records and failures from one pass over the requested pages.
#[derive(Debug, Default)]
pub struct PageBatch {
    /// Successful pages, ascending.
    pub records: Vec<PageRecord>,
    /// Failed pages, ascending.
    pub failures: Vec<FailedPage>,
    /// Recorded pages that have no stored image, ascending.
    pub unpublished: Vec<UnpublishedPage>,
}

impl PageBatch {
    /// Pages attempted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.records.len() + self.failures.len()
    }

    /// Share of attempted pages that succeeded, as a percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            (self.records.len() as f64 / total as f64) * 100.0
        }
    }
}

/// Progress callback, called with `(page_number, page_count)` after each page.
pub type ProgressCallback = Arc<dyn Fn(u32, u32) + Send + Sync>;

// ============================================================
// PageSynthesizer
// ============================================================

/// Drives the per-page loop.
pub struct PageSynthesizer<R: PageRenderer> {
    renderer: R,
    wait: Box<dyn WaitPolicy>,
    default_reference: String,
    progress_callback: Option<ProgressCallback>,
}

impl<R: PageRenderer> PageSynthesizer<R> {
    /// Create a synthesizer; `default_reference` is used when no reference survived.
    pub fn new(renderer: R, default_reference: impl Into<String>) -> Self {
        Self {
            renderer,
            wait: Box::new(NoDelay),
            default_reference: default_reference.into(),
            progress_callback: None,
        }
    }

    /// Replace the wait policy.
    #[must_use]
    pub fn with_wait_policy(mut self, wait: impl WaitPolicy + 'static) -> Self {
        self.wait = Box::new(wait);
        self
    }

    /// Set progress callback.
    #[must_use]
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(u32, u32) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Synthesize every requested page in order.
    #[instrument(level = "debug", skip_all, fields(character = %request.character_name(), pages = request.page_count()))]
    pub async fn synthesize_all(
        &self,
        request: &GenerationRequest,
        prompt: &str,
        references: &[ReferenceAsset],
        publisher: &AssetPublisher,
    ) -> PageBatch {
        let total = request.page_count();
        let mut batch = PageBatch::default();

        for page_number in 1..=total {
            if page_number > 1 {
                self.wait.wait().await;
            }

            let (reference, reference_url) =
                reference_for(references, page_number, &self.default_reference);
            let variation = variation_for(page_number);
            info!(page = page_number, total, variation, "synthesizing page");

            let input = PageInput {
                page_number,
                prompt,
                reference_url: &reference_url,
                variation,
            };

            match self.renderer.render(input).await {
                Ok((image, origin)) => {
                    let generated_image_url =
                        match publisher.publish_page(&image, request, page_number).await {
                            Ok(published) => published.into_inner(),
                            Err(e) => {
                                warn!(page = page_number, error = e.category(), "page not stored: {e}");
                                batch.unpublished.push(UnpublishedPage {
                                    page_number,
                                    error: e.to_string(),
                                });
                                String::new()
                            },
                        };
                    batch.records.push(PageRecord {
                        page_number,
                        reference,
                        reference_url,
                        prompt: prompt.to_string(),
                        image,
                        origin,
                        generated_image_url,
                        generated_at: Utc::now(),
                    });
                },
                Err(reason) => {
                    warn!(page = page_number, reason = reason.label(), "page skipped: {reason}");
                    batch.failures.push(FailedPage::new(page_number, reason));
                },
            }

            if let Some(cb) = &self.progress_callback {
                cb(page_number, total);
            }
        }

        batch
    }
}

// ============================================================
// Tests
// ============================================================
