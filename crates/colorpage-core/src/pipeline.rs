//! End-to-end run: locate, fetch, publish, prompt, pages, manifest.
//!
//! Every stage is awaited in turn on the caller's runtime; nothing runs
//! concurrently. Service trouble degrades a stage instead of failing the run;
//! only an invalid request (rejected earlier, at construction) or a manifest
//! that cannot be written reaches the caller as an error.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::Result;
use crate::config::Config;
use crate::fetcher::AssetFetcher;
use crate::gemini::GeminiClient;
use crate::http::build_client;
use crate::locator::{DEFAULT_SAMPLE_KEY, ReferenceLocator};
use crate::manifest::{RunManifest, aggregate, persist};
use crate::outcome::{Outcome, ServiceFailure};
use crate::pages::{
    FailedPage, FixedDelay, GeminiRenderer, PageSynthesizer, UnpublishedPage, WaitPolicy,
};
use crate::prompt::PromptSynthesizer;
use crate::publisher::{AssetPublisher, file_url};
use crate::types::{GenerationRequest, ReferenceAsset, file_timestamp};

/// Caller toggles for a run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Upload to object storage when credentials allow.
    pub use_storage: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self { use_storage: true }
    }
}

/// Stage that fell back to its offline behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Reference search.
    Locate,
    /// Reference upload.
    PublishReference,
    /// Prompt refinement.
    Optimize,
}

/// A stage that degraded, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Degradation {
    /// Which stage.
    pub stage: Stage,
    /// Why.
    pub reason: ServiceFailure,
}

/// What a finished run hands back.
#[derive(Debug)]
pub struct RunReport {
    /// The persisted manifest.
    pub manifest: RunManifest,
    /// Where it was written.
    pub manifest_path: PathBuf,
    /// Pages that were skipped.
    pub failed_pages: Vec<FailedPage>,
    /// Recorded pages whose image could be neither uploaded nor written
    /// locally; their manifest URL is empty.
    pub unpublished_pages: Vec<UnpublishedPage>,
    /// Reference candidates that could not be fetched, by 1-based index.
    pub failed_references: Vec<usize>,
    /// Stages that used a fallback.
    pub degradations: Vec<Degradation>,
}

impl RunReport {
    /// Pages produced.
    #[must_use]
    pub fn achieved(&self) -> usize {
        self.manifest.achieved()
    }

    /// Pages requested.
    #[must_use]
    pub fn requested(&self) -> u32 {
        self.manifest.request.page_count()
    }
}

/// The assembled pipeline.
pub struct Pipeline {
    config: Config,
    locator: ReferenceLocator,
    fetcher: AssetFetcher,
    publisher: AssetPublisher,
    gemini: GeminiClient,
    pages: PageSynthesizer<GeminiRenderer>,
}

impl Pipeline {
    /// Build every component from `config`.
    ///
    /// The default wait policy sleeps `pipeline.page_delay_ms` between pages.
    pub fn new(config: Config, options: PipelineOptions) -> Result<Self> {
        let client = build_client()?;
        let settings = &config.pipeline;
        let credentials = &config.credentials;
        info!(
            search = credentials.has_search(),
            generation = credentials.has_generation(),
            storage = credentials.has_storage() && options.use_storage,
            "services configured"
        );

        let locator = ReferenceLocator::new(client.clone(), &config);
        let fetcher = AssetFetcher::new(
            client.clone(),
            config.paths.download_dir.clone(),
            settings.download_timeout(),
        );
        let publisher = AssetPublisher::new(client.clone(), &config, options.use_storage);
        let gemini = GeminiClient::new(client.clone(), &config);

        let renderer = GeminiRenderer::new(
            gemini.clone(),
            client,
            settings.generate_timeout(),
            settings.download_timeout(),
        );
        let default_reference = file_url(
            &config
                .paths
                .assets_dir
                .join(format!("{DEFAULT_SAMPLE_KEY}_test.png")),
        );
        let pages = PageSynthesizer::new(renderer, default_reference)
            .with_wait_policy(FixedDelay(settings.page_delay()));

        Ok(Self {
            config,
            locator,
            fetcher,
            publisher,
            gemini,
            pages,
        })
    }

    /// Replace the pause between pages.
    #[must_use]
    pub fn with_wait_policy(mut self, wait: impl WaitPolicy + 'static) -> Self {
        self.pages = self.pages.with_wait_policy(wait);
        self
    }

    /// Report each finished page as `(page_number, page_count)`.
    #[must_use]
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(u32, u32) + Send + Sync + 'static,
    {
        self.pages = self.pages.with_progress(callback);
        self
    }

    /// Configuration in use.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Run the whole pipeline for one request.
    #[instrument(skip_all, fields(character = %request.character_name(), age_group = %request.age_group(), difficulty = %request.difficulty(), pages = request.page_count()))]
    pub async fn run(&self, request: GenerationRequest) -> Result<RunReport> {
        let mut degradations = Vec::new();
        let mut note = |stage: Stage, reason: Option<&ServiceFailure>| {
            if let Some(reason) = reason {
                degradations.push(Degradation {
                    stage,
                    reason: reason.clone(),
                });
            }
        };

        info!("locating references");
        let candidates = self
            .locator
            .locate(request.character_name(), self.config.pipeline.reference_limit)
            .await;
        note(Stage::Locate, candidates.reason());
        let candidates = candidates.into_inner();

        info!(candidates = candidates.len(), "fetching and publishing references");
        let timestamp = file_timestamp();
        let mut references = Vec::new();
        let mut failed_references = Vec::new();
        for (i, candidate) in candidates.into_iter().enumerate() {
            let index = i + 1;
            let filename =
                AssetFetcher::file_name_for(request.character_name(), index, &timestamp);
            let local_path = match self.fetcher.fetch(&candidate, &filename).await {
                Ok(path) => path,
                Err(e) => {
                    warn!(
                        index,
                        error = e.category(),
                        recoverable = e.is_recoverable(),
                        "reference skipped: {e}"
                    );
                    failed_references.push(index);
                    continue;
                },
            };
            let published = self
                .publisher
                .publish(&local_path, request.character_name())
                .await;
            if let Outcome::Degraded { reason, .. } = &published {
                if self.publisher.storage_enabled() {
                    note(Stage::PublishReference, Some(reason));
                }
            }
            references.push(ReferenceAsset {
                candidate,
                local_path,
                published_url: published.into_inner(),
            });
        }

        info!(references = references.len(), "synthesizing prompt");
        let prompt = PromptSynthesizer::new(&self.gemini, self.config.pipeline.optimize_timeout())
            .synthesize(&request)
            .await;
        note(Stage::Optimize, prompt.reason());
        let prompt = prompt.into_inner();

        let batch = self
            .pages
            .synthesize_all(&request, &prompt.optimized_prompt, &references, &self.publisher)
            .await;
        info!(
            produced = batch.records.len(),
            failed = batch.failures.len(),
            unstored = batch.unpublished.len(),
            success_rate = batch.success_rate(),
            "pages synthesized"
        );

        let manifest = aggregate(request, prompt, references, batch.records);
        let manifest_path = persist(&manifest, &self.config.paths.output_dir).await?;

        Ok(RunReport {
            manifest,
            manifest_path,
            failed_pages: batch.failures,
            unpublished_pages: batch.unpublished,
            failed_references,
            degradations,
        })
    }
}
