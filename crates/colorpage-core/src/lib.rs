//! # colorpage-core
//!
//! Core pipeline for turning a character name into a set of printable
//! coloring pages.
//!
//! A run locates reference images, fetches and publishes them, builds a
//! generation prompt, synthesizes one image per requested page and records
//! everything in a JSON manifest. Each external service (image search, object
//! storage, text and image generation) is optional: without it the stage
//! falls back to an offline behaviour and the run still completes.
//!
//! ## Architecture
//!
//! - **Configuration**: [`Config`], loaded from TOML plus environment overrides
//! - **Reference Locator**: [`locator::ReferenceLocator`]
//! - **Asset Fetcher**: [`fetcher::AssetFetcher`]
//! - **Asset Publisher**: [`publisher::AssetPublisher`]
//! - **Prompt Synthesizer**: [`prompt::PromptSynthesizer`]
//! - **Page Synthesizer**: [`pages::PageSynthesizer`]
//! - **Result Aggregator**: [`manifest::aggregate`] and [`manifest::persist`]
//! - **Pipeline**: [`Pipeline`] wires the above together
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use colorpage_core::{AgeGroup, Config, Difficulty, GenerationRequest, Pipeline, PipelineOptions};
//!
//! # async fn example() -> colorpage_core::Result<()> {
//! let config = Config::load()?;
//! let pipeline = Pipeline::new(config, PipelineOptions::default())?;
//! let request = GenerationRequest::new("도라에몽", AgeGroup::Child, Difficulty::Easy, 3)?;
//!
//! let report = pipeline.run(request).await?;
//! println!("{} of {} pages -> {}", report.achieved(), report.requested(), report.manifest_path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Fallible operations return [`Result<T, Error>`]. Service calls return an
//! [`Outcome`] instead, which carries either a fresh value or a fallback
//! together with its [`ServiceFailure`].

/// Configuration loading and environment overrides
pub mod config;
/// Error types and result aliases
pub mod error;
/// Manifest image extraction
pub mod extract;
/// Reference image download and local copy
pub mod fetcher;
/// Generative model client
pub mod gemini;
/// Shared HTTP client helpers
pub mod http;
/// Reference image search with offline samples
pub mod locator;
/// Run manifest aggregation and persistence
pub mod manifest;
/// Fresh-or-degraded service results
pub mod outcome;
/// Per-page synthesis loop
pub mod pages;
/// End-to-end pipeline
pub mod pipeline;
/// Object storage publishing with `file://` fallback
pub mod publisher;
/// Prompt templates and refinement
pub mod prompt;
/// Offline placeholder page
pub mod raster;
/// Core data types
pub mod types;

pub use config::{Config, Credentials};
pub use error::{Error, Result};
pub use extract::extract_images;
pub use manifest::{ManifestDocument, RunManifest};
pub use outcome::{Outcome, ServiceFailure};
pub use pages::{FixedDelay, NoDelay, UnpublishedPage, WaitPolicy};
pub use pipeline::{Pipeline, PipelineOptions, RunReport};
pub use types::{
    AgeGroup, Difficulty, GenerationRequest, ImageOrigin, PageRecord, ReferenceAsset,
    ReferenceCandidate, ReferenceSlot, SynthesizedImage, SynthesizedPrompt,
};
