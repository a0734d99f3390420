//! Generate command implementation

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use colorpage_core::{Config, GenerationRequest, Pipeline, PipelineOptions, RunReport, extract_images};

/// Output toggles shared by `generate` and `batch`.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub output_dir: PathBuf,
    pub no_storage: bool,
    pub extract_images: bool,
    /// Print a line as each page finishes.
    pub show_progress: bool,
}

/// Run the pipeline once for `request` and return its report.
pub async fn run_once(
    config: &Config,
    request: GenerationRequest,
    settings: &RunSettings,
) -> Result<RunReport> {
    let mut config = config.clone();
    config.paths.output_dir.clone_from(&settings.output_dir);

    let options = PipelineOptions {
        use_storage: !settings.no_storage,
    };
    let mut pipeline = Pipeline::new(config, options).context("Failed to build pipeline")?;
    if settings.show_progress {
        pipeline = pipeline.with_progress(|page, total| println!("  page {page}/{total}"));
    }
    let report = pipeline.run(request).await?;

    if settings.extract_images {
        let target = settings.output_dir.join("extracted_images");
        let count = extract_images(&report.manifest_path, &target)
            .await
            .with_context(|| format!("Failed to extract images into {}", target.display()))?;
        println!("Extracted {count} image(s) to {}", target.display());
    }

    Ok(report)
}

/// Execute the generate command
pub async fn execute(config: Config, request: GenerationRequest, settings: RunSettings) -> Result<()> {
    println!(
        "Generating {} page(s) for {} ({}/{})",
        request.page_count(),
        request.character_name().bold(),
        request.age_group(),
        request.difficulty()
    );

    let report = run_once(&config, request, &settings).await?;
    print_summary(&report);
    Ok(())
}

fn print_summary(report: &RunReport) {
    let achieved = report.achieved();
    let requested = report.requested();
    let counts = format!("{achieved}/{requested}");
    let counts = if achieved == requested as usize {
        counts.green()
    } else {
        counts.yellow()
    };

    println!("{} Pages generated: {counts}", "✓".green());
    println!("Manifest: {}", report.manifest_path.display());

    for failure in &report.failed_pages {
        println!(
            "  {} page {:02} skipped ({})",
            "✗".red(),
            failure.page_number,
            failure.reason
        );
    }
    for unstored in &report.unpublished_pages {
        println!(
            "  {} page {:02} kept only in the manifest ({})",
            "!".yellow(),
            unstored.page_number,
            unstored.error
        );
    }
    if !report.failed_references.is_empty() {
        println!(
            "  {} reference(s) could not be fetched",
            report.failed_references.len()
        );
    }
    for degradation in &report.degradations {
        println!(
            "  {} {:?} used its fallback ({})",
            "!".yellow(),
            degradation.stage,
            degradation.reason.label()
        );
    }
}
