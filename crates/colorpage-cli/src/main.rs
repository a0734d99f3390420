//! colorpage CLI - printable coloring pages from character references
//!
//! This is the main entry point for the colorpage command-line interface.
//! Command implementations live in `commands`.

use anyhow::Result;
use clap::Parser;
use colorpage_core::GenerationRequest;

mod cli;
mod commands;
mod logging;

use cli::{Cli, Commands};
use commands::RunSettings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::initialize_logging(&cli)?;

    execute_command(cli).await
}

async fn execute_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Generate {
            character,
            count,
            age_group,
            difficulty,
            output_dir,
            no_storage,
            extract_images,
        } => {
            // Reject a bad request before touching config or the network.
            let request =
                GenerationRequest::new(character, age_group.into(), difficulty.into(), count)?;
            let config = commands::load_config(cli.config.as_deref())?;
            let settings = RunSettings {
                output_dir,
                no_storage,
                extract_images,
                show_progress: !cli.quiet,
            };
            commands::generate(config, request, settings).await?;
        },

        Commands::Batch {
            characters,
            output_dir,
            no_storage,
            extract_images,
        } => {
            let config = commands::load_config(cli.config.as_deref())?;
            let settings = RunSettings {
                output_dir,
                no_storage,
                extract_images,
                show_progress: !cli.quiet,
            };
            commands::run_batch(config, &characters, settings).await?;
        },

        Commands::Extract {
            manifest,
            output_dir,
        } => {
            commands::extract_manifest(&manifest, &output_dir).await?;
        },
    }

    Ok(())
}
