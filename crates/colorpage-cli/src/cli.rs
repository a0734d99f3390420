//! # CLI Structure and Argument Parsing
//!
//! `colorpage` has three subcommands:
//!
//! ```bash
//! # One run for one character
//! colorpage generate 도라에몽 --count 3 --age-group child --difficulty easy
//!
//! # Every combination listed in a character file
//! colorpage batch --characters character_config.json
//!
//! # Decode the page images stored in a manifest
//! colorpage extract production_output/coloring_pages_도라에몽_child_easy_20250101_120000.json
//! ```
//!
//! Global options (`--verbose`, `--quiet`, `--config`) apply to all of them.

use clap::{Parser, Subcommand, ValueEnum};
use colorpage_core::{AgeGroup, Difficulty};
use std::path::PathBuf;

/// Main CLI structure for the `colorpage` command
#[derive(Parser, Clone, Debug)]
#[command(name = "colorpage")]
#[command(version)]
#[command(about = "colorpage - printable coloring pages from character references", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Show debug logs
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress informational messages (only show errors)
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to a TOML config file (overrides `COLORPAGE_CONFIG`)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Generate coloring pages for one character
    Generate {
        /// Character name, e.g. 도라에몽
        character: String,

        /// Number of pages to generate
        #[arg(short = 'c', long, default_value_t = 10)]
        count: u32,

        /// Target age group
        #[arg(short = 'a', long, value_enum, default_value_t = AgeGroupArg::Child)]
        age_group: AgeGroupArg,

        /// Target difficulty
        #[arg(short = 'd', long, value_enum, default_value_t = DifficultyArg::Easy)]
        difficulty: DifficultyArg,

        /// Directory for the manifest and page images
        #[arg(short = 'o', long, default_value = "production_output")]
        output_dir: PathBuf,

        /// Keep everything local even when storage credentials are set
        #[arg(long)]
        no_storage: bool,

        /// Write page images to `<output-dir>/extracted_images` afterwards
        #[arg(long)]
        extract_images: bool,
    },

    /// Generate every combination listed in a character file
    Batch {
        /// Character file (JSON); a default one is written when missing
        #[arg(short = 'c', long = "characters", default_value = "character_config.json")]
        characters: PathBuf,

        /// Directory for manifests and the batch summary
        #[arg(short = 'o', long, default_value = "batch_output")]
        output_dir: PathBuf,

        /// Keep everything local even when storage credentials are set
        #[arg(long)]
        no_storage: bool,

        /// Extract page images after each run
        #[arg(long)]
        extract_images: bool,
    },

    /// Decode the page images stored in a manifest
    Extract {
        /// Manifest JSON written by `generate` or `batch`
        manifest: PathBuf,

        /// Target directory
        #[arg(short = 'o', long, default_value = "extracted_images")]
        output_dir: PathBuf,
    },
}

/// Age group as accepted on the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum AgeGroupArg {
    Child,
    Teen,
    Adult,
}

impl From<AgeGroupArg> for AgeGroup {
    fn from(arg: AgeGroupArg) -> Self {
        match arg {
            AgeGroupArg::Child => Self::Child,
            AgeGroupArg::Teen => Self::Teen,
            AgeGroupArg::Adult => Self::Adult,
        }
    }
}

/// Difficulty as accepted on the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DifficultyArg {
    Easy,
    Medium,
    Hard,
}

impl From<DifficultyArg> for Difficulty {
    fn from(arg: DifficultyArg) -> Self {
        match arg {
            DifficultyArg::Easy => Self::Easy,
            DifficultyArg::Medium => Self::Medium,
            DifficultyArg::Hard => Self::Hard,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_defaults() {
        let cli = Cli::try_parse_from(["colorpage", "generate", "피카츄"]).unwrap();
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
                assert_eq!(character, "피카츄");
                assert_eq!(count, 10);
                assert_eq!(age_group, AgeGroupArg::Child);
                assert_eq!(difficulty, DifficultyArg::Easy);
                assert_eq!(output_dir, PathBuf::from("production_output"));
                assert!(!no_storage);
                assert!(!extract_images);
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_generate_short_flags() {
        let cli = Cli::try_parse_from([
            "colorpage", "generate", "하츄핑", "-c", "3", "-a", "teen", "-d", "hard", "-o", "out",
        ])
        .unwrap();
        let Commands::Generate {
            count,
            age_group,
            difficulty,
            ..
        } = cli.command
        else {
            panic!("expected generate");
        };
        assert_eq!(count, 3);
        assert_eq!(AgeGroup::from(age_group), AgeGroup::Teen);
        assert_eq!(Difficulty::from(difficulty), Difficulty::Hard);
    }

    #[test]
    fn test_rejects_unknown_age_group() {
        let result = Cli::try_parse_from(["colorpage", "generate", "x", "-a", "toddler"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["colorpage", "extract", "m.json", "-q", "--config", "c.toml"])
                .unwrap();
        assert!(cli.quiet);
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["colorpage", "-v", "-q", "extract", "m.json"]).is_err());
    }
}
