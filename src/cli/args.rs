//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    apply::ApplyArgs, completions::CompletionsArgs, init::InitArgs, recipe::RecipeCommands,
    run::RunArgs,
};

#[derive(Parser)]
#[command(name = "appconf")]
#[command(author, version, about = "Application configuration wizard")]
#[command(long_about = "Select applications, fill in their recipe fields with validation and hand one aggregated configuration to the installer.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format (default: config `default_format`, else yaml)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .appconf/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new appconf project
    Init(InitArgs),

    /// Run the interactive configuration wizard
    Run(RunArgs),

    /// Run the wizard non-interactively from an answers file
    Apply(ApplyArgs),

    /// Inspect available recipes
    #[command(subcommand)]
    Recipe(RecipeCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// YAML format (full fidelity)
    #[default]
    Yaml,
    /// JSON format (for programming)
    Json,
}

impl OutputFormat {
    /// Resolve the flag against the configured default
    pub fn resolve(flag: Option<OutputFormat>, configured: Option<&str>) -> OutputFormat {
        flag.or_else(|| configured.and_then(|f| OutputFormat::from_str(f, true).ok()))
            .unwrap_or_default()
    }
}
