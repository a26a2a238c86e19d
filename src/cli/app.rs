//! Main CLI application structure

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use super::common::Session;
use super::output::{Output, OutputFormat};
use super::{convert, mappings, restore, validate};
use crate::logging;
use crate::storage::Config;

#[derive(Parser)]
#[command(name = "fqcn")]
#[command(author, version, about = "Rewrite Ansible short module names to fully-qualified collection names")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (default: text, or `format` from config)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project config file (default: nearest .fqcn.toml)
    #[arg(long, global = true, value_name = "PATH", env = "FQCN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Mapping override table (YAML or JSON)
    #[arg(long, global = true, value_name = "PATH")]
    pub mappings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert short module names in place
    Convert(convert::ConvertArgs),

    /// Report short module names and a compliance score
    Validate(validate::ValidateArgs),

    /// Put backed-up originals back in place
    Restore(restore::RestoreArgs),

    /// Inspect the module mapping table
    #[command(subcommand)]
    Mappings(mappings::MappingsCommands),
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = Config::load(cli.config.as_deref())?;
    let format = cli.format.or(config.format).unwrap_or_default();
    let output = Output::new(format, cli.verbose);

    output.verbose("fqcn starting");
    for source in &config.sources {
        output.verbose_ctx("config", &format!("Loaded {}", source.display()));
    }

    let session = Session {
        config,
        mappings: cli.mappings,
    };

    match cli.command {
        Commands::Convert(args) => convert::run(args, &session, &output),
        Commands::Validate(args) => validate::run(args, &session, &output),
        Commands::Restore(args) => restore::run(args, &session, &output),
        Commands::Mappings(cmd) => mappings::run(cmd, &session, &output),
    }
}
