//! # ICD Explorer CLI Module
//!
//! This module implements the CLI interface for the ICD-11 MMS explorer.
//!
//! ## Available Commands
//!
//! - `show` - Show every field of an entity
//! - `check` - Check whether a code or id exists
//! - `children` - List the children of an entity
//! - `descendants` - List every entity below an entity
//! - `ancestors` - List every entity above an entity
//! - `exclusions` - List exclusions, inherited by default
//! - `coding-note` - Show the coding note, inherited by default
//! - `release` - Show the release and language in use

mod commands;

use crate::config::{Overrides, Settings};
use clap::{Args, Parser, Subcommand};
use icd_core::IcdError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// ICD-11 MMS Explorer
///
/// Browse the ICD-11 Mortality and Morbidity Statistics classification
/// through the WHO ICD-API or a self-hosted deployment.
#[derive(Parser, Debug)]
#[command(name = "icd-explorer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a TOML settings file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Language of the returned texts (e.g. "en")
    #[arg(short, long, global = true)]
    pub language: Option<String>,

    /// Release to explore (e.g. "2024-01"); latest if omitted
    #[arg(short, long, global = true)]
    pub release: Option<String>,

    /// Root URL of a self-hosted ICD-API deployment
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Address blocks by their code range (e.g. "1A00-1A09")
    #[arg(long, global = true)]
    pub code_ranges: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// The entity a command works on.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
#[group(required = true, multiple = false)]
pub struct Target {
    /// Classification code (e.g. "1A00")
    #[arg(long)]
    pub code: Option<String>,

    /// Entity id (e.g. "257068234")
    #[arg(long)]
    pub id: Option<String>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show every field of an entity
    Show {
        #[command(flatten)]
        target: Target,
    },

    /// Check whether a code or id exists
    Check {
        #[command(flatten)]
        target: Target,
    },

    /// List the children of an entity
    Children {
        #[command(flatten)]
        target: Target,

        /// Include children listed elsewhere in the classification
        #[arg(short, long)]
        elsewhere: bool,
    },

    /// List every entity below an entity
    Descendants {
        #[command(flatten)]
        target: Target,

        /// Include children listed elsewhere (and their subtrees)
        #[arg(short, long)]
        elsewhere: bool,
    },

    /// List every entity above an entity, nearest first
    Ancestors {
        #[command(flatten)]
        target: Target,
    },

    /// List the exclusions of an entity
    Exclusions {
        #[command(flatten)]
        target: Target,

        /// Only the entity's own exclusions, not its ancestors'
        #[arg(long)]
        local_only: bool,
    },

    /// Show the coding note of an entity
    CodingNote {
        #[command(flatten)]
        target: Target,

        /// Only the entity's own note, not its ancestors'
        #[arg(long)]
        local_only: bool,
    },

    /// Show the release and language in use
    Release,
}

impl Cli {
    /// Settings given on the command line.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            language: self.language.clone(),
            release: self.release.clone(),
            api_url: self.api_url.clone(),
            use_code_ranges_as_codes: self.code_ranges,
        }
    }

    /// Resolve the effective settings: file, environment, then flags.
    pub fn settings(&self) -> Result<Settings, IcdError> {
        let mut settings = Settings::load(self.config.as_deref())?;
        settings.apply_overrides(&self.overrides());
        Ok(settings)
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), IcdError> {
    let settings = cli.settings()?;
    let explorer = settings.open_explorer()?;
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Show { target } => cmd_show(&explorer, &target, json_mode),
        Commands::Check { target } => cmd_check(&explorer, &target, json_mode),
        Commands::Children { target, elsewhere } => {
            cmd_children(&explorer, &target, json_mode, elsewhere)
        }
        Commands::Descendants { target, elsewhere } => {
            cmd_descendants(&explorer, &target, json_mode, elsewhere)
        }
        Commands::Ancestors { target } => cmd_ancestors(&explorer, &target, json_mode),
        Commands::Exclusions { target, local_only } => {
            cmd_exclusions(&explorer, &target, json_mode, !local_only)
        }
        Commands::CodingNote { target, local_only } => {
            cmd_coding_note(&explorer, &target, json_mode, !local_only)
        }
        Commands::Release => cmd_release(&explorer, json_mode),
    }
}
