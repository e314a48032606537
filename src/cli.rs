use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// siteprov - Provision a containerised CMS project for local work
#[derive(Parser, Debug)]
#[command(name = "siteprov")]
#[command(about = "Bring a containerised CMS project to a working state in one run")]
#[command(version)]
pub struct Cli {
    /// Toolchain file (JSON). Defaults to <PROJECT_ROOT>/.provision/toolchain.json
    /// when present, otherwise the built-in lando/composer/npm/curl/drush set.
    #[arg(long, global = true, value_name = "PATH")]
    pub toolchain: Option<PathBuf>,

    /// Read environment variables from this file before running.
    ///
    /// Variables already set in the process environment take precedence.
    /// Without this flag a `.env` in the working directory is loaded if present.
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run every provisioning step (default)
    Run,
    /// Print the steps and commands a run would execute, without side effects
    Plan,
    /// Check that the toolchain's programs are on PATH
    Check,
    /// Write the effective toolchain to a file for editing
    DumpToolchain {
        /// Destination file
        path: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Subcommand to execute; `run` when none was given.
    pub fn subcommand(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }
}
