//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no business logic - that belongs in the [`crate::core`] module.

pub mod commands;
pub mod output;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use commands::Commands;

/// sketchctl - Firmware build and upload orchestration
///
/// Verify and upload sketches, and manage board packages and libraries.
#[derive(Parser, Debug)]
#[command(name = "sketchctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Project directory (defaults to the current directory)
    #[arg(
        short = 'C',
        long = "project",
        env = "SKETCHCTL_PROJECT",
        global = true,
        value_name = "DIR"
    )]
    pub project: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options shared by every command
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    /// Project root directory
    pub project_root: PathBuf,
    /// Suppress toolchain output
    pub quiet: bool,
    /// Machine-readable output
    pub json: bool,
}

impl Cli {
    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        let Some(cmd) = self.command else {
            // No subcommand provided, show help
            use clap::CommandFactory;
            let mut cmd = Self::command();
            cmd.print_help()?;
            return Ok(());
        };

        let project_root = match self.project {
            Some(path) => path,
            None => std::env::current_dir().context("Failed to read current directory")?,
        };
        let options = GlobalOptions {
            project_root,
            quiet: self.quiet,
            json: self.json,
        };
        cmd.run(&options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["sketchctl", "ports", "--json", "-vv", "-C", "/work"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.project, Some(PathBuf::from("/work")));
    }
}
