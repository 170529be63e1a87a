//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod board;
pub mod index;
pub mod library;
pub mod ports;
pub mod upload;
pub mod verify;

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::PathBuf;
use std::sync::Arc;

use super::output::ConsoleSink;
use super::GlobalOptions;
use crate::core::context::DeviceContext;
use crate::core::installer::PackageInstaller;
use crate::core::orchestrator::SketchOrchestrator;
use crate::core::settings::{Settings, ToolchainLayout};
use crate::infra::dirs::SketchctlDirs;
use crate::infra::process::TokioSpawner;
use crate::infra::serial::SystemSerial;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile the sketch
    Verify {
        /// Build output directory for this run
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Compile and upload the sketch to the board
    Upload,

    /// Board package management
    Board {
        #[command(subcommand)]
        command: BoardCommands,
    },

    /// Library management
    Lib {
        #[command(subcommand)]
        command: LibCommands,
    },

    /// Refresh the board package index
    UpdateIndex,

    /// List serial ports
    Ports,
}

/// Board subcommands
#[derive(Subcommand, Debug)]
pub enum BoardCommands {
    /// Install a board package
    #[command(disable_version_flag = true)]
    Install {
        /// Package name (e.g. arduino)
        name: String,

        /// Architecture (e.g. avr)
        #[arg(long)]
        arch: Option<String>,

        /// Package version
        #[arg(long)]
        version: Option<String>,
    },

    /// Remove an installed board package
    Uninstall {
        /// Package name, optionally with architecture (e.g. arduino:avr)
        name: String,
    },
}

/// Library subcommands
#[derive(Subcommand, Debug)]
pub enum LibCommands {
    /// Install a library
    #[command(disable_version_flag = true)]
    Install {
        /// Library name
        name: String,

        /// Library version
        #[arg(long)]
        version: Option<String>,
    },

    /// Remove an installed library
    Uninstall {
        /// Library name
        name: String,
    },
}

impl Commands {
    /// Execute the command
    pub async fn run(self, options: &GlobalOptions) -> Result<()> {
        match self {
            Self::Verify { output } => verify::execute(options, output.as_deref()).await,
            Self::Upload => upload::execute(options).await,
            Self::Board { command } => match command {
                BoardCommands::Install {
                    name,
                    arch,
                    version,
                } => board::execute_install(options, &name, arch.as_deref(), version.as_deref()).await,
                BoardCommands::Uninstall { name } => board::execute_uninstall(options, &name),
            },
            Self::Lib { command } => match command {
                LibCommands::Install { name, version } => {
                    library::execute_install(options, &name, version.as_deref()).await
                }
                LibCommands::Uninstall { name } => library::execute_uninstall(options, &name),
            },
            Self::UpdateIndex => index::execute(options).await,
            Self::Ports => ports::execute(options).await,
        }
    }
}

/// Directories and user settings for a command
struct Environment {
    dirs: SketchctlDirs,
    settings: Settings,
}

impl Environment {
    fn load() -> Result<Self> {
        let dirs = SketchctlDirs::new();
        let settings = Settings::load(&dirs).with_context(|| {
            format!("Failed to load settings from {}", dirs.settings_path().display())
        })?;
        Ok(Self { dirs, settings })
    }

    fn layout(&self) -> Result<ToolchainLayout> {
        Ok(self.settings.toolchain_layout(&self.dirs)?)
    }

    fn installer(&self, sink: Arc<ConsoleSink>) -> Result<PackageInstaller> {
        Ok(PackageInstaller::new(
            Arc::new(TokioSpawner),
            self.layout()?.executable,
            sink,
        ))
    }

    fn orchestrator(&self, sink: Arc<ConsoleSink>) -> SketchOrchestrator {
        SketchOrchestrator::new(
            Arc::new(TokioSpawner),
            Arc::new(SystemSerial),
            Arc::new(SystemSerial),
        )
        .with_sink(sink)
        .with_dirs(self.dirs.clone())
    }
}

fn load_context(options: &GlobalOptions) -> Result<DeviceContext> {
    DeviceContext::load(&options.project_root).with_context(|| {
        format!(
            "Failed to load project configuration in {}",
            options.project_root.display()
        )
    })
}
