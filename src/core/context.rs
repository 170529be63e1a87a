//! Per-project device context
//!
//! Reads `sketchctl.toml` from the project root:
//!
//! ```toml
//! sketch = "blink.ino"
//! port = "/dev/ttyACM0"
//! output = "build"
//! board = "arduino:avr:uno"
//! configuration = "cpu=atmega328"
//! ```
//!
//! The context may be completed in memory during a call (sketch
//! auto-discovery) but is never written back.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::board::BoardDescriptor;
use crate::config::defaults::PROJECT_FILE;
use crate::error::ConfigError;

/// On-disk shape of `sketchctl.toml`
#[derive(Debug, Clone, Default, Deserialize)]
struct ProjectFile {
    sketch: Option<PathBuf>,
    port: Option<String>,
    output: Option<PathBuf>,
    board: Option<String>,
    configuration: Option<String>,
}

/// Mutable per-project state consumed by verify and upload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceContext {
    /// Entry sketch, relative to the project root
    pub sketch: Option<PathBuf>,

    /// Serial port used for uploads
    pub port: Option<String>,

    /// Build output directory, relative to the project root
    pub output: Option<PathBuf>,

    /// Selected board
    pub board: Option<BoardDescriptor>,

    /// Free-form board options (`key=value,key=value`)
    pub configuration: Option<String>,
}

impl DeviceContext {
    /// Parse from TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let file: ProjectFile = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from(PROJECT_FILE),
            error: e.to_string(),
        })?;
        Self::from_file(file)
    }

    /// Load the context of a project
    ///
    /// A project without `sketchctl.toml` has an empty context; the pipeline
    /// reports whatever selection is missing.
    pub fn load(project_root: &Path) -> Result<Self, ConfigError> {
        let path = project_root.join(PROJECT_FILE);
        if !path.exists() {
            tracing::debug!("No {} in {}", PROJECT_FILE, project_root.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
            path: path.clone(),
            error: e.to_string(),
        })?;
        let file: ProjectFile = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            error: e.to_string(),
        })?;
        Self::from_file(file)
    }

    fn from_file(file: ProjectFile) -> Result<Self, ConfigError> {
        let board = file
            .board
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::parse::<BoardDescriptor>)
            .transpose()?;

        Ok(Self {
            sketch: file.sketch.filter(|s| !s.as_os_str().is_empty()),
            port: file.port.filter(|p| !p.trim().is_empty()),
            output: file.output.filter(|o| !o.as_os_str().is_empty()),
            board,
            configuration: file.configuration.filter(|c| !c.trim().is_empty()),
        })
    }

    /// The selected board with the project's option selections applied
    pub fn resolved_board(&self) -> Option<BoardDescriptor> {
        let board = self.board.clone()?;
        Some(match &self.configuration {
            Some(configuration) => board.with_options(configuration),
            None => board,
        })
    }

    /// Output directory resolved against the project root
    pub fn output_dir(&self, project_root: &Path) -> Option<PathBuf> {
        self.output.as_ref().map(|o| project_root.join(o))
    }
}
