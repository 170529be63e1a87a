//! User settings
//!
//! Reads `config.toml` from the config directory. Settings select the
//! build/upload strategy, locate the toolchain, hold the direct commands,
//! and carry user property overrides for pattern-driven uploads.
//!
//! ```toml
//! [toolchain]
//! strategy = "pattern-driven"
//! ide_path = "/opt/arduino-1.8.19"
//!
//! [commands]
//! upload = "make flash PORT=/dev/ttyUSB0"
//!
//! [output]
//! verbose = true
//!
//! [properties]
//! "upload.speed" = "57600"
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::properties::PropertySet;
use crate::error::{ConfigError, ResolutionError};
use crate::infra::dirs::SketchctlDirs;

/// How verify and upload are carried out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Run user-specified command lines verbatim
    DirectCommand,
    /// Compose commands from platform property patterns
    PatternDriven,
    /// Invoke the all-in-one toolchain executable
    #[default]
    FullIde,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DirectCommand => write!(f, "direct-command"),
            Self::PatternDriven => write!(f, "pattern-driven"),
            Self::FullIde => write!(f, "full-ide"),
        }
    }
}

/// User settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// Toolchain location and strategy
    #[serde(default)]
    pub toolchain: ToolchainConfig,

    /// Direct-command strategy command lines
    #[serde(default)]
    pub commands: CommandsConfig,

    /// Output preferences
    #[serde(default)]
    pub output: OutputConfig,

    /// User property overrides, merged last
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// Toolchain configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolchainConfig {
    /// Strategy used for verify and upload
    #[serde(default)]
    pub strategy: Strategy,

    /// Toolchain installation directory
    pub ide_path: Option<PathBuf>,

    /// Explicit toolchain executable
    pub executable: Option<PathBuf>,

    /// Explicit builder executable (pattern-driven compile)
    pub builder: Option<PathBuf>,

    /// User packages root override
    pub packages_path: Option<PathBuf>,

    /// Sketchbook override
    pub sketchbook_path: Option<PathBuf>,
}

/// Direct-command strategy command lines
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandsConfig {
    /// Command run for verify
    pub verify: Option<String>,

    /// Command run for upload
    pub upload: Option<String>,
}

/// Output preferences
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Pass verbose flags to the toolchain
    pub verbose: Option<bool>,
}

/// Resolved on-disk layout of the toolchain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainLayout {
    /// Toolchain installation directory
    pub ide_path: PathBuf,
    /// Directory holding `hardware/`, `libraries/` and the builder
    ///
    /// Same as `ide_path` except inside a macOS app bundle.
    pub resources_path: PathBuf,
    /// All-in-one executable
    pub executable: PathBuf,
    /// Builder executable
    pub builder: PathBuf,
    /// Platforms bundled with the toolchain
    pub builtin_packages_root: PathBuf,
    /// User packages root (contains `packages/`)
    pub user_packages_root: PathBuf,
    /// Sketchbook (contains `libraries/`)
    pub sketchbook: PathBuf,
}

impl Settings {
    /// Load settings from the config directory
    ///
    /// If the settings file doesn't exist, returns default settings.
    pub fn load(dirs: &SketchctlDirs) -> Result<Self, ConfigError> {
        Self::load_from_path(&dirs.settings_path())
    }

    /// Load settings from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::from_toml(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse from TOML string
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Strategy for this call
    pub fn strategy(&self) -> Strategy {
        self.toolchain.strategy
    }

    /// Whether verbose toolchain output is requested
    pub fn is_verbose(&self) -> bool {
        self.output.verbose.unwrap_or(false)
    }

    /// User property overrides as a property layer
    pub fn user_properties(&self) -> PropertySet {
        self.properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Resolve where the toolchain lives
    ///
    /// With no `ide_path`, the executable is looked up on `PATH` and its
    /// directory becomes the installation directory.
    pub fn toolchain_layout(&self, dirs: &SketchctlDirs) -> Result<ToolchainLayout, ResolutionError> {
        let ide_path = match (&self.toolchain.ide_path, &self.toolchain.executable) {
            (Some(path), _) => path.clone(),
            (None, Some(executable)) => executable
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
            (None, None) => which::which(EXECUTABLE_NAME)
                .ok()
                .and_then(|exe| exe.canonicalize().ok())
                .and_then(|exe| exe.parent().map(Path::to_path_buf))
                .ok_or_else(|| ResolutionError::ExecutableNotFound {
                    name: EXECUTABLE_NAME.to_string(),
                })?,
        };

        let bundle = AppBundle::detect(&ide_path);
        let resources_path = bundle.resources_path(&ide_path);
        let executable = self
            .toolchain
            .executable
            .clone()
            .unwrap_or_else(|| bundle.executable(&ide_path));
        let builder = self
            .toolchain
            .builder
            .clone()
            .unwrap_or_else(|| resources_path.join(BUILDER_NAME));

        Ok(ToolchainLayout {
            builtin_packages_root: resources_path.join("hardware"),
            user_packages_root: self
                .toolchain
                .packages_path
                .clone()
                .unwrap_or_else(|| dirs.packages_dir()),
            sketchbook: self
                .toolchain
                .sketchbook_path
                .clone()
                .unwrap_or_else(|| dirs.sketchbook_dir()),
            ide_path,
            resources_path,
            executable,
            builder,
        })
    }
}

#[cfg(target_os = "windows")]
const EXECUTABLE_NAME: &str = "arduino_debug.exe";
#[cfg(not(target_os = "windows"))]
const EXECUTABLE_NAME: &str = "arduino";

#[cfg(target_os = "windows")]
const BUILDER_NAME: &str = "arduino-builder.exe";
#[cfg(not(target_os = "windows"))]
const BUILDER_NAME: &str = "arduino-builder";

/// Shape of the installation directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AppBundle {
    /// `Arduino.app` with `Contents/MacOS` and `Contents/Java`
    MacOs,
    /// Everything directly under the installation directory
    Flat,
}

impl AppBundle {
    fn detect(ide_path: &Path) -> Self {
        if ide_path.join("Contents").join("Java").is_dir() {
            Self::MacOs
        } else {
            Self::Flat
        }
    }

    fn resources_path(self, ide_path: &Path) -> PathBuf {
        match self {
            Self::MacOs => ide_path.join("Contents").join("Java"),
            Self::Flat => ide_path.to_path_buf(),
        }
    }

    fn executable(self, ide_path: &Path) -> PathBuf {
        match self {
            Self::MacOs => ide_path.join("Contents").join("MacOS").join("Arduino"),
            Self::Flat => ide_path.join(EXECUTABLE_NAME),
        }
    }
}
