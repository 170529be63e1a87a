//! Error types for sketchctl
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// User configuration errors
///
/// Raised before any subprocess runs when the project is missing a
/// selection the operation needs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No board selected for the project
    #[error("No board selected. Set 'board' in sketchctl.toml (e.g. board = \"arduino:avr:uno\")")]
    NoBoardSelected,

    /// Board string could not be parsed
    #[error("Invalid board '{value}': expected <package>:<arch>:<board>[:<options>]")]
    InvalidBoard { value: String },

    /// No serial port selected
    #[error("No serial port selected. Set 'port' in sketchctl.toml")]
    NoPortSelected,

    /// Project root is not a directory
    #[error("Project root '{path}' does not exist or is not a directory")]
    NoProjectRoot { path: PathBuf },

    /// Direct-command strategy without a command for the operation
    #[error("No {operation} command configured. Set 'commands.{operation}' in config.toml")]
    MissingCommand { operation: String },

    /// Failed to read a configuration file
    #[error("Failed to read '{path}': {error}")]
    ReadError { path: PathBuf, error: String },

    /// Failed to parse a configuration file
    #[error("Failed to parse '{path}': {error}")]
    ParseError { path: PathBuf, error: String },
}

/// Resolution errors
///
/// Something the pipeline needs could not be located on disk or in the
/// merged properties.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// Platform directory not found
    #[error("Platform '{package}:{architecture}' is not installed")]
    PlatformNotFound {
        package: String,
        architecture: String,
    },

    /// Entry sketch not found
    #[error("No sketch file found in '{root}'")]
    SketchNotFound { root: PathBuf },

    /// Required property missing
    #[error("Property '{key}' is not defined for this board")]
    MissingProperty { key: String },

    /// Command line tokenized to nothing
    #[error("Command '{command}' is empty or has unbalanced quotes")]
    EmptyCommand { command: String },

    /// Toolchain executable could not be found
    #[error("Toolchain executable '{name}' not found. Set 'toolchain.ide_path' in config.toml")]
    ExecutableNotFound { name: String },
}

/// External toolchain errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolchainError {
    /// Process exited with a non-zero code
    #[error("'{program}' exited with code {code}")]
    NonZeroExit { program: String, code: i32 },

    /// Process could not be launched
    #[error("Failed to launch '{program}': {error}")]
    Launch { program: String, error: String },

    /// Process was terminated by a signal
    #[error("'{program}' was terminated by a signal")]
    Terminated { program: String },
}

impl ToolchainError {
    /// Exit code of the failed process, if it exited normally
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { code, .. } => Some(*code),
            Self::Launch { .. } | Self::Terminated { .. } => None,
        }
    }
}

/// Serial device errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerialError {
    /// Listing serial devices failed
    #[error("Failed to enumerate serial devices: {error}")]
    Enumerate { error: String },

    /// Opening a serial device failed
    #[error("Failed to open serial port '{port}': {error}")]
    Open { port: String, error: String },
}

/// Filesystem errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to remove directory
    #[error("Failed to remove directory '{path}': {error}")]
    RemoveDir { path: PathBuf, error: String },

    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },

    /// Failed to list directory
    #[error("Failed to list directory '{path}': {error}")]
    ReadDir { path: PathBuf, error: String },
}

/// Top-level sketchctl error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SketchctlError {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Resolution error
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Toolchain error
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    /// Serial device error
    #[error(transparent)]
    Serial(#[from] SerialError),

    /// Filesystem error
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

impl SketchctlError {
    /// Exit code of the external process behind this error, if any
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Toolchain(e) => e.exit_code(),
            _ => None,
        }
    }
}
