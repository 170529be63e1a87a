//! Platform-specific directory management
//!
//! Provides the settings directory and the default locations the toolchain
//! uses for user-installed board packages and the sketchbook.
//!
//! Environment variables can override default directories:
//! - `SKETCHCTL_CONFIG_DIR` - Override config directory
//! - `SKETCHCTL_PACKAGES_DIR` - Override user packages root
//! - `SKETCHCTL_SKETCHBOOK_DIR` - Override sketchbook directory

use std::env;
use std::path::PathBuf;

use crate::config::defaults::SETTINGS_FILE;

/// Environment variable names for directory overrides
pub const ENV_CONFIG_DIR: &str = "SKETCHCTL_CONFIG_DIR";
pub const ENV_PACKAGES_DIR: &str = "SKETCHCTL_PACKAGES_DIR";
pub const ENV_SKETCHBOOK_DIR: &str = "SKETCHCTL_SKETCHBOOK_DIR";

/// Application name used in directory paths
const APP_NAME: &str = "sketchctl";

/// Directory the toolchain keeps installed packages in
const PACKAGES_DIR_NAME: &str = "Arduino15";

/// Sketchbook directory name
const SKETCHBOOK_DIR_NAME: &str = "Arduino";

/// Platform-specific directory provider
#[derive(Debug, Clone)]
pub struct SketchctlDirs {
    config_dir: PathBuf,
    packages_dir: PathBuf,
    sketchbook_dir: PathBuf,
}

impl SketchctlDirs {
    /// Create a new `SketchctlDirs` instance
    ///
    /// Checks environment variables first, then falls back to platform defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config_dir: Self::resolve(ENV_CONFIG_DIR, Self::platform_config_dir),
            packages_dir: Self::resolve(ENV_PACKAGES_DIR, Self::platform_packages_dir),
            sketchbook_dir: Self::resolve(ENV_SKETCHBOOK_DIR, Self::platform_sketchbook_dir),
        }
    }

    /// Get the config directory path
    ///
    /// - Linux: `$XDG_CONFIG_HOME/sketchctl` or `~/.config/sketchctl`
    /// - macOS: `~/Library/Application Support/sketchctl`
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone()
    }

    /// Get the user packages root
    ///
    /// - Linux: `~/.arduino15`
    /// - macOS: `~/Library/Arduino15`
    /// - Windows: `%LOCALAPPDATA%\Arduino15`
    #[must_use]
    pub fn packages_dir(&self) -> PathBuf {
        self.packages_dir.clone()
    }

    /// Get the sketchbook directory (holds user libraries)
    #[must_use]
    pub fn sketchbook_dir(&self) -> PathBuf {
        self.sketchbook_dir.clone()
    }

    /// Get the settings file path
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILE)
    }

    fn resolve(var: &str, default: fn() -> PathBuf) -> PathBuf {
        match env::var(var) {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => default(),
        }
    }

    fn home() -> PathBuf {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get platform-specific config directory
    fn platform_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .unwrap_or_else(|| Self::home().join(".config").join(APP_NAME))
    }

    /// Get platform-specific packages directory
    fn platform_packages_dir() -> PathBuf {
        if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .map(|p| p.join(PACKAGES_DIR_NAME))
                .unwrap_or_else(|| Self::home().join(PACKAGES_DIR_NAME))
        } else if cfg!(target_os = "macos") {
            Self::home().join("Library").join(PACKAGES_DIR_NAME)
        } else {
            Self::home().join(format!(".{}", PACKAGES_DIR_NAME.to_lowercase()))
        }
    }

    /// Get platform-specific sketchbook directory
    fn platform_sketchbook_dir() -> PathBuf {
        if cfg!(target_os = "linux") {
            Self::home().join(SKETCHBOOK_DIR_NAME)
        } else {
            dirs::document_dir()
                .map(|p| p.join(SKETCHBOOK_DIR_NAME))
                .unwrap_or_else(|| Self::home().join(SKETCHBOOK_DIR_NAME))
        }
    }
}

impl Default for SketchctlDirs {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_new_creates_instance() {
        let dirs = SketchctlDirs::new();
        assert!(!dirs.config_dir().as_os_str().is_empty());
        assert!(!dirs.packages_dir().as_os_str().is_empty());
        assert!(!dirs.sketchbook_dir().as_os_str().is_empty());
    }

    #[test]
    fn test_settings_path_is_under_config_dir() {
        let dirs = SketchctlDirs::new();
        assert!(dirs.settings_path().starts_with(dirs.config_dir()));
        assert!(dirs.settings_path().ends_with("config.toml"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_packages_dir_is_hidden() {
        let path = SketchctlDirs::platform_packages_dir();
        assert!(path.ends_with(".arduino15"));
    }
}
