//! Installed platform lookup
//!
//! Board platforms either ship with the toolchain
//! (`<ide>/hardware/<package>/<arch>`) or are installed later by the user
//! into a versioned directory
//! (`<packages>/packages/<package>/hardware/<arch>/<version>`).

use std::path::{Path, PathBuf};

use super::board::BoardDescriptor;
use crate::error::FilesystemError;
use crate::infra::filesystem;

/// Locates the directory of a board's installed platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformResolver {
    builtin_packages_root: PathBuf,
    user_packages_root: PathBuf,
}

impl PlatformResolver {
    /// Create a resolver over the bundled and user package roots
    pub fn new(builtin_packages_root: impl Into<PathBuf>, user_packages_root: impl Into<PathBuf>) -> Self {
        Self {
            builtin_packages_root: builtin_packages_root.into(),
            user_packages_root: user_packages_root.into(),
        }
    }

    /// Directory of the board's platform, `None` when it is not installed
    ///
    /// A bundled platform wins over a user-installed one. Among installed
    /// versions the first by name is used; versions are not compared.
    pub fn resolve_platform_path(
        &self,
        board: &BoardDescriptor,
    ) -> Result<Option<PathBuf>, FilesystemError> {
        let builtin = self
            .builtin_packages_root
            .join(&board.package)
            .join(&board.architecture);
        if builtin.is_dir() {
            tracing::debug!("Using bundled platform {}", builtin.display());
            return Ok(Some(builtin));
        }

        let installed = self.installed_platform_dir(&board.package, &board.architecture);
        let version = filesystem::list_subdirs(&installed)?.into_iter().next();
        if let Some(path) = &version {
            tracing::debug!("Using installed platform {}", path.display());
        }
        Ok(version)
    }

    /// `runtime.tools.*` properties for every user-installed tool
    ///
    /// Each version is exposed as `runtime.tools.<name>-<version>.path`; the
    /// first version by name also backs `runtime.tools.<name>.path`.
    pub fn tool_properties(&self) -> Result<Vec<(String, String)>, FilesystemError> {
        let mut properties = Vec::new();
        for package in filesystem::list_subdirs(&self.user_packages_root.join("packages"))? {
            for tool in filesystem::list_subdirs(&package.join("tools"))? {
                let Some(name) = tool.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                    continue;
                };
                let versions = filesystem::list_subdirs(&tool)?;
                if let Some(first) = versions.first() {
                    properties.push((
                        format!("runtime.tools.{name}.path"),
                        first.display().to_string(),
                    ));
                }
                for version in &versions {
                    if let Some(v) = version.file_name() {
                        properties.push((
                            format!("runtime.tools.{name}-{}.path", v.to_string_lossy()),
                            version.display().to_string(),
                        ));
                    }
                }
            }
        }
        Ok(properties)
    }

    /// Directory holding the installed versions of a platform
    pub fn installed_platform_dir(&self, package: &str, architecture: &str) -> PathBuf {
        self.user_packages_root
            .join("packages")
            .join(package)
            .join("hardware")
            .join(architecture)
    }

    /// Root of a user-installed package
    pub fn installed_package_dir(&self, package: &str) -> PathBuf {
        self.user_packages_root.join("packages").join(package)
    }

    /// Root of bundled platforms
    pub fn builtin_packages_root(&self) -> &Path {
        &self.builtin_packages_root
    }

    /// Root of user-installed packages
    pub fn user_packages_root(&self) -> &Path {
        &self.user_packages_root
    }
}
