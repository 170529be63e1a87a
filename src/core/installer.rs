//! Board package and library installation
//!
//! Installs go through the toolchain executable. The toolchain exits with
//! code 1 when the requested package or version is already installed, so
//! that code is reported as [`InstallResult::AlreadyPresent`], which counts
//! as success. Uninstalls delete the install directory directly.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::sink::OutputSink;
use crate::error::{FilesystemError, ToolchainError};
use crate::infra::filesystem;
use crate::infra::process::{ProcessSpawner, SpawnOptions};

/// Outcome of an install call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallResult {
    /// The toolchain installed the package
    Installed,
    /// Nothing to do, the package or version is already installed
    AlreadyPresent,
    /// The toolchain failed with this exit code
    Failed(i32),
}

impl InstallResult {
    /// Whether the install left the package in place
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Installed | Self::AlreadyPresent)
    }

    /// Classify a toolchain exit code
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => Self::Installed,
            1 => Self::AlreadyPresent,
            code => Self::Failed(code),
        }
    }
}

impl fmt::Display for InstallResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installed => write!(f, "installed"),
            Self::AlreadyPresent => write!(f, "already installed"),
            Self::Failed(code) => write!(f, "failed with code {code}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum PackageKind {
    Board,
    Library,
}

impl PackageKind {
    fn flag(self) -> &'static str {
        match self {
            Self::Board => "--install-boards",
            Self::Library => "--install-library",
        }
    }

    fn index_message(self) -> &'static str {
        match self {
            Self::Board => "Update package index files...",
            Self::Library => "Update library index files...",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Board => "package",
            Self::Library => "library",
        }
    }
}

/// Installs and removes board packages and libraries
pub struct PackageInstaller {
    spawner: Arc<dyn ProcessSpawner>,
    executable: PathBuf,
    sink: Arc<dyn OutputSink>,
}

impl PackageInstaller {
    /// Create an installer driving `executable`
    pub fn new(
        spawner: Arc<dyn ProcessSpawner>,
        executable: impl Into<PathBuf>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            spawner,
            executable: executable.into(),
            sink,
        }
    }

    /// Install a board package
    ///
    /// An empty `name` with no `version` refreshes the package index only.
    pub async fn install_board_package(
        &self,
        name: &str,
        arch: Option<&str>,
        version: Option<&str>,
    ) -> Result<InstallResult, ToolchainError> {
        let spec = package_spec(name, &[arch, version]);
        let refresh = name.is_empty() && version.is_none();
        self.install(PackageKind::Board, &spec, refresh).await
    }

    /// Install a library
    ///
    /// An empty `name` with no `version` refreshes the library index only.
    pub async fn install_library(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<InstallResult, ToolchainError> {
        let spec = package_spec(name, &[version]);
        let refresh = name.is_empty() && version.is_none();
        self.install(PackageKind::Library, &spec, refresh).await
    }

    /// Refresh the board package index
    pub async fn update_index(&self) -> Result<InstallResult, ToolchainError> {
        self.install_board_package("", None, None).await
    }

    /// Remove an installed board package
    pub fn uninstall_board_package(&self, name: &str, install_path: &Path) -> Result<(), FilesystemError> {
        self.uninstall(PackageKind::Board, name, install_path)
    }

    /// Remove an installed library
    pub fn uninstall_library(&self, name: &str, install_path: &Path) -> Result<(), FilesystemError> {
        self.uninstall(PackageKind::Library, name, install_path)
    }

    async fn install(
        &self,
        kind: PackageKind,
        spec: &str,
        refresh: bool,
    ) -> Result<InstallResult, ToolchainError> {
        let message = if refresh {
            kind.index_message().to_string()
        } else {
            format!("Install {} - {spec}...", kind.label())
        };
        self.sink.start(&message);
        tracing::info!("{}", message);

        let args = vec![kind.flag().to_string(), spec.to_string()];
        let result = match self
            .spawner
            .spawn(
                &self.executable,
                Some(self.sink.as_ref()),
                &args,
                &SpawnOptions::default(),
            )
            .await
        {
            Ok(()) => InstallResult::Installed,
            Err(ToolchainError::NonZeroExit { code, .. }) => InstallResult::from_exit_code(code),
            Err(e) => {
                self.sink.error(&e.to_string());
                return Err(e);
            }
        };

        match result {
            InstallResult::Installed => self.sink.done(&message),
            InstallResult::AlreadyPresent => {
                tracing::info!("{} {} already installed", kind.label(), spec);
                self.sink.done(&message);
            }
            InstallResult::Failed(code) => {
                tracing::warn!("Install of {} failed with code {}", spec, code);
                self.sink.error(&format!("Exit with code={code}"));
            }
        }
        Ok(result)
    }

    fn uninstall(&self, kind: PackageKind, name: &str, install_path: &Path) -> Result<(), FilesystemError> {
        let message = format!("Uninstall {} - {name}...", kind.label());
        self.sink.start(&message);
        tracing::info!("Removing {}", install_path.display());

        if let Err(e) = filesystem::remove_dir_all(install_path) {
            self.sink.error(&e.to_string());
            return Err(e);
        }
        self.sink.done(&message);
        Ok(())
    }
}

impl fmt::Debug for PackageInstaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageInstaller")
            .field("executable", &self.executable)
            .finish_non_exhaustive()
    }
}

/// `name[:part]...`, skipping absent parts
fn package_spec(name: &str, parts: &[Option<&str>]) -> String {
    let mut spec = name.to_string();
    for part in parts.iter().flatten().filter(|p| !p.is_empty()) {
        spec.push(':');
        spec.push_str(part);
    }
    spec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_classification() {
        assert_eq!(InstallResult::from_exit_code(0), InstallResult::Installed);
        assert_eq!(InstallResult::from_exit_code(1), InstallResult::AlreadyPresent);
        assert_eq!(InstallResult::from_exit_code(2), InstallResult::Failed(2));
        assert!(InstallResult::AlreadyPresent.is_success());
        assert!(!InstallResult::Failed(2).is_success());
    }

    #[test]
    fn test_package_spec() {
        assert_eq!(package_spec("arduino", &[Some("avr"), Some("1.8.3")]), "arduino:avr:1.8.3");
        assert_eq!(package_spec("arduino", &[Some("avr"), None]), "arduino:avr");
        assert_eq!(package_spec("Servo", &[None]), "Servo");
        assert_eq!(package_spec("", &[None, None]), "");
    }
}
