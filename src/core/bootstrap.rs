//! Best-effort package index bootstrap
//!
//! A fresh toolchain installation has no package index, and installs fail
//! until one is downloaded. Before the first package operation the index is
//! refreshed once. The refresh is allowed to fail: the outcome is returned so
//! callers can log it, and the caller proceeds either way.

use std::path::Path;

use super::installer::{InstallResult, PackageInstaller};
use crate::config::defaults::PACKAGE_INDEX_FILE;
use crate::error::ToolchainError;

/// What the bootstrap did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// An index refresh ran; its result is informational only
    Attempted(Result<InstallResult, ToolchainError>),
    /// The index already exists
    Skipped,
}

impl BootstrapOutcome {
    /// Whether a refresh was attempted and did not succeed
    pub fn failed(&self) -> bool {
        match self {
            Self::Attempted(Ok(result)) => !result.is_success(),
            Self::Attempted(Err(_)) => true,
            Self::Skipped => false,
        }
    }
}

/// Refresh the package index unless `packages_root` already has one
pub async fn bootstrap_index(installer: &PackageInstaller, packages_root: &Path) -> BootstrapOutcome {
    if packages_root.join(PACKAGE_INDEX_FILE).exists() {
        tracing::debug!("Package index present in {}", packages_root.display());
        return BootstrapOutcome::Skipped;
    }

    let outcome = BootstrapOutcome::Attempted(installer.update_index().await);
    if outcome.failed() {
        tracing::warn!("Package index refresh failed, continuing without it");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_reports() {
        assert!(!BootstrapOutcome::Skipped.failed());
        assert!(!BootstrapOutcome::Attempted(Ok(InstallResult::AlreadyPresent)).failed());
        assert!(BootstrapOutcome::Attempted(Ok(InstallResult::Failed(255))).failed());
        assert!(BootstrapOutcome::Attempted(Err(ToolchainError::Terminated {
            program: "arduino".to_string()
        }))
        .failed());
    }
}
