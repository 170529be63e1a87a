//! Board subcommand implementations
//!
//! Implements `sketchctl board install` and `sketchctl board uninstall`.

use anyhow::{bail, Result};
use std::sync::Arc;

use super::Environment;
use crate::cli::output::{status, ConsoleSink};
use crate::cli::GlobalOptions;
use crate::core::bootstrap::{bootstrap_index, BootstrapOutcome};
use crate::core::installer::InstallResult;
use crate::core::platform::PlatformResolver;

/// Execute the board install command
///
/// Refreshes the package index first when none has been downloaded yet.
pub async fn execute_install(
    options: &GlobalOptions,
    name: &str,
    arch: Option<&str>,
    version: Option<&str>,
) -> Result<()> {
    let env = Environment::load()?;
    let layout = env.layout()?;
    let sink = Arc::new(ConsoleSink::new("Installing...", options.quiet || options.json));
    let installer = env.installer(sink.clone())?;

    if let BootstrapOutcome::Attempted(Err(e)) =
        bootstrap_index(&installer, &layout.user_packages_root).await
    {
        tracing::info!("Index bootstrap did not run: {}", e);
    }

    let result = installer.install_board_package(name, arch, version).await?;
    sink.finish();
    report(options, name, result)
}

/// Execute the board uninstall command
///
/// `name` is either a package (`arduino`) or a package and architecture
/// (`arduino:avr`).
pub fn execute_uninstall(options: &GlobalOptions, name: &str) -> Result<()> {
    let env = Environment::load()?;
    let layout = env.layout()?;
    let resolver = PlatformResolver::new(&layout.builtin_packages_root, &layout.user_packages_root);

    let path = match name.split_once(':') {
        Some((package, arch)) => resolver.installed_platform_dir(package, arch),
        None => resolver.installed_package_dir(name),
    };
    if !path.exists() {
        bail!("Board package '{}' is not installed", name);
    }

    let sink = Arc::new(ConsoleSink::new("Removing...", options.quiet || options.json));
    let installer = env.installer(sink.clone())?;
    installer.uninstall_board_package(name, &path)?;
    sink.finish();

    if !options.quiet {
        println!("{} Removed {name}", status::SUCCESS);
    }
    Ok(())
}

/// Print the outcome of an install, failing on a toolchain error code
pub(super) fn report(options: &GlobalOptions, name: &str, result: InstallResult) -> Result<()> {
    match result {
        InstallResult::Failed(code) => bail!("Install of '{}' failed with exit code {}", name, code),
        InstallResult::AlreadyPresent => {
            if !options.quiet {
                println!("{} {name} is already installed", status::SUCCESS);
            }
        }
        InstallResult::Installed => {
            if !options.quiet {
                println!("{} Installed {name}", status::SUCCESS);
            }
        }
    }
    Ok(())
}
