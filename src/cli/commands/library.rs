//! Library subcommand implementations

use anyhow::{bail, Result};
use std::sync::Arc;

use super::board::report;
use super::Environment;
use crate::cli::output::{status, ConsoleSink};
use crate::cli::GlobalOptions;

/// Execute the library install command
pub async fn execute_install(options: &GlobalOptions, name: &str, version: Option<&str>) -> Result<()> {
    let env = Environment::load()?;
    let sink = Arc::new(ConsoleSink::new("Installing...", options.quiet || options.json));
    let installer = env.installer(sink.clone())?;

    let result = installer.install_library(name, version).await?;
    sink.finish();
    report(options, name, result)
}

/// Execute the library uninstall command
///
/// Libraries live in `<sketchbook>/libraries/<name>`.
pub fn execute_uninstall(options: &GlobalOptions, name: &str) -> Result<()> {
    let env = Environment::load()?;
    let path = env.layout()?.sketchbook.join("libraries").join(name);
    if !path.exists() {
        bail!("Library '{}' is not installed", name);
    }

    let sink = Arc::new(ConsoleSink::new("Removing...", options.quiet || options.json));
    let installer = env.installer(sink.clone())?;
    installer.uninstall_library(name, &path)?;
    sink.finish();

    if !options.quiet {
        println!("{} Removed {name}", status::SUCCESS);
    }
    Ok(())
}
