//! CLI implementation for `sketchctl update-index`

use anyhow::{bail, Result};
use std::sync::Arc;

use super::Environment;
use crate::cli::output::{status, ConsoleSink};
use crate::cli::GlobalOptions;

/// Execute the update-index command
pub async fn execute(options: &GlobalOptions) -> Result<()> {
    let env = Environment::load()?;
    let sink = Arc::new(ConsoleSink::new("Updating index...", options.quiet || options.json));
    let installer = env.installer(sink.clone())?;

    let result = installer.update_index().await?;
    sink.finish();
    if !result.is_success() {
        bail!("Package index update {}", result);
    }

    if !options.quiet {
        println!("{} Package index updated", status::SUCCESS);
    }
    Ok(())
}
