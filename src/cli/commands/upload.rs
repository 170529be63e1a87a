//! CLI implementation for `sketchctl upload`

use anyhow::Result;
use std::sync::Arc;

use super::{load_context, Environment};
use crate::cli::output::{status, ConsoleSink};
use crate::cli::GlobalOptions;

/// Execute the upload command
pub async fn execute(options: &GlobalOptions) -> Result<()> {
    let env = Environment::load()?;
    let mut context = load_context(options)?;

    let sink = Arc::new(ConsoleSink::new("Uploading...", options.quiet || options.json));
    let orchestrator = env.orchestrator(sink.clone());
    orchestrator
        .upload(&options.project_root, &mut context, &env.settings)
        .await?;
    sink.finish();

    if !options.quiet {
        println!(
            "{} Uploaded to {}",
            status::SUCCESS,
            context.port.as_deref().unwrap_or_default()
        );
    }
    Ok(())
}
