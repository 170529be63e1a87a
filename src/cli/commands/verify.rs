//! CLI implementation for `sketchctl verify`

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use super::{load_context, Environment};
use crate::cli::output::{status, ConsoleSink};
use crate::cli::GlobalOptions;

/// Execute the verify command
pub async fn execute(options: &GlobalOptions, output: Option<&Path>) -> Result<()> {
    let env = Environment::load()?;
    let mut context = load_context(options)?;

    let sink = Arc::new(ConsoleSink::new("Compiling...", options.quiet || options.json));
    let orchestrator = env.orchestrator(sink.clone());
    orchestrator
        .verify(&options.project_root, &mut context, &env.settings, output)
        .await?;
    sink.finish();

    if !options.quiet {
        let sketch = context
            .sketch
            .as_deref()
            .map(|s| s.display().to_string())
            .unwrap_or_default();
        println!("{} Verified {sketch}", status::SUCCESS);
    }
    Ok(())
}
