//! CLI implementation for `sketchctl ports`

use anyhow::{Context, Result};

use crate::cli::output::status;
use crate::cli::GlobalOptions;
use crate::infra::serial::{DeviceEnumerator, SystemSerial};

/// Execute the ports command
pub async fn execute(options: &GlobalOptions) -> Result<()> {
    let devices = SystemSerial
        .list_serial_devices()
        .await
        .context("Failed to list serial ports")?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("{} No serial ports found", status::WARNING);
        return Ok(());
    }
    for device in &devices {
        println!("  {}", device.identifier);
    }
    Ok(())
}
