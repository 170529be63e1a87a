//! Serial device access
//!
//! Enumerates serial devices and performs the low-baud "touch" that makes
//! some bootloaders reset. `serialport` calls block, so they run on the
//! blocking pool.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::error::SerialError;

/// An enumerated serial device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SerialDevice {
    /// OS identifier (e.g., `/dev/ttyACM0`, `COM3`)
    pub identifier: String,
}

impl SerialDevice {
    /// Create a device from its identifier
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }
}

/// Lists the serial devices currently present
#[async_trait]
pub trait DeviceEnumerator: Send + Sync {
    /// Snapshot of present devices, in OS enumeration order
    async fn list_serial_devices(&self) -> Result<Vec<SerialDevice>, SerialError>;
}

/// Opens and closes a port at a given baud rate
#[async_trait]
pub trait PortToucher: Send + Sync {
    /// Open `port` at `baud_rate`, then close it
    async fn touch(&self, port: &str, baud_rate: u32) -> Result<(), SerialError>;
}

/// Enumeration and touch backed by the `serialport` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSerial;

#[async_trait]
impl DeviceEnumerator for SystemSerial {
    async fn list_serial_devices(&self) -> Result<Vec<SerialDevice>, SerialError> {
        let ports = tokio::task::spawn_blocking(serialport::available_ports)
            .await
            .map_err(|e| SerialError::Enumerate {
                error: e.to_string(),
            })?
            .map_err(|e| SerialError::Enumerate {
                error: e.to_string(),
            })?;

        Ok(ports
            .into_iter()
            .map(|info| SerialDevice::new(info.port_name))
            .collect())
    }
}

#[async_trait]
impl PortToucher for SystemSerial {
    async fn touch(&self, port: &str, baud_rate: u32) -> Result<(), SerialError> {
        let name = port.to_string();
        tokio::task::spawn_blocking(move || touch_blocking(&name, baud_rate))
            .await
            .map_err(|e| SerialError::Open {
                port: port.to_string(),
                error: e.to_string(),
            })?
    }
}

fn touch_blocking(port: &str, baud_rate: u32) -> Result<(), SerialError> {
    // The handle closes when dropped, including when DTR handling fails.
    let mut handle = serialport::new(port, baud_rate)
        .timeout(Duration::from_millis(500))
        .open()
        .map_err(|e| SerialError::Open {
            port: port.to_string(),
            error: e.to_string(),
        })?;

    if let Err(e) = handle.write_data_terminal_ready(false) {
        tracing::debug!("Could not clear DTR on {}: {}", port, e);
    }
    Ok(())
}
