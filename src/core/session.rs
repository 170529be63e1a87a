//! Host session collaborators
//!
//! The serial monitor and the device hotplug listener belong to the host.
//! Uploads close the monitor so the programmer can own the port, and pause
//! the hotplug listener so the toolchain's own port resets do not produce
//! spurious notifications.

use async_trait::async_trait;
use std::sync::Arc;

/// A serial monitor the host may have open on the upload port
#[async_trait]
pub trait SerialMonitor: Send + Sync {
    /// Whether the monitor currently holds a port
    async fn is_open(&self) -> bool;

    /// Close the monitor
    async fn close(&self);

    /// Reopen the monitor on its last port
    async fn open(&self);
}

/// Listener for serial devices appearing and disappearing
pub trait HotplugListener: Send + Sync {
    /// Stop delivering notifications
    fn pause(&self);

    /// Resume delivering notifications
    fn resume(&self);
}

/// Monitor for hosts without one
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMonitor;

#[async_trait]
impl SerialMonitor for NoMonitor {
    async fn is_open(&self) -> bool {
        false
    }

    async fn close(&self) {}

    async fn open(&self) {}
}

/// Hotplug listener for hosts without one
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHotplug;

impl HotplugListener for NoHotplug {
    fn pause(&self) {}

    fn resume(&self) {}
}

/// Keeps a hotplug listener paused while alive
///
/// The listener is resumed on drop, so every exit path of an upload
/// (success, error, unwinding) resumes it exactly once.
pub struct HotplugPause {
    listener: Arc<dyn HotplugListener>,
}

impl HotplugPause {
    /// Pause `listener` until the guard is dropped
    pub fn new(listener: Arc<dyn HotplugListener>) -> Self {
        listener.pause();
        tracing::debug!("Hotplug listener paused");
        Self { listener }
    }
}

impl Drop for HotplugPause {
    fn drop(&mut self) {
        self.listener.resume();
        tracing::debug!("Hotplug listener resumed");
    }
}

impl std::fmt::Debug for HotplugPause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotplugPause").finish_non_exhaustive()
    }
}
