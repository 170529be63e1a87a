//! Serial port reset and rediscovery
//!
//! Boards with a native USB bootloader reset when their port is opened at
//! 1200 baud and come back, often under a different identifier. Before an
//! upload the negotiator performs that reset and waits for the board to
//! reappear:
//!
//! ```text
//! Idle ──touch──> Resetting ──wait──> AwaitingReappearance ──> Ready
//!   └──────────────── no touch ──────────────────────────────> Ready
//! ```
//!
//! Every wait is a tokio sleep, so the host stays responsive during the
//! multi-second handshake.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use super::properties::PropertySet;
use crate::config::defaults;
use crate::error::SerialError;
use crate::infra::serial::{DeviceEnumerator, PortToucher};

/// Property enabling the 1200 bps touch reset
pub const USE_TOUCH_KEY: &str = "upload.use_1200bps_touch";

/// Property enabling the wait for the upload port
pub const WAIT_FOR_PORT_KEY: &str = "upload.wait_for_upload_port";

/// Delays and timeouts of the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatorTiming {
    /// Baud rate used for the touch
    pub touch_baud_rate: u32,
    /// Delay after the touch
    pub settle: Duration,
    /// Interval between enumerations
    pub poll_interval: Duration,
    /// Give up waiting for a new port after this long
    pub timeout: Duration,
    /// Accept the original port again after this long
    pub original_grace: Duration,
    /// Delay after a port is found
    pub enumeration_settle: Duration,
    /// Unconditional delay after an upload
    pub post_upload_delay: Duration,
    /// Polling window after an upload
    pub post_upload_poll: Duration,
}

impl Default for NegotiatorTiming {
    fn default() -> Self {
        Self {
            touch_baud_rate: defaults::TOUCH_BAUD_RATE,
            settle: defaults::TOUCH_SETTLE,
            poll_interval: defaults::PORT_POLL_INTERVAL,
            timeout: defaults::PORT_WAIT_TIMEOUT,
            original_grace: defaults::ORIGINAL_PORT_GRACE,
            enumeration_settle: defaults::PORT_ENUMERATION_SETTLE,
            post_upload_delay: defaults::POST_UPLOAD_DELAY,
            post_upload_poll: defaults::POST_UPLOAD_POLL,
        }
    }
}

/// Which parts of the handshake a board needs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortBehavior {
    /// Reset the board with a 1200 bps touch
    pub use_touch: bool,
    /// Wait for the board's port to reappear after the reset
    pub wait_for_port: bool,
}

impl PortBehavior {
    /// Read the behavior from resolved board properties
    pub fn from_properties(properties: &PropertySet) -> Self {
        Self {
            use_touch: properties.is_true(USE_TOUCH_KEY),
            wait_for_port: properties.is_true(WAIT_FOR_PORT_KEY),
        }
    }
}

/// Outcome of a negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiatedPort {
    /// The board was found on this port after the reset
    Discovered(String),
    /// No port was discovered; the configured port is used unmodified
    Original,
}

impl NegotiatedPort {
    /// The port to upload to
    pub fn resolve<'a>(&'a self, original: &'a str) -> &'a str {
        match self {
            Self::Discovered(port) => port,
            Self::Original => original,
        }
    }
}

/// Stages the serial device for an upload
pub struct SerialPortNegotiator {
    enumerator: Arc<dyn DeviceEnumerator>,
    toucher: Arc<dyn PortToucher>,
    timing: NegotiatorTiming,
}

impl SerialPortNegotiator {
    /// Create a negotiator with default timings
    pub fn new(enumerator: Arc<dyn DeviceEnumerator>, toucher: Arc<dyn PortToucher>) -> Self {
        Self {
            enumerator,
            toucher,
            timing: NegotiatorTiming::default(),
        }
    }

    /// Use custom timings
    #[must_use]
    pub fn with_timing(mut self, timing: NegotiatorTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Run the reset/wait handshake for `port`
    ///
    /// Without a touch nothing is enumerated and the port is used as is.
    pub async fn negotiate(
        &self,
        port: &str,
        behavior: PortBehavior,
    ) -> Result<NegotiatedPort, SerialError> {
        if !behavior.use_touch {
            tracing::debug!("Touch disabled, using {} as is", port);
            return Ok(NegotiatedPort::Original);
        }

        let before = self.reset(port).await?;
        if !behavior.wait_for_port {
            return Ok(NegotiatedPort::Original);
        }

        self.await_reappearance(port, &before).await
    }

    /// Snapshot devices, touch `port` if present, then settle
    async fn reset(&self, port: &str) -> Result<HashSet<String>, SerialError> {
        let before = self.snapshot().await?;
        tracing::debug!("Resetting {} ({} devices present)", port, before.len());

        if before.contains(port) {
            if let Err(e) = self.toucher.touch(port, self.timing.touch_baud_rate).await {
                tracing::warn!("Touch reset of {} failed: {}", port, e);
            }
        } else {
            tracing::debug!("{} not present, skipping touch", port);
        }

        sleep(self.timing.settle).await;
        Ok(before)
    }

    /// Poll until a new device appears or the timeout elapses
    async fn await_reappearance(
        &self,
        port: &str,
        before: &HashSet<String>,
    ) -> Result<NegotiatedPort, SerialError> {
        let start = Instant::now();

        loop {
            let elapsed = start.elapsed();
            if elapsed >= self.timing.timeout {
                break;
            }

            let now = self.enumerator.list_serial_devices().await?;
            let appeared = now
                .iter()
                .map(|d| d.identifier.as_str())
                .find(|id| !before.contains(*id));

            if let Some(found) = appeared {
                tracing::info!("Board reappeared on {}", found);
                sleep(self.timing.enumeration_settle).await;
                return Ok(NegotiatedPort::Discovered(found.to_string()));
            }

            // Some boards come back on the same identifier after the settle
            // window. This can also hide a reset that never happened.
            if elapsed >= self.timing.original_grace && now.iter().any(|d| d.identifier == port) {
                tracing::info!("Board reappeared on original port {}", port);
                sleep(self.timing.enumeration_settle).await;
                return Ok(NegotiatedPort::Discovered(port.to_string()));
            }

            sleep(self.timing.poll_interval).await;
        }

        tracing::warn!(
            "No new port appeared within {:?}, using {}",
            self.timing.timeout,
            port
        );
        Ok(NegotiatedPort::Original)
    }

    /// Give a rebooting board time to come back after an upload
    ///
    /// Enumeration failures are logged; this never fails the upload.
    pub async fn wait_after_upload(&self, port: &str) {
        sleep(self.timing.post_upload_delay).await;

        let start = Instant::now();
        while start.elapsed() < self.timing.post_upload_poll {
            match self.snapshot().await {
                Ok(devices) if devices.contains(port) => return,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Could not enumerate serial devices: {}", e);
                    return;
                }
            }
            sleep(self.timing.poll_interval).await;
        }
        tracing::debug!("{} did not reappear after upload", port);
    }

    async fn snapshot(&self) -> Result<HashSet<String>, SerialError> {
        Ok(self
            .enumerator
            .list_serial_devices()
            .await?
            .into_iter()
            .map(|d| d.identifier)
            .collect())
    }
}

impl std::fmt::Debug for SerialPortNegotiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPortNegotiator")
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::serial::SerialDevice;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns scripted snapshots in order, repeating the last one
    struct ScriptedEnumerator {
        snapshots: Mutex<Vec<Vec<&'static str>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedEnumerator {
        fn new(snapshots: Vec<Vec<&'static str>>) -> Arc<Self> {
            Arc::new(Self {
                snapshots: Mutex::new(snapshots),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl DeviceEnumerator for ScriptedEnumerator {
        async fn list_serial_devices(&self) -> Result<Vec<SerialDevice>, SerialError> {
            *self.calls.lock().unwrap() += 1;
            let mut snapshots = self.snapshots.lock().unwrap();
            let current = if snapshots.len() > 1 {
                snapshots.remove(0)
            } else {
                snapshots[0].clone()
            };
            Ok(current.into_iter().map(SerialDevice::new).collect())
        }
    }

    #[derive(Default)]
    struct RecordingToucher {
        touched: Mutex<Vec<(String, u32)>>,
        fail: bool,
    }

    #[async_trait]
    impl PortToucher for RecordingToucher {
        async fn touch(&self, port: &str, baud_rate: u32) -> Result<(), SerialError> {
            self.touched.lock().unwrap().push((port.to_string(), baud_rate));
            if self.fail {
                return Err(SerialError::Open {
                    port: port.to_string(),
                    error: "busy".to_string(),
                });
            }
            Ok(())
        }
    }

    const TOUCH_AND_WAIT: PortBehavior = PortBehavior {
        use_touch: true,
        wait_for_port: true,
    };

    #[tokio::test(start_paused = true)]
    async fn test_new_port_is_discovered() {
        let enumerator = ScriptedEnumerator::new(vec![vec!["A"], vec!["B"]]);
        let toucher = Arc::new(RecordingToucher::default());
        let negotiator = SerialPortNegotiator::new(enumerator, toucher.clone());

        let port = negotiator.negotiate("A", TOUCH_AND_WAIT).await.unwrap();

        assert_eq!(port, NegotiatedPort::Discovered("B".to_string()));
        assert_eq!(*toucher.touched.lock().unwrap(), vec![("A".to_string(), 1200)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_original_port_accepted_after_grace() {
        let enumerator = ScriptedEnumerator::new(vec![vec!["A"]]);
        let negotiator =
            SerialPortNegotiator::new(enumerator, Arc::new(RecordingToucher::default()));

        let start = Instant::now();
        let port = negotiator.negotiate("A", TOUCH_AND_WAIT).await.unwrap();

        assert_eq!(port, NegotiatedPort::Discovered("A".to_string()));
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back_to_original() {
        let enumerator = ScriptedEnumerator::new(vec![vec!["A"]]);
        let toucher = Arc::new(RecordingToucher::default());
        let negotiator = SerialPortNegotiator::new(enumerator, toucher.clone());

        let start = Instant::now();
        let port = negotiator.negotiate("X", TOUCH_AND_WAIT).await.unwrap();

        assert_eq!(port, NegotiatedPort::Original);
        assert_eq!(port.resolve("X"), "X");
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert!(toucher.touched.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_disabled_never_enumerates() {
        let enumerator = ScriptedEnumerator::new(vec![vec!["A"]]);
        let negotiator =
            SerialPortNegotiator::new(enumerator.clone(), Arc::new(RecordingToucher::default()));

        let port = negotiator
            .negotiate("A", PortBehavior::default())
            .await
            .unwrap();

        assert_eq!(port, NegotiatedPort::Original);
        assert_eq!(enumerator.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_without_wait_settles_and_keeps_port() {
        let enumerator = ScriptedEnumerator::new(vec![vec!["A"]]);
        let toucher = Arc::new(RecordingToucher::default());
        let negotiator = SerialPortNegotiator::new(enumerator.clone(), toucher.clone());

        let start = Instant::now();
        let port = negotiator
            .negotiate(
                "A",
                PortBehavior {
                    use_touch: true,
                    wait_for_port: false,
                },
            )
            .await
            .unwrap();

        assert_eq!(port, NegotiatedPort::Original);
        assert_eq!(enumerator.calls(), 1);
        assert_eq!(toucher.touched.lock().unwrap().len(), 1);
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_touch_does_not_abort() {
        let enumerator = ScriptedEnumerator::new(vec![vec!["A"], vec!["A"], vec!["B"]]);
        let toucher = Arc::new(RecordingToucher {
            fail: true,
            ..Default::default()
        });
        let negotiator = SerialPortNegotiator::new(enumerator, toucher);

        let port = negotiator.negotiate("A", TOUCH_AND_WAIT).await.unwrap();
        assert_eq!(port, NegotiatedPort::Discovered("B".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_after_upload_returns_when_port_present() {
        let enumerator = ScriptedEnumerator::new(vec![vec![], vec!["A"]]);
        let negotiator =
            SerialPortNegotiator::new(enumerator.clone(), Arc::new(RecordingToucher::default()));

        let start = Instant::now();
        negotiator.wait_after_upload("A").await;

        assert_eq!(enumerator.calls(), 2);
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_after_upload_is_bounded() {
        let enumerator = ScriptedEnumerator::new(vec![vec![]]);
        let negotiator =
            SerialPortNegotiator::new(enumerator, Arc::new(RecordingToucher::default()));

        let start = Instant::now();
        negotiator.wait_after_upload("A").await;
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_behavior_from_properties() {
        let props: PropertySet = [(USE_TOUCH_KEY, "true"), (WAIT_FOR_PORT_KEY, "true")]
            .into_iter()
            .collect();
        assert_eq!(PortBehavior::from_properties(&props), TOUCH_AND_WAIT);
        assert_eq!(
            PortBehavior::from_properties(&PropertySet::new()),
            PortBehavior::default()
        );
    }
}
