//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests: a temporary
//! project builder and fake collaborators for the process spawner, serial
//! devices, serial monitor and hotplug listener.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use sketchctl::core::session::{HotplugListener, SerialMonitor};
use sketchctl::core::sink::OutputSink;
use sketchctl::error::{SerialError, ToolchainError};
use sketchctl::infra::process::{ProcessSpawner, SpawnOptions};
use sketchctl::infra::serial::{DeviceEnumerator, PortToucher, SerialDevice};

/// Test project context
///
/// Creates a temporary directory for test projects and provides
/// utilities for setting up test scenarios.
pub struct TestProject {
    /// Temporary directory for the test project
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test project in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Create a project with a single `blink.ino` sketch
    pub fn with_sketch() -> Self {
        let project = Self::new();
        project.create_file("blink.ino", SAMPLE_SKETCH);
        project
    }

    /// Get the path to the test project directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Create a file in the test project
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Create a directory in the test project
    pub fn create_dir(&self, name: &str) {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(path).expect("Failed to create directory");
    }

    /// Check if a file exists in the test project
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Read a file from the test project
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("Failed to read file")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// A fake toolchain installation with bundled and user-installed platforms
pub struct TestToolchain {
    /// Temporary directory holding the installation
    pub dir: TempDir,
}

impl TestToolchain {
    /// Create an empty toolchain layout
    pub fn new() -> Self {
        let toolchain = Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        };
        std::fs::create_dir_all(toolchain.ide_path().join("hardware"))
            .expect("Failed to create hardware directory");
        std::fs::create_dir_all(toolchain.packages_path()).expect("Failed to create packages directory");
        toolchain
    }

    /// Toolchain installation directory
    pub fn ide_path(&self) -> PathBuf {
        self.dir.path().join("ide")
    }

    /// User packages root
    pub fn packages_path(&self) -> PathBuf {
        self.dir.path().join("arduino15")
    }

    /// Sketchbook directory
    pub fn sketchbook_path(&self) -> PathBuf {
        self.dir.path().join("sketchbook")
    }

    /// Install a platform bundled with the toolchain
    pub fn add_builtin_platform(&self, package: &str, arch: &str, platform: &str, boards: &str) -> PathBuf {
        let dir = self.ide_path().join("hardware").join(package).join(arch);
        write_platform(&dir, platform, boards);
        dir
    }

    /// Install a platform into the user packages root
    pub fn add_user_platform(
        &self,
        package: &str,
        arch: &str,
        version: &str,
        platform: &str,
        boards: &str,
    ) -> PathBuf {
        let dir = self
            .packages_path()
            .join("packages")
            .join(package)
            .join("hardware")
            .join(arch)
            .join(version);
        write_platform(&dir, platform, boards);
        dir
    }

    /// Settings TOML pointing at this toolchain, followed by `extra`
    pub fn settings_toml(&self, strategy: &str, extra: &str) -> String {
        format!(
            "[toolchain]\nstrategy = \"{strategy}\"\nide_path = '{}'\npackages_path = '{}'\nsketchbook_path = '{}'\n{extra}",
            self.ide_path().display(),
            self.packages_path().display(),
            self.sketchbook_path().display(),
        )
    }
}

impl Default for TestToolchain {
    fn default() -> Self {
        Self::new()
    }
}

fn write_platform(dir: &Path, platform: &str, boards: &str) {
    std::fs::create_dir_all(dir).expect("Failed to create platform directory");
    std::fs::write(dir.join("platform.txt"), platform).expect("Failed to write platform.txt");
    std::fs::write(dir.join("boards.txt"), boards).expect("Failed to write boards.txt");
}

/// One recorded process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnCall {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

/// Spawner that records invocations and exits with scripted codes
///
/// Calls beyond the script exit 0.
#[derive(Default)]
pub struct RecordingSpawner {
    calls: Mutex<Vec<SpawnCall>>,
    exit_codes: Mutex<VecDeque<i32>>,
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl RecordingSpawner {
    /// Spawner whose processes all succeed
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Spawner whose processes exit with `codes` in order
    pub fn with_exit_codes(codes: &[i32]) -> Arc<Self> {
        Arc::new(Self {
            exit_codes: Mutex::new(codes.iter().copied().collect()),
            ..Self::default()
        })
    }

    /// Spawner whose processes take `delay` to run
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    /// Invocations so far
    pub fn calls(&self) -> Vec<SpawnCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of processes running at once
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessSpawner for RecordingSpawner {
    async fn spawn(
        &self,
        program: &Path,
        sink: Option<&dyn OutputSink>,
        args: &[String],
        options: &SpawnOptions,
    ) -> Result<(), ToolchainError> {
        self.calls.lock().unwrap().push(SpawnCall {
            program: program.to_path_buf(),
            args: args.to_vec(),
            cwd: options.cwd.clone(),
        });

        let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if let Some(sink) = sink {
            sink.line(&format!("{} {}", program.display(), args.join(" ")));
        }

        let code = self.exit_codes.lock().unwrap().pop_front().unwrap_or(0);
        if code == 0 {
            Ok(())
        } else {
            Err(ToolchainError::NonZeroExit {
                program: program.display().to_string(),
                code,
            })
        }
    }
}

/// Returns scripted device snapshots in order, repeating the last one
pub struct ScriptedEnumerator {
    snapshots: Mutex<Vec<Vec<&'static str>>>,
    calls: AtomicUsize,
}

impl ScriptedEnumerator {
    pub fn new(snapshots: Vec<Vec<&'static str>>) -> Arc<Self> {
        Arc::new(Self {
            snapshots: Mutex::new(snapshots),
            calls: AtomicUsize::new(0),
        })
    }

    /// Number of enumerations so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceEnumerator for ScriptedEnumerator {
    async fn list_serial_devices(&self) -> Result<Vec<SerialDevice>, SerialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut snapshots = self.snapshots.lock().unwrap();
        let current = if snapshots.len() > 1 {
            snapshots.remove(0)
        } else {
            snapshots.first().cloned().unwrap_or_default()
        };
        Ok(current.into_iter().map(SerialDevice::new).collect())
    }
}

/// Records every touch
#[derive(Default)]
pub struct RecordingToucher {
    touched: Mutex<Vec<(String, u32)>>,
}

impl RecordingToucher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn touched(&self) -> Vec<(String, u32)> {
        self.touched.lock().unwrap().clone()
    }
}

#[async_trait]
impl PortToucher for RecordingToucher {
    async fn touch(&self, port: &str, baud_rate: u32) -> Result<(), SerialError> {
        self.touched.lock().unwrap().push((port.to_string(), baud_rate));
        Ok(())
    }
}

/// Counts pause and resume calls
#[derive(Default)]
pub struct CountingHotplug {
    pauses: AtomicUsize,
    resumes: AtomicUsize,
}

impl CountingHotplug {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn resumes(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }
}

impl HotplugListener for CountingHotplug {
    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.resumes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Serial monitor that tracks open/close calls
#[derive(Default)]
pub struct FakeMonitor {
    open: AtomicBool,
    closes: AtomicUsize,
    opens: AtomicUsize,
}

impl FakeMonitor {
    /// A monitor that starts open
    pub fn opened() -> Arc<Self> {
        Arc::new(Self {
            open: AtomicBool::new(true),
            ..Self::default()
        })
    }

    pub fn is_currently_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SerialMonitor for FakeMonitor {
    async fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    async fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.opens.fetch_add(1, Ordering::SeqCst);
    }
}

/// Minimal sketch source
pub const SAMPLE_SKETCH: &str = r#"
void setup() {
  pinMode(LED_BUILTIN, OUTPUT);
}

void loop() {
  digitalWrite(LED_BUILTIN, HIGH);
  delay(1000);
  digitalWrite(LED_BUILTIN, LOW);
  delay(1000);
}
"#;

/// AVR-like platform.txt with an avrdude upload pattern
pub const SAMPLE_PLATFORM: &str = r#"
# AVR core
name=Test AVR Boards
version=1.8.3

tools.avrdude.cmd.path=/usr/bin/avrdude
tools.avrdude.upload.params.verbose=-v -v
tools.avrdude.upload.params.quiet=-q -q
tools.avrdude.upload.pattern="{cmd.path}" {upload.verbose} -p{build.mcu} -c{upload.protocol} -P{serial.port} -b{upload.speed} "-Uflash:w:{build.path}/{build.project_name}.hex:i"
"#;

/// boards.txt with a plain board, a menu-option board and a touch board
pub const SAMPLE_BOARDS: &str = r#"
uno.name=Arduino Uno
uno.upload.tool=avrdude
uno.upload.protocol=arduino
uno.upload.speed=115200
uno.build.mcu=atmega328p

nano.name=Arduino Nano
nano.upload.tool=avrdude
nano.upload.protocol=arduino
nano.menu.cpu.atmega328.upload.speed=115200
nano.menu.cpu.atmega328.build.mcu=atmega328p
nano.menu.cpu.atmega328old.upload.speed=57600
nano.menu.cpu.atmega328old.build.mcu=atmega328p

leonardo.name=Arduino Leonardo
leonardo.upload.tool=avrdude
leonardo.upload.protocol=avr109
leonardo.upload.speed=57600
leonardo.upload.use_1200bps_touch=true
leonardo.upload.wait_for_upload_port=true
leonardo.build.mcu=atmega32u4
"#;
