//! Verify and upload pipeline
//!
//! Every call runs the same stages:
//!
//! 1. Resolve the board (a missing board is a configuration error).
//! 2. Check the project root and locate the entry sketch.
//! 3. For uploads, require a port and pause the hotplug listener.
//! 4. Run the configured [`Strategy`].
//! 5. Report the outcome to the output sink.
//!
//! Errors in stages 1-3 return before anything is spawned. Calls on one
//! orchestrator are serialized, so a second request waits for the first.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::board::BoardDescriptor;
use super::context::DeviceContext;
use super::negotiator::{NegotiatorTiming, PortBehavior, SerialPortNegotiator};
use super::platform::PlatformResolver;
use super::properties::PropertySet;
use super::session::{HotplugListener, HotplugPause, NoHotplug, NoMonitor, SerialMonitor};
use super::settings::{Settings, Strategy, ToolchainLayout};
use super::sink::{OutputSink, StdoutSink};
use super::sketch::{FirstSketchLocator, SketchLocator};
use crate::config::defaults::{BOARDS_FILE, DEFAULT_BUILD_DIR, PLATFORM_FILE};
use crate::error::{ConfigError, ResolutionError, SketchctlError};
use crate::infra::dirs::SketchctlDirs;
use crate::infra::filesystem;
use crate::infra::process::{ProcessSpawner, SpawnOptions};
use crate::infra::serial::{DeviceEnumerator, PortToucher};

/// Property holding the upload command template
pub const UPLOAD_PATTERN_KEY: &str = "upload.pattern";

/// Property naming the upload tool
pub const UPLOAD_TOOL_KEY: &str = "upload.tool";

/// Operation requested by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Compile only
    Verify,
    /// Compile and flash the board
    Upload,
}

impl Operation {
    /// Lowercase name, as used in `commands.<name>`
    pub fn name(self) -> &'static str {
        match self {
            Self::Verify => "verify",
            Self::Upload => "upload",
        }
    }

    fn ide_flag(self) -> &'static str {
        match self {
            Self::Verify => "--verify",
            Self::Upload => "--upload",
        }
    }

    fn progress(self) -> &'static str {
        match self {
            Self::Verify => "Verifying",
            Self::Upload => "Uploading",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a strategy needs for one call
struct Invocation<'a> {
    operation: Operation,
    project_root: &'a Path,
    board: BoardDescriptor,
    /// Absolute path of the entry sketch
    sketch: PathBuf,
    port: Option<String>,
    output: Option<PathBuf>,
    settings: &'a Settings,
}

impl Invocation<'_> {
    fn port(&self) -> Result<&str, ConfigError> {
        self.port.as_deref().ok_or(ConfigError::NoPortSelected)
    }

    fn build_dir(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.project_root.join(DEFAULT_BUILD_DIR))
    }
}

/// Drives verify and upload for a project
pub struct SketchOrchestrator {
    spawner: Arc<dyn ProcessSpawner>,
    negotiator: SerialPortNegotiator,
    monitor: Arc<dyn SerialMonitor>,
    hotplug: Arc<dyn HotplugListener>,
    locator: Arc<dyn SketchLocator>,
    sink: Arc<dyn OutputSink>,
    dirs: SketchctlDirs,
    busy: Mutex<()>,
}

impl SketchOrchestrator {
    /// Create an orchestrator with no monitor or hotplug listener attached
    pub fn new(
        spawner: Arc<dyn ProcessSpawner>,
        enumerator: Arc<dyn DeviceEnumerator>,
        toucher: Arc<dyn PortToucher>,
    ) -> Self {
        Self {
            spawner,
            negotiator: SerialPortNegotiator::new(enumerator, toucher),
            monitor: Arc::new(NoMonitor),
            hotplug: Arc::new(NoHotplug),
            locator: Arc::new(FirstSketchLocator::default()),
            sink: Arc::new(StdoutSink),
            dirs: SketchctlDirs::new(),
            busy: Mutex::new(()),
        }
    }

    /// Attach the serial monitor closed around uploads
    #[must_use]
    pub fn with_monitor(mut self, monitor: Arc<dyn SerialMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Attach the hotplug listener paused during uploads
    #[must_use]
    pub fn with_hotplug(mut self, hotplug: Arc<dyn HotplugListener>) -> Self {
        self.hotplug = hotplug;
        self
    }

    /// Use a custom sketch locator
    #[must_use]
    pub fn with_locator(mut self, locator: Arc<dyn SketchLocator>) -> Self {
        self.locator = locator;
        self
    }

    /// Send status and toolchain output to `sink`
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Use custom port negotiation timings
    #[must_use]
    pub fn with_timing(mut self, timing: NegotiatorTiming) -> Self {
        self.negotiator = self.negotiator.with_timing(timing);
        self
    }

    /// Use custom directories for toolchain defaults
    #[must_use]
    pub fn with_dirs(mut self, dirs: SketchctlDirs) -> Self {
        self.dirs = dirs;
        self
    }

    /// Compile the sketch
    ///
    /// `output_override` replaces the context's output directory for this
    /// call; relative paths are resolved against `project_root`.
    pub async fn verify(
        &self,
        project_root: &Path,
        context: &mut DeviceContext,
        settings: &Settings,
        output_override: Option<&Path>,
    ) -> Result<(), SketchctlError> {
        let _busy = self.busy.lock().await;

        let board = context
            .resolved_board()
            .ok_or(ConfigError::NoBoardSelected)?;
        let sketch = self.resolve_sketch(project_root, context)?;
        let output = output_override
            .map(|dir| project_root.join(dir))
            .or_else(|| context.output_dir(project_root));

        let invocation = Invocation {
            operation: Operation::Verify,
            project_root,
            board,
            sketch: project_root.join(sketch),
            port: context.port.clone(),
            output,
            settings,
        };
        self.execute(&invocation).await
    }

    /// Compile and flash the sketch to the board on the context's port
    pub async fn upload(
        &self,
        project_root: &Path,
        context: &mut DeviceContext,
        settings: &Settings,
    ) -> Result<(), SketchctlError> {
        let _busy = self.busy.lock().await;

        let board = context
            .resolved_board()
            .ok_or(ConfigError::NoBoardSelected)?;
        let sketch = self.resolve_sketch(project_root, context)?;
        let port = context.port.clone().ok_or(ConfigError::NoPortSelected)?;

        // Resumed when dropped, whatever the outcome
        let _pause = HotplugPause::new(Arc::clone(&self.hotplug));

        let invocation = Invocation {
            operation: Operation::Upload,
            project_root,
            board,
            sketch: project_root.join(sketch),
            port: Some(port),
            output: context.output_dir(project_root),
            settings,
        };
        self.execute(&invocation).await
    }

    /// Relative path of the entry sketch, located and persisted if needed
    fn resolve_sketch(
        &self,
        project_root: &Path,
        context: &mut DeviceContext,
    ) -> Result<PathBuf, SketchctlError> {
        if !project_root.is_dir() {
            return Err(ConfigError::NoProjectRoot {
                path: project_root.to_path_buf(),
            }
            .into());
        }

        if let Some(sketch) = &context.sketch {
            if project_root.join(sketch).is_file() {
                return Ok(sketch.clone());
            }
            tracing::warn!("Configured sketch {} not found, searching", sketch.display());
            self.sink
                .warning(&format!("Sketch '{}' not found", sketch.display()));
        }

        let found = self
            .locator
            .locate(project_root)
            .ok_or_else(|| ResolutionError::SketchNotFound {
                root: project_root.to_path_buf(),
            })?;
        tracing::info!("Using sketch {}", found.display());
        context.sketch = Some(found.clone());
        Ok(found)
    }

    async fn execute(&self, invocation: &Invocation<'_>) -> Result<(), SketchctlError> {
        let strategy = invocation.settings.strategy();
        tracing::debug!(
            "{} {} for {} with {}",
            invocation.operation.progress(),
            invocation.sketch.display(),
            invocation.board,
            strategy
        );

        let file_name = invocation
            .sketch
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let message = format!("{} sketch '{file_name}'", invocation.operation.progress());
        self.sink.start(&message);

        let result = match strategy {
            Strategy::DirectCommand => self.run_direct_command(invocation).await,
            Strategy::PatternDriven => self.run_pattern_driven(invocation).await,
            Strategy::FullIde => self.run_full_ide(invocation).await,
        };

        match &result {
            Ok(()) => self.sink.done(&message),
            Err(e) => {
                match e.exit_code() {
                    Some(code) => self.sink.error(&format!("Exit with code={code}")),
                    None => self.sink.error(&e.to_string()),
                }
                tracing::debug!("{} failed: {}", invocation.operation, e);
            }
        }
        result
    }

    async fn run_direct_command(&self, invocation: &Invocation<'_>) -> Result<(), SketchctlError> {
        let commands = &invocation.settings.commands;
        let command = match invocation.operation {
            Operation::Verify => commands.verify.as_deref(),
            Operation::Upload => commands.upload.as_deref(),
        }
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingCommand {
            operation: invocation.operation.name().to_string(),
        })?;
        let (program, args) = tokenize(command)?;

        let was_open = self.close_monitor().await;
        self.run(&program, &args, invocation.project_root).await?;
        self.reopen_monitor(was_open).await;
        Ok(())
    }

    async fn run_full_ide(&self, invocation: &Invocation<'_>) -> Result<(), SketchctlError> {
        let layout = invocation.settings.toolchain_layout(&self.dirs)?;
        let args = full_ide_args(invocation)?;

        if invocation.operation == Operation::Verify {
            self.run(&layout.executable, &args, invocation.project_root)
                .await?;
            return Ok(());
        }

        let was_open = self.close_monitor().await;
        self.run(&layout.executable, &args, invocation.project_root)
            .await?;
        self.reopen_monitor(was_open).await;
        Ok(())
    }

    async fn run_pattern_driven(&self, invocation: &Invocation<'_>) -> Result<(), SketchctlError> {
        let layout = invocation.settings.toolchain_layout(&self.dirs)?;
        let mut properties = resolve_properties(invocation, &layout)?;

        // Check the upload inputs before compiling
        let pattern = match invocation.operation {
            Operation::Verify => None,
            Operation::Upload => {
                invocation.port()?;
                Some(
                    properties
                        .get(UPLOAD_PATTERN_KEY)
                        .ok_or_else(|| ResolutionError::MissingProperty {
                            key: UPLOAD_PATTERN_KEY.to_string(),
                        })?
                        .to_string(),
                )
            }
        };

        let build_dir = invocation.build_dir();
        filesystem::create_dir_all(&build_dir)?;
        let args = builder_args(invocation, &layout, &build_dir);
        self.run(&layout.builder, &args, invocation.project_root)
            .await?;

        let Some(pattern) = pattern else {
            return Ok(());
        };
        let port = invocation.port()?;

        let was_open = self.close_monitor().await;
        let behavior = PortBehavior::from_properties(&properties);
        let negotiated = self.negotiator.negotiate(port, behavior).await?;
        let upload_port = negotiated.resolve(port).to_string();
        if upload_port != port {
            tracing::info!("Uploading to {} instead of {}", upload_port, port);
        }

        properties.set("serial.port", upload_port.as_str());
        properties.set(
            "serial.port.file",
            upload_port.strip_prefix("/dev/").unwrap_or(&upload_port),
        );

        let command = properties.expand(&pattern);
        tracing::debug!("Upload command: {}", command);
        let (program, args) = tokenize_recipe(&command)?;
        self.run(&program, &args, invocation.project_root).await?;

        if behavior.wait_for_port {
            self.negotiator.wait_after_upload(port).await;
        }
        self.reopen_monitor(was_open).await;
        Ok(())
    }

    async fn run(&self, program: &Path, args: &[String], cwd: &Path) -> Result<(), SketchctlError> {
        tracing::debug!("Running {} {}", program.display(), args.join(" "));
        self.spawner
            .spawn(
                program,
                Some(self.sink.as_ref()),
                args,
                &SpawnOptions::in_dir(cwd),
            )
            .await?;
        Ok(())
    }

    /// Close the monitor, returning whether it was open
    async fn close_monitor(&self) -> bool {
        if self.monitor.is_open().await {
            tracing::debug!("Closing serial monitor");
            self.monitor.close().await;
            true
        } else {
            false
        }
    }

    async fn reopen_monitor(&self, was_open: bool) {
        if was_open {
            tracing::debug!("Reopening serial monitor");
            self.monitor.open().await;
        }
    }
}

impl fmt::Debug for SketchOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SketchOrchestrator")
            .field("negotiator", &self.negotiator)
            .field("dirs", &self.dirs)
            .finish_non_exhaustive()
    }
}

/// Split a direct command line into program and arguments
///
/// Quoted arguments keep their embedded whitespace. Backslashes are path
/// separators on Windows, so there only quotes are special.
pub fn tokenize(command: &str) -> Result<(PathBuf, Vec<String>), ResolutionError> {
    #[cfg(windows)]
    let tokens = split_quoted(command);
    #[cfg(not(windows))]
    let tokens = shlex::split(command);
    program_and_args(command, tokens)
}

/// Split an expanded upload recipe into program and arguments
///
/// Placeholder values may hold several flags (`-v -v`) or Windows paths,
/// so the expanded line is split on whitespace outside quotes and
/// backslashes are kept as written.
pub fn tokenize_recipe(command: &str) -> Result<(PathBuf, Vec<String>), ResolutionError> {
    program_and_args(command, split_quoted(command))
}

fn program_and_args(
    command: &str,
    tokens: Option<Vec<String>>,
) -> Result<(PathBuf, Vec<String>), ResolutionError> {
    let empty = || ResolutionError::EmptyCommand {
        command: command.to_string(),
    };
    let mut tokens = tokens.ok_or_else(empty)?;
    if tokens.is_empty() {
        return Err(empty());
    }
    let program = PathBuf::from(tokens.remove(0));
    Ok((program, tokens))
}

/// Whitespace split honoring `"` and `'`; `None` when a quote is unclosed
fn split_quoted(command: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote = None;

    for c in command.chars() {
        match quote {
            Some(open) if c == open => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if quote.is_some() {
        return None;
    }
    if in_token {
        tokens.push(current);
    }
    Some(tokens)
}

fn full_ide_args(invocation: &Invocation<'_>) -> Result<Vec<String>, ConfigError> {
    let mut args = vec![
        invocation.operation.ide_flag().to_string(),
        "--board".to_string(),
        invocation.board.build_configuration(),
    ];
    if invocation.operation == Operation::Upload {
        args.push("--port".to_string());
        args.push(invocation.port()?.to_string());
    }
    if invocation.settings.is_verbose() {
        args.push("--verbose".to_string());
    }
    if let Some(output) = &invocation.output {
        args.push("--pref".to_string());
        args.push(format!("build.path={}", output.display()));
    }
    args.push(invocation.sketch.display().to_string());
    Ok(args)
}

fn builder_args(invocation: &Invocation<'_>, layout: &ToolchainLayout, build_dir: &Path) -> Vec<String> {
    let ide = &layout.resources_path;
    let mut args = vec!["-compile".to_string(), "-logger=human".to_string()];

    for hardware in [ide.join("hardware"), layout.user_packages_root.join("packages")] {
        args.push("-hardware".to_string());
        args.push(hardware.display().to_string());
    }
    for tools in [
        ide.join("tools-builder"),
        ide.join("hardware").join("tools").join("avr"),
        layout.user_packages_root.join("packages"),
    ] {
        args.push("-tools".to_string());
        args.push(tools.display().to_string());
    }
    args.push("-built-in-libraries".to_string());
    args.push(ide.join("libraries").display().to_string());
    args.push("-libraries".to_string());
    args.push(layout.sketchbook.join("libraries").display().to_string());

    args.push("-fqbn".to_string());
    args.push(invocation.board.build_configuration());
    args.push("-build-path".to_string());
    args.push(build_dir.display().to_string());

    for (key, value) in &invocation.settings.properties {
        args.push("-prefs".to_string());
        args.push(format!("{key}={value}"));
    }
    if invocation.settings.is_verbose() {
        args.push("-verbose".to_string());
    }
    args.push(invocation.sketch.display().to_string());
    args
}

/// Merge the property layers for a pattern-driven call
///
/// Later layers win: installed tool paths, `platform.txt`, the board's
/// `boards.txt` entries, selected menu options, the upload tool's
/// settings, then user overrides. Runtime values are injected last.
fn resolve_properties(
    invocation: &Invocation<'_>,
    layout: &ToolchainLayout,
) -> Result<PropertySet, SketchctlError> {
    let board = &invocation.board;
    let resolver = PlatformResolver::new(&layout.builtin_packages_root, &layout.user_packages_root);
    let platform_path = resolver
        .resolve_platform_path(board)?
        .ok_or_else(|| ResolutionError::PlatformNotFound {
            package: board.package.clone(),
            architecture: board.architecture.clone(),
        })?;

    let mut properties: PropertySet = resolver.tool_properties()?.into_iter().collect();
    properties.merge(&PropertySet::load_file(&platform_path.join(PLATFORM_FILE))?);

    let boards = PropertySet::load_file(&platform_path.join(BOARDS_FILE))?;
    let board_layer = boards.extract_with_prefix(&board.board_id);
    properties.merge(&board_layer);
    for (option, value) in &board.options {
        properties.merge(&board_layer.extract_with_prefix(&format!("menu.{option}.{value}")));
    }

    if let Some(tool) = properties.get(UPLOAD_TOOL_KEY).map(str::to_string) {
        let tool_layer = properties.extract_with_prefix(&format!("tools.{tool}"));
        properties.merge(&tool_layer);
    }
    properties.merge(&invocation.settings.user_properties());

    let project_name = invocation
        .sketch
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let verbose_key = if invocation.settings.is_verbose() {
        "upload.params.verbose"
    } else {
        "upload.params.quiet"
    };
    let upload_verbose = properties.get(verbose_key).unwrap_or_default().to_string();

    properties.set("runtime.ide.path", layout.resources_path.display().to_string());
    properties.set("runtime.platform.path", platform_path.display().to_string());
    properties.set("build.path", invocation.build_dir().display().to_string());
    properties.set("build.project_name", project_name);
    properties.set("build.arch", board.architecture.to_uppercase());
    properties.set("upload.verbose", upload_verbose);
    if let Some(port) = &invocation.port {
        properties.set("serial.port", port.as_str());
    }

    Ok(properties)
}
