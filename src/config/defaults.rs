//! Default configuration values

use std::time::Duration;

/// Project file holding the device context
pub const PROJECT_FILE: &str = "sketchctl.toml";

/// Global settings file name inside the config directory
pub const SETTINGS_FILE: &str = "config.toml";

/// Platform capabilities file
pub const PLATFORM_FILE: &str = "platform.txt";

/// Board definitions file
pub const BOARDS_FILE: &str = "boards.txt";

/// Package index file in the user packages root
pub const PACKAGE_INDEX_FILE: &str = "package_index.json";

/// Sketch file extension
pub const SKETCH_EXTENSION: &str = "ino";

/// Default build directory (relative to the project root) for pattern-driven builds
pub const DEFAULT_BUILD_DIR: &str = "build";

/// Baud rate that triggers a bootloader reset
pub const TOUCH_BAUD_RATE: u32 = 1200;

/// Settle delay after a touch reset
pub const TOUCH_SETTLE: Duration = Duration::from_millis(400);

/// Interval between serial device enumerations
pub const PORT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Maximum time to wait for the upload port to reappear
pub const PORT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Elapsed time after which the original port is accepted again
pub const ORIGINAL_PORT_GRACE: Duration = Duration::from_secs(5);

/// Delay after discovering a port, so the OS finishes enumerating it
pub const PORT_ENUMERATION_SETTLE: Duration = Duration::from_millis(250);

/// Unconditional wait after an upload before polling
pub const POST_UPLOAD_DELAY: Duration = Duration::from_secs(1);

/// Polling window after the post-upload delay
pub const POST_UPLOAD_POLL: Duration = Duration::from_secs(2);

/// Maximum `{key}` expansion passes over a pattern
pub const MAX_EXPANSION_DEPTH: usize = 10;
