//! Output formatting and progress indicators
//!
//! Toolchain output is streamed above a spinner while a long operation
//! runs. Quiet mode hides both.

use indicatif::{ProgressBar, ProgressStyle};

use crate::core::sink::OutputSink;

/// Create a spinner for operations with unknown duration
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.blue} {msg}")
            .expect("Invalid spinner template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Output sink printing lines above a progress spinner
///
/// Without a terminal the spinner is hidden and lines go straight to stdout.
#[derive(Debug)]
pub struct ConsoleSink {
    bar: ProgressBar,
    quiet: bool,
}

impl ConsoleSink {
    /// Spinner showing `message`; `quiet` hides the spinner and all lines
    pub fn new(message: &str, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            create_spinner(message)
        };
        Self { bar, quiet }
    }

    /// Remove the spinner
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl OutputSink for ConsoleSink {
    fn line(&self, line: &str) {
        if self.quiet {
            return;
        }
        if self.bar.is_hidden() {
            println!("{line}");
        } else {
            self.bar.println(line);
        }
    }
}

impl Drop for ConsoleSink {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Print an error and its causes to stderr
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} {}", status::ERROR, error);
    for cause in error.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";
}
