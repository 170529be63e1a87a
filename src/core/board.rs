//! Board descriptor handling
//!
//! A board is selected by its build-configuration string:
//! `<package>:<architecture>:<board>` optionally followed by
//! `:<option>=<value>,...` menu selections.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Identifies a target board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardDescriptor {
    /// Platform package name (e.g., "arduino")
    pub package: String,

    /// Platform architecture (e.g., "avr")
    pub architecture: String,

    /// Board id inside `boards.txt` (e.g., "uno")
    pub board_id: String,

    /// Menu option selections as `(option, value)` pairs
    pub options: Vec<(String, String)>,
}

impl BoardDescriptor {
    /// Create a descriptor without menu options
    pub fn new(
        package: impl Into<String>,
        architecture: impl Into<String>,
        board_id: impl Into<String>,
    ) -> Self {
        Self {
            package: package.into(),
            architecture: architecture.into(),
            board_id: board_id.into(),
            options: Vec::new(),
        }
    }

    /// Add menu options parsed from a `key=value,key=value` string
    ///
    /// Later selections of the same option replace earlier ones.
    #[must_use]
    pub fn with_options(mut self, configuration: &str) -> Self {
        for (key, value) in parse_options(configuration) {
            if let Some(existing) = self.options.iter_mut().find(|(k, _)| *k == key) {
                existing.1 = value;
            } else {
                self.options.push((key, value));
            }
        }
        self
    }

    /// The build-configuration string passed to the toolchain
    pub fn build_configuration(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BoardDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.package, self.architecture, self.board_id)?;
        if !self.options.is_empty() {
            let options: Vec<String> = self
                .options
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            write!(f, ":{}", options.join(","))?;
        }
        Ok(())
    }
}

impl FromStr for BoardDescriptor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidBoard {
            value: s.to_string(),
        };

        let mut parts = s.trim().splitn(4, ':');
        let package = parts.next().filter(|p| !p.is_empty()).ok_or_else(invalid)?;
        let architecture = parts.next().filter(|p| !p.is_empty()).ok_or_else(invalid)?;
        let board_id = parts.next().filter(|p| !p.is_empty()).ok_or_else(invalid)?;

        let board = Self::new(package, architecture, board_id);
        Ok(match parts.next() {
            Some(options) => board.with_options(options),
            None => board,
        })
    }
}

fn parse_options(configuration: &str) -> Vec<(String, String)> {
    configuration
        .split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let (key, value) = (key.trim(), value.trim());
            (!key.is_empty() && !value.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}
