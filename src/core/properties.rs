//! Layered property sets
//!
//! Parses the toolchain's flat `key=value` files (`platform.txt`,
//! `boards.txt`, tool overrides) and resolves them into a single set.
//! Layers are merged last-wins; board-specific keys are scoped out of the
//! shared namespace with [`PropertySet::extract_with_prefix`].

use regex::Regex;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::OnceLock;

use crate::config::defaults::MAX_EXPANSION_DEPTH;
use crate::error::FilesystemError;

/// One configuration layer: dotted keys mapped to string values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySet {
    entries: BTreeMap<String, String>,
}

impl PropertySet {
    /// Create an empty property set
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a property file
    ///
    /// A missing file yields an empty set, since platforms may legitimately
    /// omit any of their property files.
    pub fn load_file(path: &Path) -> Result<Self, FilesystemError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Property file {} not found, using empty set", path.display());
                Ok(Self::new())
            }
            Err(e) => Err(FilesystemError::ReadFile {
                path: path.to_path_buf(),
                error: e.to_string(),
            }),
        }
    }

    /// Parse property text
    ///
    /// Blank lines, `#` comments and lines without `=` are skipped. Only the
    /// first `=` separates key from value.
    pub fn parse(content: &str) -> Self {
        let mut set = Self::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                set.set(key.trim(), value.trim());
            }
        }
        set
    }

    /// Get a value, `None` when the key is absent
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Insert or overwrite a value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Whether the key is set to `true`
    pub fn is_true(&self, key: &str) -> bool {
        self.get(key) == Some("true")
    }

    /// Apply `other` on top of this set; its values win for shared keys
    pub fn merge(&mut self, other: &PropertySet) {
        for (key, value) in &other.entries {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    /// Keys under `prefix.` with the prefix stripped; all others dropped
    pub fn extract_with_prefix(&self, prefix: &str) -> PropertySet {
        let scope = format!("{prefix}.");
        let entries = self
            .entries
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(&scope)
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (rest.to_string(), value.clone()))
            })
            .collect();
        PropertySet { entries }
    }

    /// Replace `{key}` placeholders with values from this set
    ///
    /// Values may themselves contain placeholders, so expansion repeats until
    /// nothing changes or the depth limit is reached. Unknown placeholders
    /// are left as they are.
    pub fn expand(&self, template: &str) -> String {
        let mut current = template.to_string();
        for _ in 0..MAX_EXPANSION_DEPTH {
            let next = self.expand_once(&current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    fn expand_once(&self, input: &str) -> String {
        let re = placeholder_regex();
        let mut last_end = 0;
        let mut output = String::with_capacity(input.len());

        for cap in re.captures_iter(input) {
            let Some(full_match) = cap.get(0) else {
                continue;
            };
            output.push_str(&input[last_end..full_match.start()]);
            match self.get(&cap[1]) {
                Some(value) => output.push_str(value),
                None => output.push_str(full_match.as_str()),
            }
            last_end = full_match.end();
        }

        output.push_str(&input[last_end..]);
        output
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set has no keys
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertySet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (key, value) in iter {
            set.set(key, value);
        }
        set
    }
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([A-Za-z0-9_.\-]+)\}").expect("Invalid placeholder regex"))
}
