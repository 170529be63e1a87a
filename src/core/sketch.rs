//! Entry-sketch discovery

use std::path::{Path, PathBuf};

use crate::config::defaults::SKETCH_EXTENSION;

/// Finds the entry sketch of a project when none is configured
pub trait SketchLocator: Send + Sync {
    /// Sketch path relative to `project_root`, if one can be found
    fn locate(&self, project_root: &Path) -> Option<PathBuf>;
}

/// Picks the first `.ino` file under the project root
///
/// Files directly in the root win over nested ones; ties break by name.
#[derive(Debug, Clone, Copy)]
pub struct FirstSketchLocator {
    max_depth: usize,
}

impl FirstSketchLocator {
    /// Search at most `max_depth` directory levels
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }
}

impl Default for FirstSketchLocator {
    fn default() -> Self {
        Self::new(2)
    }
}

impl SketchLocator for FirstSketchLocator {
    fn locate(&self, project_root: &Path) -> Option<PathBuf> {
        walkdir::WalkDir::new(project_root)
            .min_depth(1)
            .max_depth(self.max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == SKETCH_EXTENSION))
            .min_by_key(|e| e.depth())
            .and_then(|e| e.path().strip_prefix(project_root).ok().map(Path::to_path_buf))
    }
}
