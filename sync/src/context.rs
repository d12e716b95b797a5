//! Per-invocation options and the project context passed to every engine call

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

/// Name of the bundle overlay directory under the project root
pub const DEFAULT_BUNDLES_DIR: &str = "bundles";

/// Directory holding content-change caches, relative to the project root
pub const DEFAULT_CACHE_DIR: &str = ".solsync";

/// Which side is authoritative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Local is authoritative: push to the remote
    #[default]
    Up,
    /// Remote is authoritative: pull into the project
    Down,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// Options for one sync or status invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Remove items missing on the authoritative side
    pub delete: bool,
    /// Create items missing on the target side
    pub create: bool,
    /// Update items that differ
    pub update: bool,
    /// Attach external diff output to modified items
    pub diff: bool,
    /// Log planned actions without performing them
    pub dry_run: bool,
    /// Authoritative side
    pub direction: Direction,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            delete: true,
            create: true,
            update: true,
            diff: false,
            dry_run: false,
            direction: Direction::Up,
        }
    }
}

impl SyncOptions {
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }
}

/// Project-level settings shared by every resource kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncContext {
    /// Absolute project directory
    pub project_root: PathBuf,
    /// Overlay directory name under the project root
    pub bundles_dir: String,
    /// Bundle names, highest priority first; unlisted bundles rank below, lexically
    pub bundle_priority: Vec<String>,
    /// Where per-kind cache files live
    pub cache_dir: PathBuf,
    /// External diff program and its leading arguments
    pub diff_command: Vec<String>,
    /// Kinds to sync when none are selected explicitly
    pub default_kinds: Option<Vec<String>>,
}

impl SyncContext {
    /// Context with default layout rooted at `project_root`
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        let cache_dir = project_root.join(DEFAULT_CACHE_DIR);
        Self {
            project_root,
            bundles_dir: DEFAULT_BUNDLES_DIR.to_string(),
            bundle_priority: Vec::new(),
            cache_dir,
            diff_command: vec!["diff".to_string(), "-u".to_string()],
            default_kinds: None,
        }
    }

    pub fn bundles_root(&self) -> PathBuf {
        self.project_root.join(&self.bundles_dir)
    }

    /// Absolute directory for a resource location inside the project
    pub fn location_root(&self, location: &Path) -> PathBuf {
        self.project_root.join(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_enable_all_actions() {
        let options = SyncOptions::default();
        assert!(options.delete && options.create && options.update);
        assert!(!options.diff);
        assert!(!options.dry_run);
        assert_eq!(options.direction, Direction::Up);
    }

    #[test]
    fn test_context_layout() {
        let ctx = SyncContext::new("/work/project");
        assert_eq!(ctx.bundles_root(), PathBuf::from("/work/project/bundles"));
        assert_eq!(ctx.cache_dir, PathBuf::from("/work/project/.solsync"));
        assert_eq!(ctx.location_root(Path::new("files")), PathBuf::from("/work/project/files"));
        assert_eq!(ctx.diff_command, vec!["diff", "-u"]);
    }
}
