use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use solsync::SyncContext;
use solsync_api::RecordKind;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name looked up in the project root when no `--config` is given
pub const CONFIG_FILE_NAME: &str = ".solsync.toml";

pub const TOKEN_ENV: &str = "SOLSYNC_TOKEN";
pub const SOLUTION_ID_ENV: &str = "SOLSYNC_SOLUTION_ID";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub project: ProjectSettings,
    /// Per-kind location overrides, relative to the project root
    #[serde(default)]
    pub locations: BTreeMap<String, PathBuf>,
    /// Additional record kinds
    #[serde(default)]
    pub kinds: Vec<CustomKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub solution_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSettings {
    #[serde(default = "default_bundles_dir")]
    pub bundles_dir: String,
    /// Highest priority first
    #[serde(default)]
    pub bundle_priority: Vec<String>,
    /// Relative paths are taken from the project root
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_diff_command")]
    pub diff_command: Vec<String>,
    #[serde(default)]
    pub default_kinds: Option<Vec<String>>,
    /// Exclude globs for static files
    #[serde(default)]
    pub files_ignoring: Option<Vec<String>>,
}

/// A record kind declared in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomKind {
    pub flag: char,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default = "default_true")]
    pub included_by_default: bool,
    #[serde(flatten)]
    pub record: RecordKind,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            solution_id: None,
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            bundles_dir: default_bundles_dir(),
            bundle_priority: Vec::new(),
            cache_dir: default_cache_dir(),
            diff_command: default_diff_command(),
            default_kinds: None,
            files_ignoring: None,
        }
    }
}

impl ProjectConfig {
    /// Read `path`; a missing file yields the defaults
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e).with_context(|| format!("Cannot read {}", path.display())),
        };

        let config: ProjectConfig =
            toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Environment values win over the file
    pub fn apply_env(&mut self) {
        self.apply_overrides(std::env::var(TOKEN_ENV).ok(), std::env::var(SOLUTION_ID_ENV).ok());
    }

    pub fn apply_overrides(&mut self, token: Option<String>, solution_id: Option<String>) {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.remote.token = Some(token);
        }
        if let Some(solution_id) = solution_id.filter(|s| !s.is_empty()) {
            self.remote.solution_id = Some(solution_id);
        }
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.remote.url).with_context(|| format!("Invalid remote url '{}'", self.remote.url))?;

        if self.project.diff_command.is_empty() {
            anyhow::bail!("project.diff_command cannot be empty");
        }

        for kind in &self.kinds {
            if !kind.flag.is_ascii_alphabetic() {
                anyhow::bail!("Kind '{}' needs a letter as its flag, got '{}'", kind.record.name, kind.flag);
            }
            if kind.record.synckey_fields.is_empty() {
                anyhow::bail!("Kind '{}' has no synckey_fields", kind.record.name);
            }
        }

        Ok(())
    }

    /// Engine context rooted at `project_root`
    pub fn context(&self, project_root: &Path) -> SyncContext {
        let mut ctx = SyncContext::new(project_root);
        ctx.bundles_dir = self.project.bundles_dir.clone();
        ctx.bundle_priority = self.project.bundle_priority.clone();
        ctx.cache_dir = project_root.join(&self.project.cache_dir);
        ctx.diff_command = self.project.diff_command.clone();
        ctx.default_kinds = self.project.default_kinds.clone();
        ctx
    }
}

// Default value functions
fn default_url() -> String { "http://localhost:8080".to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_bundles_dir() -> String { solsync::context::DEFAULT_BUNDLES_DIR.to_string() }
fn default_cache_dir() -> PathBuf { PathBuf::from(solsync::context::DEFAULT_CACHE_DIR) }
fn default_diff_command() -> Vec<String> { vec!["diff".to_string(), "-u".to_string()] }
fn default_true() -> bool { true }
