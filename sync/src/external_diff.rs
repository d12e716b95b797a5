//! Runs an external diff program over the remote and local content of an item

use std::io::Write;

use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::debug;

use crate::adapter::{item_key, ResourceAdapter};
use crate::error::{Result, SyncError};
use crate::item::Item;

/// Configured external diff command
#[derive(Debug, Clone)]
pub struct ExternalDiff {
    command: Vec<String>,
}

impl ExternalDiff {
    /// `command` is the program followed by its leading arguments; the remote
    /// and local temp file paths are appended
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    /// Diff the current remote content of `merged` against its local content.
    ///
    /// Returns stdout followed by stderr. Temp files are removed when this
    /// returns, whether or not the command succeeded.
    pub async fn run(&self, adapter: &dyn ResourceAdapter, merged: &Item) -> Result<String> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| SyncError::config_error("diff command is empty"))?;

        let key = item_key(adapter, merged)?;
        let remote = adapter.fetch(&key).await?;
        let local = adapter.local_content(merged).await?;

        let suffix = merged
            .local_path
            .as_deref()
            .and_then(|p| p.extension())
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let remote_file = write_temp("remote-", &suffix, &remote)?;
        let local_file = write_temp("local-", &suffix, &local)?;

        debug!("Running {} for {}", program, merged.label());
        let output = Command::new(program)
            .args(args)
            .arg(remote_file.path())
            .arg(local_file.path())
            .output()
            .await
            .map_err(|e| SyncError::ExternalDiff(format!("Failed to run '{}': {}", program, e)))?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(text)
    }
}

fn write_temp(prefix: &str, suffix: &str, content: &[u8]) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile()?;
    file.write_all(content)?;
    file.flush()?;
    Ok(file)
}
